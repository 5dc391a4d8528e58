//! Windowed alerting over scored events

pub mod engine;
pub mod rules;
pub mod window;

pub use engine::AlertEngine;
pub use rules::AlertRule;
pub use window::SlidingWindow;
