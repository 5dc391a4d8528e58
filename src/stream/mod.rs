//! Controllable stream of scored log entries

pub mod source;
pub mod streamer;

pub use source::{LogSource, SourceFactory, SyntheticLogSource};
pub use streamer::StreamSource;
