//! Fixed-capacity FIFO window of recent scored events

use crate::types::ScoredEvent;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug)]
pub struct SlidingWindow {
    events: VecDeque<Arc<ScoredEvent>>,
    capacity: usize,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an event, evicting the oldest when full
    pub fn push(&mut self, event: Arc<ScoredEvent>) {
        while self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The most recent `n` events (fewer if the window is shorter), oldest first
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &ScoredEvent> {
        let skip = self.events.len().saturating_sub(n);
        self.events.iter().skip(skip).map(|event| event.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredEvent> {
        self.events.iter().map(|event| event.as_ref())
    }

    /// Events whose score is strictly above `threshold`
    pub fn count_above(&self, threshold: f64) -> usize {
        self.iter().filter(|event| event.score() > threshold).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(score: f64) -> Arc<ScoredEvent> {
        Arc::new(ScoredEvent::new(score, score, 0.05, vec![]))
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut window = SlidingWindow::new(3);
        for score in [1.0, 2.0, 3.0, 4.0] {
            window.push(event(score));
        }

        let scores: Vec<f64> = window.iter().map(|e| e.score()).collect();
        assert_eq!(scores, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_tail_shorter_than_window() {
        let mut window = SlidingWindow::new(10);
        window.push(event(1.0));
        window.push(event(2.0));

        assert_eq!(window.tail(5).count(), 2);
        let last: Vec<f64> = window.tail(1).map(|e| e.score()).collect();
        assert_eq!(last, vec![2.0]);
    }

    #[test]
    fn test_burst_never_exceeds_capacity() {
        let mut window = SlidingWindow::new(100);
        for i in 0..10_000 {
            window.push(event(i as f64));
            assert!(window.len() <= 100);
        }
        assert_eq!(window.len(), 100);
        assert_eq!(window.count_above(9_899.0), 100);
    }
}
