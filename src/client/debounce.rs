//! Rate limiting for outbound edits and the cosmetic typing indicator.
//!
//! Both types are driven by explicit `Instant`s so callers decide the clock.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Quiet period after the last keystroke before an edit goes out.
pub const EDIT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Idle time after which a `TYPING_PAUSE` is emitted.
pub const TYPING_IDLE: Duration = Duration::from_secs(1);

/// Collapses bursts of touches on the same key into one firing, `window`
/// after the last touch.
#[derive(Debug, Clone)]
pub struct Debouncer<K> {
    window: Duration,
    deadlines: HashMap<K, Instant>,
}

impl<K: Eq + Hash + Clone> Debouncer<K> {
    pub fn new(window: Duration) -> Self {
        Self { window, deadlines: HashMap::new() }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Start or restart the quiet period for `key`.
    pub fn touch(&mut self, key: K, now: Instant) {
        self.deadlines.insert(key, now + self.window);
    }

    /// Keys whose quiet period is over, oldest deadline first. They stop
    /// being pending.
    pub fn due(&mut self, now: Instant) -> Vec<K> {
        let mut ready: Vec<(Instant, K)> = self
            .deadlines
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(k, at)| (*at, k.clone()))
            .collect();
        ready.sort_by_key(|(at, _)| *at);
        for (_, k) in &ready {
            self.deadlines.remove(k);
        }
        ready.into_iter().map(|(_, k)| k).collect()
    }

    /// Everything still pending, regardless of deadline (shutdown, room switch).
    pub fn drain(&mut self) -> Vec<K> {
        self.deadlines.drain().map(|(k, _)| k).collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.deadlines.contains_key(key)
    }

    pub fn cancel(&mut self, key: &K) -> bool {
        self.deadlines.remove(key).is_some()
    }
}

/// Tracks whether the local user is typing; expiry is cosmetic only.
#[derive(Debug, Clone)]
pub struct TypingIndicator {
    idle: Duration,
    last_keystroke: Option<Instant>,
}

impl TypingIndicator {
    pub fn new(idle: Duration) -> Self {
        Self { idle, last_keystroke: None }
    }

    pub fn keystroke(&mut self, now: Instant) {
        self.last_keystroke = Some(now);
    }

    pub fn is_typing(&self) -> bool {
        self.last_keystroke.is_some()
    }

    /// `true` exactly once per burst, when the idle time has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.last_keystroke {
            Some(at) if now.duration_since(at) >= self.idle => {
                self.last_keystroke = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_burst_collapses_to_one() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(300 * MS);
        d.touch("f1", t0);
        d.touch("f1", t0 + 100 * MS);
        d.touch("f1", t0 + 250 * MS);

        assert!(d.due(t0 + 500 * MS).is_empty());
        assert_eq!(d.due(t0 + 550 * MS), vec!["f1"]);
        assert!(d.due(t0 + 10_000 * MS).is_empty());
        assert!(!d.is_pending(&"f1"));
    }

    #[test]
    fn test_keys_are_independent_and_ordered() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(300 * MS);
        d.touch("b", t0 + 50 * MS);
        d.touch("a", t0);
        assert_eq!(d.next_deadline(), Some(t0 + 300 * MS));
        assert_eq!(d.due(t0 + 320 * MS), vec!["a"]);
        assert_eq!(d.due(t0 + 400 * MS), vec!["b"]);
        assert_eq!(d.next_deadline(), None);
    }

    #[test]
    fn test_cancel_and_drain() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(EDIT_DEBOUNCE);
        d.touch(1, t0);
        d.touch(2, t0);
        assert!(d.cancel(&1));
        assert!(!d.cancel(&1));
        assert_eq!(d.drain(), vec![2]);
        assert!(d.due(t0 + EDIT_DEBOUNCE).is_empty());
    }

    #[test]
    fn test_typing_pause_fires_once() {
        let t0 = Instant::now();
        let mut t = TypingIndicator::new(TYPING_IDLE);
        assert!(!t.poll(t0));

        t.keystroke(t0);
        t.keystroke(t0 + 600 * MS);
        assert!(!t.poll(t0 + 1_000 * MS));
        assert!(t.poll(t0 + 1_600 * MS));
        assert!(!t.poll(t0 + 5_000 * MS));
        assert!(!t.is_typing());
    }
}
