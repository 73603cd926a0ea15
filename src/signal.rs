//! Monotonic shutdown flag shared by every stage.

use std::sync::atomic::{AtomicBool, Ordering};

/// Set once when input is over, never cleared.
///
/// Writes use release ordering and reads use acquire ordering, so anything the
/// input stage did before raising the flag is visible to a stage that sees it.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    raised: AtomicBool,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Returns true only for the call that flipped it.
    pub fn raise(&self) -> bool {
        !self.raised.swap(true, Ordering::AcqRel)
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_initially_clear() {
        assert!(!ShutdownSignal::new().is_raised());
    }

    #[test]
    fn test_raise_is_monotonic() {
        let signal = ShutdownSignal::new();
        assert!(signal.raise());
        assert!(signal.is_raised());
        assert!(!signal.raise());
        assert!(signal.is_raised());
    }

    #[test]
    fn test_visible_across_threads() {
        let signal = ShutdownSignal::new();
        thread::scope(|s| {
            s.spawn(|| signal.raise());
        });
        assert!(signal.is_raised());
    }
}
