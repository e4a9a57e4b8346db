//! Completion barrier
//!
//! Counts pipeline completions and fires once when the expected count is
//! reached, whatever order the completions arrive in.

/// Counting barrier with a single-fire guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionBarrier {
    expected: usize,
    count: usize,
    fired: bool,
}

impl CompletionBarrier {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            count: 0,
            fired: false,
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_satisfied(&self) -> bool {
        self.count >= self.expected
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Record one completion. Returns true exactly once: on the arrival that
    /// satisfies the barrier.
    pub fn arrive(&mut self) -> bool {
        if self.count < self.expected {
            self.count += 1;
        }
        self.try_fire()
    }

    /// Claim the single firing if the barrier is satisfied and unclaimed
    pub fn try_fire(&mut self) -> bool {
        if self.fired || !self.is_satisfied() {
            return false;
        }
        self.fired = true;
        true
    }
}
