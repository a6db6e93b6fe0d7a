//! Step budget accounting for agent loops.

/// Hard cap on model turns for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepBudget {
    max_steps: u32,
    used: u32,
}

impl StepBudget {
    pub fn new(max_steps: u32) -> Self {
        Self { max_steps, used: 0 }
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn remaining(&self) -> u32 {
        self.max_steps.saturating_sub(self.used)
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.max_steps
    }

    /// Claim the next step, returning its zero-based index, or `None` once exhausted.
    pub fn claim(&mut self) -> Option<u32> {
        if self.is_exhausted() {
            return None;
        }
        let step = self.used;
        self.used += 1;
        Some(step)
    }
}
