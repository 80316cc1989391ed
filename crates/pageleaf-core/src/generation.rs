use anyhow::{Result, anyhow};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// Shared build counter. Bumping it invalidates every build started earlier;
/// workers holding a clone can notice and stop between stages.
#[derive(Clone, Debug, Default)]
pub struct BuildGeneration {
    current: Arc<AtomicU64>,
}

impl BuildGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation and return its id.
    pub fn bump(&self) -> u64 {
        self.current
            .fetch_add(1, Ordering::AcqRel)
            .wrapping_add(1)
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current() == generation
    }

    pub fn check_current(&self, generation: u64, stage: &'static str) -> Result<()> {
        if !self.is_current(generation) {
            return Err(anyhow!(
                "build superseded at stage={stage} (generation {generation}, current {})",
                self.current()
            ));
        }
        Ok(())
    }
}
