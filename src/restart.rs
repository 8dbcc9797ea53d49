//! Hooks to save a running sampler and to pick it up again.

use anyhow::Result;
use rand_chacha::ChaCha8Rng;

use crate::{
    samples::SampleList,
    walker::{UnitRange, Walker},
};

/// Everything the main loop needs to continue where it stopped.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub iteration: usize,
    pub log_z: f64,
    pub info: f64,
    pub log_width: f64,
    /// Information at the last refresh of the unit range.
    pub range_info: f64,
    pub unit_range: UnitRange,
    pub walkers: Vec<Walker>,
    pub samples: SampleList,
    pub rng: ChaCha8Rng,
}

/// Consulted before the run starts and every 100 iterations.
pub trait Restart {
    fn want_save(&self) -> bool;

    fn want_restore(&self) -> bool;

    fn save(&mut self, checkpoint: &Checkpoint) -> Result<()>;

    /// The checkpoint to continue from, if there is one.
    fn restore(&mut self) -> Result<Option<Checkpoint>>;
}

/// Keeps the latest checkpoint in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryRestart {
    checkpoint: Option<Checkpoint>,
    restore: bool,
}

impl MemoryRestart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue from `checkpoint` on the next run.
    pub fn resume_from(checkpoint: Checkpoint) -> Self {
        Self {
            checkpoint: Some(checkpoint),
            restore: true,
        }
    }

    pub fn checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoint.as_ref()
    }
}

impl Restart for MemoryRestart {
    fn want_save(&self) -> bool {
        true
    }

    fn want_restore(&self) -> bool {
        self.restore
    }

    fn save(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        self.checkpoint = Some(checkpoint.clone());
        Ok(())
    }

    fn restore(&mut self) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoint.clone())
    }
}
