use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Policy used to pick the next queue to drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChooserKind {
    /// Strict arrival order.
    Fifo,
    /// Smallest tracked timestamp first; arrival order breaks ties.
    #[default]
    TimeBased,
}

/// Configuration of one stream group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Target buffer depth per partition. Reaching it pauses the fetcher for
    /// that partition; draining back down to it unpauses.
    pub desired_unprocessed_per_partition: usize,
    #[serde(default)]
    pub chooser: ChooserKind,
}

impl GroupConfig {
    pub fn new(desired_unprocessed_per_partition: usize) -> Self {
        Self { desired_unprocessed_per_partition, chooser: ChooserKind::default() }
    }

    pub fn with_chooser(mut self, chooser: ChooserKind) -> Self {
        self.chooser = chooser;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.desired_unprocessed_per_partition < 1 {
            return Err(Error::InvalidConfig(
                "desired_unprocessed_per_partition must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
