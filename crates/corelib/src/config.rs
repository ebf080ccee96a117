//! Placement configuration.
//!
//! The geometry of a table (`width`, `depth`) and the failure-awareness knob
//! (`quorum_primaries`) are supplied by the coordinator. The defaults match a
//! 256-token, 4-replica table with failure-awareness disabled.

use crate::error::{PlacementError, Result};
use serde::{Deserialize, Serialize};

/// Deepest column the dispersion logic handles precisely.
pub const MAX_DEPTH: usize = 4;

/// Upper bound on `width`; keeps a table at most 2^20 columns.
pub const MAX_WIDTH: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// log2 of the number of tokens.
    pub width: u32,
    /// Replicas per token.
    pub depth: usize,
    /// Leading rows that must hold healthy nodes. `0` disables demotion.
    pub quorum_primaries: usize,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            width: 8,
            depth: 4,
            quorum_primaries: 0,
        }
    }
}

impl PlacementConfig {
    /// Build and validate a config from a token count, which must be a power of two.
    pub fn new(num_tokens: usize, depth: usize, quorum_primaries: usize) -> Result<Self> {
        if !num_tokens.is_power_of_two() {
            return Err(PlacementError::invalid_config(format!(
                "number of tokens must be a power of two, got {num_tokens}"
            )));
        }
        Self::with_width(num_tokens.trailing_zeros(), depth, quorum_primaries)
    }

    pub fn with_width(width: u32, depth: usize, quorum_primaries: usize) -> Result<Self> {
        let config = Self {
            width,
            depth,
            quorum_primaries,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width > MAX_WIDTH {
            return Err(PlacementError::invalid_config(format!(
                "width {} exceeds the maximum of {MAX_WIDTH}",
                self.width
            )));
        }
        if self.depth == 0 || self.depth > MAX_DEPTH {
            return Err(PlacementError::invalid_config(format!(
                "depth must be between 1 and {MAX_DEPTH}, got {}",
                self.depth
            )));
        }
        if self.quorum_primaries > self.depth {
            return Err(PlacementError::invalid_config(format!(
                "quorum primaries {} exceed depth {}",
                self.quorum_primaries, self.depth
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn num_tokens(&self) -> usize {
        1usize << self.width
    }

    pub fn failure_aware(&self) -> bool {
        self.quorum_primaries > 0
    }
}
