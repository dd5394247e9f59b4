use std::collections::HashSet;

use tracing::debug;

use crate::error::{DisplayError, Result};
use crate::topology::AdapterId;

/// Candidate ids scanned per adapter once the preferred id is taken.
pub const SOURCE_ID_SCAN_LIMIT: u32 = 32;

/// Hands out logical source ids that are unique per adapter within one apply.
#[derive(Debug, Default)]
pub struct SourceIdAllocator {
    claimed: HashSet<(AdapterId, u32)>,
}

impl SourceIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, adapter: AdapterId, preferred: u32) -> Result<u32> {
        if self.claimed.insert((adapter, preferred)) {
            return Ok(preferred);
        }

        let free = (0..SOURCE_ID_SCAN_LIMIT)
            .find(|id| !self.claimed.contains(&(adapter, *id)))
            .ok_or(DisplayError::SourceAllocationExhausted { adapter })?;

        debug!(%adapter, preferred, assigned = free, "preferred source id taken");
        self.claimed.insert((adapter, free));
        Ok(free)
    }

    #[cfg(test)]
    pub fn is_claimed(&self, adapter: AdapterId, id: u32) -> bool {
        self.claimed.contains(&(adapter, id))
    }
}
