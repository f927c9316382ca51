//! Define the configuration used to open a hash file.

use crate::consts::*;

/// Configuration for a hash file.
#[derive(Debug, Clone)]
pub struct HashFileConfig {
    pub(crate) max_depth: u32,
    pub(crate) max_insert_attempts: u32,
    pub(crate) coalesce_on_delete: bool,
}

impl Default for HashFileConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl HashFileConfig {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_insert_attempts: DEFAULT_MAX_INSERT_ATTEMPTS,
            coalesce_on_delete: false,
        }
    }

    /// Set the ceiling for both the directory depth and any bucket depth.
    /// A bucket that would need to split past it makes the insert fail.
    /// Panics if depth is not in `1..=MAX_SUPPORTED_DEPTH`.
    pub fn set_max_depth(mut self, depth: u32) -> Self {
        if !(1..=MAX_SUPPORTED_DEPTH).contains(&depth) {
            panic!(
                "Invalid max depth {}, must be between 1 and {}",
                depth, MAX_SUPPORTED_DEPTH
            );
        }
        self.max_depth = depth;
        self
    }

    /// Set how many times one insert may resolve, find a full bucket and split
    /// before giving up with a poor hash function error.
    /// Panics if attempts is 0.
    pub fn set_max_insert_attempts(mut self, attempts: u32) -> Self {
        if attempts == 0 {
            panic!("Invalid insert attempts, must be at least 1");
        }
        self.max_insert_attempts = attempts;
        self
    }

    /// Merge buddy buckets after deletes and shrink the directory when possible.
    pub fn coalesce_on_delete(mut self) -> Self {
        self.coalesce_on_delete = true;
        self
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn max_insert_attempts(&self) -> u32 {
        self.max_insert_attempts
    }
}
