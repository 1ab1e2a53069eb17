//! Identifiers and quantities shared by the scheduler and the harness.
//!
//! PIDs and CPU ids are newtypes so the two kinds of small integer cannot
//! be swapped by accident. Ticks and priorities stay plain aliases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Process identifier, assigned by the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pid(pub u32);

/// CPU identifier. Valid values are `0..cpu_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CpuId(pub u32);

impl CpuId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu{}", self.0)
    }
}

/// Simulated time, in ticks of the harness clock.
pub type Ticks = u64;

/// Static priority. Higher is more urgent.
pub type Priority = u32;

/// Lowest valid static priority.
pub const MIN_PRIORITY: Priority = 1;

/// Highest valid static priority.
pub const MAX_PRIORITY: Priority = 10;

/// Largest supported CPU count.
pub const MAX_CPUS: u32 = 16;
