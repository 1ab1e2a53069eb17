//! Scheduling disciplines.
//!
//! Pure decision logic: which order the ready queue keeps, how long a
//! dispatched process may run, whether a preempted process goes back on
//! the queue, and whether a wake-up should kick a running CPU.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ready_queue::QueueOrder;
use crate::types::{CpuId, Priority, Ticks};

/// The scheduling algorithm, fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    /// First come, first served. Processes run until they yield or exit.
    Fifo,
    /// Arrival order with a bounded timeslice.
    RoundRobin { timeslice: Ticks },
    /// Highest static priority first, with forced preemption on wake-up.
    StaticPriority,
}

impl Discipline {
    pub fn queue_order(&self) -> QueueOrder {
        match self {
            Discipline::Fifo | Discipline::RoundRobin { .. } => QueueOrder::Fifo,
            Discipline::StaticPriority => QueueOrder::Priority,
        }
    }

    /// Timeslice handed to `context_switch`. `None` means unbounded.
    ///
    /// Round-robin passes its slice even when switching to idle.
    pub fn timeslice(&self) -> Option<Ticks> {
        match self {
            Discipline::RoundRobin { timeslice } => Some(*timeslice),
            Discipline::Fifo | Discipline::StaticPriority => None,
        }
    }

    /// Whether a timeslice expiry is part of this discipline. FIFO never
    /// preempts.
    pub fn preempts(&self) -> bool {
        !matches!(self, Discipline::Fifo)
    }

    /// Decide whether waking a process of priority `waking` should force
    /// a running CPU off its process.
    ///
    /// `lowest` is the least urgent running CPU from a consistent table
    /// scan, or `None` if some CPU is idle.
    pub fn forced_preempt_target(
        &self,
        waking: Priority,
        lowest: Option<(CpuId, Priority)>,
    ) -> Option<CpuId> {
        match (self, lowest) {
            (Discipline::StaticPriority, Some((cpu, prio))) if prio < waking => Some(cpu),
            _ => None,
        }
    }

    /// Whether `wake_up` needs to scan the CPU table at all.
    pub fn preempts_on_wake(&self) -> bool {
        matches!(self, Discipline::StaticPriority)
    }
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discipline::Fifo => write!(f, "fifo"),
            Discipline::RoundRobin { timeslice } => write!(f, "round-robin(slice={timeslice})"),
            Discipline::StaticPriority => write!(f, "static-priority"),
        }
    }
}
