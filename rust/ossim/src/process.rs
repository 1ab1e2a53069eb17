//! Process record shared between the scheduler core and the harness.
//!
//! The harness allocates records and hands out `Arc<Process>` references.
//! The core only touches the lifecycle state, and only while the record is
//! reachable from the ready queue or the CPU table. At any instant a record
//! is reachable from exactly one of {ready queue, CPU table, harness while
//! WAITING}, so state updates never race under correct handler sequencing.
//! The state is still an atomic so that readers on other threads (the
//! forced-preemption scan, reports) always see a whole value.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::types::{Pid, Priority};

/// Lifecycle state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProcessState {
    /// Created by the harness, never woken.
    New = 0,
    /// Runnable, sitting in the ready queue.
    Ready = 1,
    /// Installed on a CPU.
    Running = 2,
    /// Blocked on I/O, owned by the harness until woken.
    Waiting = 3,
    /// Finished. The harness reclaims the record.
    Terminated = 4,
}

impl ProcessState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => ProcessState::New,
            1 => ProcessState::Ready,
            2 => ProcessState::Running,
            3 => ProcessState::Waiting,
            4 => ProcessState::Terminated,
            _ => unreachable!("invalid process state {raw}"),
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessState::New => "NEW",
            ProcessState::Ready => "READY",
            ProcessState::Running => "RUNNING",
            ProcessState::Waiting => "WAITING",
            ProcessState::Terminated => "TERMINATED",
        };
        f.write_str(s)
    }
}

/// A process record.
pub struct Process {
    pid: Pid,
    name: String,
    static_priority: Priority,
    state: AtomicU8,
}

impl Process {
    pub fn new(pid: Pid, name: impl Into<String>, static_priority: Priority) -> Self {
        Process {
            pid,
            name: name.into(),
            static_priority,
            state: AtomicU8::new(ProcessState::New as u8),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn static_priority(&self) -> Priority {
        self.static_priority
    }

    pub fn state(&self) -> ProcessState {
        ProcessState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: ProcessState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid.0)
            .field("name", &self.name)
            .field("prio", &self.static_priority)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_process_starts_new() {
        let p = Process::new(Pid(7), "worker", 4);
        assert_eq!(p.pid(), Pid(7));
        assert_eq!(p.name(), "worker");
        assert_eq!(p.static_priority(), 4);
        assert_eq!(p.state(), ProcessState::New);
    }

    #[test]
    fn test_state_transitions_are_visible() {
        let p = Process::new(Pid(1), "p", 1);
        for state in [
            ProcessState::Ready,
            ProcessState::Running,
            ProcessState::Waiting,
            ProcessState::Ready,
            ProcessState::Running,
            ProcessState::Terminated,
        ] {
            p.set_state(state);
            assert_eq!(p.state(), state);
        }
    }
}
