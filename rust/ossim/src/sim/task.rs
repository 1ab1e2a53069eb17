//! Per-process execution state tracked by the harness.

use std::sync::Arc;

use crate::process::Process;
use crate::sim::workload::{Burst, ProcessDef};
use crate::types::{Pid, Ticks};

/// What happened after a process ran for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// Still inside the current CPU burst.
    Continue,
    /// CPU burst finished and an I/O burst of the given length follows.
    BlockOnIo(Ticks),
    /// Last CPU burst finished.
    Exit,
}

/// A simulated process at runtime.
pub(crate) struct SimTask {
    pub process: Arc<Process>,
    pub arrival: Ticks,
    bursts: Vec<Burst>,
    /// Index of the current CPU burst.
    burst_idx: usize,
    /// Ticks left in the current CPU burst.
    remaining: Ticks,
    /// CPU ticks consumed so far.
    pub ran_ticks: Ticks,
}

impl SimTask {
    pub fn new(pid: Pid, def: &ProcessDef) -> Self {
        let remaining = match def.bursts.first() {
            Some(Burst::Cpu(t)) => *t,
            _ => 0,
        };
        SimTask {
            process: Arc::new(Process::new(pid, def.name.clone(), def.priority)),
            arrival: def.arrival,
            bursts: def.bursts.clone(),
            burst_idx: 0,
            remaining,
            ran_ticks: 0,
        }
    }

    /// Consume one tick of the current CPU burst.
    pub fn run_tick(&mut self) -> TickOutcome {
        self.remaining = self.remaining.saturating_sub(1);
        self.ran_ticks += 1;
        if self.remaining > 0 {
            return TickOutcome::Continue;
        }

        loop {
            self.burst_idx += 1;
            match self.bursts.get(self.burst_idx) {
                None => return TickOutcome::Exit,
                Some(Burst::Io(io)) => {
                    let io = *io;
                    // Arm the CPU burst that follows the I/O.
                    if let Some(Burst::Cpu(t)) = self.bursts.get(self.burst_idx + 1) {
                        self.burst_idx += 1;
                        self.remaining = *t;
                    }
                    return TickOutcome::BlockOnIo(io);
                }
                Some(Burst::Cpu(0)) => continue,
                Some(Burst::Cpu(t)) => {
                    self.remaining = *t;
                    return TickOutcome::Continue;
                }
            }
        }
    }
}
