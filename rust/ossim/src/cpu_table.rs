//! Per-CPU assignment table.
//!
//! Slot `i` records the process currently installed on CPU `i`, or `None`
//! when the CPU runs the idle process. The whole table sits behind one
//! mutex so the forced-preemption scan sees a consistent snapshot of every
//! CPU at once.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::process::{Process, ProcessState};
use crate::types::{CpuId, Priority};

#[derive(Debug)]
pub struct CpuTable {
    slots: Mutex<Vec<Option<Arc<Process>>>>,
    nr_cpus: usize,
}

impl CpuTable {
    pub fn new(nr_cpus: u32) -> Self {
        let nr_cpus = nr_cpus as usize;
        CpuTable {
            slots: Mutex::new(vec![None; nr_cpus]),
            nr_cpus,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Option<Arc<Process>>>> {
        self.slots.lock().expect("cpu table lock poisoned")
    }

    fn index(&self, cpu: CpuId) -> usize {
        assert!(
            cpu.index() < self.nr_cpus,
            "invalid {cpu} (nr_cpus={})",
            self.nr_cpus
        );
        cpu.index()
    }

    pub fn nr_cpus(&self) -> usize {
        self.nr_cpus
    }

    /// Install `process` (or idle) on `cpu`, returning the previous slot.
    pub fn assign(&self, cpu: CpuId, process: Option<Arc<Process>>) -> Option<Arc<Process>> {
        let idx = self.index(cpu);
        std::mem::replace(&mut self.lock()[idx], process)
    }

    /// Clear `cpu`'s slot, returning what was there.
    pub fn take(&self, cpu: CpuId) -> Option<Arc<Process>> {
        let idx = self.index(cpu);
        self.lock()[idx].take()
    }

    pub fn current(&self, cpu: CpuId) -> Option<Arc<Process>> {
        let idx = self.index(cpu);
        self.lock()[idx].clone()
    }

    pub fn snapshot(&self) -> Vec<Option<Arc<Process>>> {
        self.lock().clone()
    }

    /// Find the CPU running the least urgent process.
    ///
    /// Returns `None` if any CPU is idle or holds a process that is no
    /// longer RUNNING; such a CPU is about to pick up work on its own.
    /// Ties go to the lowest CPU index. The scan holds the table lock
    /// throughout.
    pub fn lowest_priority_running(&self) -> Option<(CpuId, Priority)> {
        let slots = self.lock();
        let mut lowest: Option<(CpuId, Priority)> = None;
        for (idx, slot) in slots.iter().enumerate() {
            let p = match slot {
                Some(p) if p.state() == ProcessState::Running => p,
                _ => return None,
            };
            let prio = p.static_priority();
            if lowest.map_or(true, |(_, low)| prio < low) {
                lowest = Some((CpuId(idx as u32), prio));
            }
        }
        lowest
    }
}
