//! Simulated CPU state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::process::Process;
use crate::types::{CpuId, Ticks};

#[derive(Debug, Default)]
struct Installed {
    /// Process installed by the last context switch, or None if idle.
    current: Option<Arc<Process>>,
    /// Ticks left before the slice expires. None = unbounded.
    slice_left: Option<Ticks>,
}

/// A simulated CPU.
#[derive(Debug)]
pub struct SimCpu {
    pub id: CpuId,
    installed: Mutex<Installed>,
    /// Raised by `force_preempt`, consumed by the CPU's own thread.
    preempt_requested: AtomicBool,
}

impl SimCpu {
    pub fn new(id: CpuId) -> Self {
        SimCpu {
            id,
            installed: Mutex::new(Installed::default()),
            preempt_requested: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Installed> {
        self.installed.lock().expect("sim cpu lock poisoned")
    }

    /// Context switch. A pending forced preemption was aimed at the
    /// outgoing process and is dropped.
    pub fn install(&self, process: Option<Arc<Process>>, timeslice: Option<Ticks>) {
        let mut installed = self.lock();
        installed.current = process;
        installed.slice_left = timeslice;
        self.preempt_requested.store(false, Ordering::Release);
    }

    pub fn current(&self) -> Option<Arc<Process>> {
        self.lock().current.clone()
    }

    pub fn request_preempt(&self) {
        self.preempt_requested.store(true, Ordering::Release);
    }

    pub fn take_preempt_request(&self) -> bool {
        self.preempt_requested.swap(false, Ordering::AcqRel)
    }

    /// Charge one tick against the slice. Returns true once it runs out.
    pub fn consume_slice(&self) -> bool {
        let mut installed = self.lock();
        match installed.slice_left.as_mut() {
            Some(left) => {
                *left = left.saturating_sub(1);
                *left == 0
            }
            None => false,
        }
    }
}
