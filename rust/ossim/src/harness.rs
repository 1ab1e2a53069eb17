//! Operations the scheduler consumes from the execution harness.

use std::sync::Arc;

use crate::process::Process;
use crate::types::{CpuId, Ticks};

/// The execution harness: owns the simulated clock, performs the actual
/// context switches, and turns timeslice expiry, I/O and exits into calls
/// on [`Scheduler`](crate::Scheduler).
///
/// Both methods are called without any scheduler lock held, so an
/// implementation may call back into the scheduler's read-only accessors.
pub trait Harness: Send + Sync {
    /// Install `process` on `cpu`, or the idle process if `None`.
    ///
    /// `timeslice` is the number of ticks the process may run before the
    /// harness should call `preempt`; `None` means unbounded. Called
    /// exactly once per dispatch.
    fn context_switch(&self, cpu: CpuId, process: Option<&Arc<Process>>, timeslice: Option<Ticks>);

    /// Ask `cpu` to surrender its process right away. The harness answers
    /// by calling `preempt(cpu)` from that CPU's thread.
    fn force_preempt(&self, cpu: CpuId);
}
