use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Scheduler event counters. Observational only.
#[derive(Debug, Default)]
pub struct SchedStats {
    nr_dispatches: AtomicU64,
    nr_idle_dispatches: AtomicU64,
    nr_preemptions: AtomicU64,
    nr_forced_preemptions: AtomicU64,
    nr_yields: AtomicU64,
    nr_terminations: AtomicU64,
    nr_wakeups: AtomicU64,
    nr_idle_waits: AtomicU64,
}

macro_rules! bump {
    ($($fn:ident => $field:ident),* $(,)?) => {
        impl SchedStats {
            $(
                pub(crate) fn $fn(&self) {
                    self.$field.fetch_add(1, Ordering::Relaxed);
                }
            )*
        }
    };
}

bump! {
    inc_dispatches => nr_dispatches,
    inc_idle_dispatches => nr_idle_dispatches,
    inc_preemptions => nr_preemptions,
    inc_forced_preemptions => nr_forced_preemptions,
    inc_yields => nr_yields,
    inc_terminations => nr_terminations,
    inc_wakeups => nr_wakeups,
    inc_idle_waits => nr_idle_waits,
}

impl SchedStats {
    pub fn metrics(&self, nr_queued: u64) -> Metrics {
        Metrics {
            nr_queued,
            nr_dispatches: self.nr_dispatches.load(Ordering::Relaxed),
            nr_idle_dispatches: self.nr_idle_dispatches.load(Ordering::Relaxed),
            nr_preemptions: self.nr_preemptions.load(Ordering::Relaxed),
            nr_forced_preemptions: self.nr_forced_preemptions.load(Ordering::Relaxed),
            nr_yields: self.nr_yields.load(Ordering::Relaxed),
            nr_terminations: self.nr_terminations.load(Ordering::Relaxed),
            nr_wakeups: self.nr_wakeups.load(Ordering::Relaxed),
            nr_idle_waits: self.nr_idle_waits.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    /// Processes sitting in the ready queue at sample time
    pub nr_queued: u64,
    /// Dispatches that installed a process
    pub nr_dispatches: u64,
    /// Dispatches that found the ready queue empty
    pub nr_idle_dispatches: u64,
    /// Timeslice expiries and forced preemptions handled
    pub nr_preemptions: u64,
    /// Forced preemptions requested by wake-ups
    pub nr_forced_preemptions: u64,
    /// Processes that blocked on I/O
    pub nr_yields: u64,
    /// Processes that terminated
    pub nr_terminations: u64,
    /// Processes woken (arrivals and I/O completions)
    pub nr_wakeups: u64,
    /// Calls to the idle entry point
    pub nr_idle_waits: u64,
}

impl Metrics {
    pub fn format<W: Write>(&self, w: &mut W) -> Result<()> {
        writeln!(
            w,
            "[ossim] queued: {:<3} | dispatch: {:<6} idle: {:<6} | preempt: {:<6} forced: {:<5} | yield: {:<6} exit: {:<5} wake: {:<6} | idle_wait: {:<6}",
            self.nr_queued,
            self.nr_dispatches,
            self.nr_idle_dispatches,
            self.nr_preemptions,
            self.nr_forced_preemptions,
            self.nr_yields,
            self.nr_terminations,
            self.nr_wakeups,
            self.nr_idle_waits,
        )?;
        Ok(())
    }

    pub fn delta(&self, rhs: &Self) -> Self {
        Self {
            nr_dispatches: self.nr_dispatches - rhs.nr_dispatches,
            nr_idle_dispatches: self.nr_idle_dispatches - rhs.nr_idle_dispatches,
            nr_preemptions: self.nr_preemptions - rhs.nr_preemptions,
            nr_forced_preemptions: self.nr_forced_preemptions - rhs.nr_forced_preemptions,
            nr_yields: self.nr_yields - rhs.nr_yields,
            nr_terminations: self.nr_terminations - rhs.nr_terminations,
            nr_wakeups: self.nr_wakeups - rhs.nr_wakeups,
            nr_idle_waits: self.nr_idle_waits - rhs.nr_idle_waits,
            ..self.clone()
        }
    }
}
