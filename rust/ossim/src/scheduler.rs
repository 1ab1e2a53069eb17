//! Event handlers and dispatch.
//!
//! The harness drives a [`Scheduler`] from one thread per CPU, plus
//! whatever thread delivers wake-ups. Every entry point runs to completion
//! on the calling thread; only [`Scheduler::idle`] ever blocks.
//!
//! State transitions:
//!
//! ```text
//!   NEW/WAITING --wake_up--> READY --dispatch--> RUNNING
//!   RUNNING --preempt--> READY
//!   RUNNING --yield_cpu--> WAITING
//!   RUNNING --terminate--> TERMINATED
//! ```
//!
//! The ready queue lock and the CPU table lock are always taken one at a
//! time, and neither is held across a call into the harness.

use std::sync::Arc;

use anyhow::Result;
use log::{debug, info, warn};

use crate::config::SchedConfig;
use crate::cpu_table::CpuTable;
use crate::harness::Harness;
use crate::process::{Process, ProcessState};
use crate::ready_queue::ReadyQueue;
use crate::stats::{Metrics, SchedStats};
use crate::types::CpuId;

pub struct Scheduler<H: Harness> {
    config: SchedConfig,
    ready: ReadyQueue,
    cpus: CpuTable,
    harness: H,
    stats: SchedStats,
}

impl<H: Harness> Scheduler<H> {
    pub fn new(config: SchedConfig, harness: H) -> Result<Self> {
        config.validate()?;
        info!(
            "scheduler: {} CPUs, discipline {}",
            config.cpu_count, config.discipline
        );
        Ok(Scheduler {
            ready: ReadyQueue::new(config.discipline.queue_order()),
            cpus: CpuTable::new(config.cpu_count),
            config,
            harness,
            stats: SchedStats::default(),
        })
    }

    pub fn config(&self) -> &SchedConfig {
        &self.config
    }

    pub fn harness(&self) -> &H {
        &self.harness
    }

    pub fn ready_queue(&self) -> &ReadyQueue {
        &self.ready
    }

    pub fn cpu_table(&self) -> &CpuTable {
        &self.cpus
    }

    pub fn metrics(&self) -> Metrics {
        self.stats.metrics(self.ready.size() as u64)
    }

    fn check_cpu(&self, cpu: CpuId) {
        assert!(
            cpu.index() < self.cpus.nr_cpus(),
            "invalid {cpu} (nr_cpus={})",
            self.cpus.nr_cpus()
        );
    }

    /// Pick the next process for `cpu` and hand it to the harness.
    ///
    /// Never blocks. An empty queue installs the idle process; the caller
    /// decides whether to wait.
    fn dispatch(&self, cpu: CpuId) {
        let timeslice = self.config.discipline.timeslice();

        let Some(next) = self.ready.dequeue_front() else {
            self.cpus.assign(cpu, None);
            self.stats.inc_idle_dispatches();
            debug!("{cpu}: ready queue empty, switching to idle");
            self.harness.context_switch(cpu, None, timeslice);
            return;
        };

        next.set_state(ProcessState::Running);
        self.cpus.assign(cpu, Some(next.clone()));
        self.stats.inc_dispatches();
        debug!(
            "{cpu}: dispatch pid={} prio={} slice={:?}",
            next.pid(),
            next.static_priority(),
            timeslice
        );
        self.harness.context_switch(cpu, Some(&next), timeslice);
    }

    /// Remove `cpu`'s process from the table for a state change.
    fn take_current(&self, cpu: CpuId, event: &str) -> Arc<Process> {
        self.check_cpu(cpu);
        let Some(p) = self.cpus.take(cpu) else {
            panic!("{event} on {cpu} with no process assigned");
        };
        debug_assert_eq!(
            p.state(),
            ProcessState::Running,
            "{event} on {cpu}: pid {} not running",
            p.pid()
        );
        p
    }

    /// The idle process: block until work is ready, then dispatch.
    ///
    /// Returns without dispatching once [`Scheduler::shutdown`] has been
    /// called.
    pub fn idle(&self, cpu: CpuId) {
        self.check_cpu(cpu);
        self.stats.inc_idle_waits();

        if !self.ready.wait_not_empty() {
            debug!("{cpu}: ready queue closed, leaving idle");
            return;
        }
        self.dispatch(cpu);
    }

    /// Timeslice expired, or the harness honoured a forced preemption.
    pub fn preempt(&self, cpu: CpuId) {
        let p = self.take_current(cpu, "preempt");
        if !self.config.discipline.preempts() {
            warn!(
                "{cpu}: preempt of pid {} under {}, requeueing at tail",
                p.pid(),
                self.config.discipline
            );
        }

        p.set_state(ProcessState::Ready);
        self.stats.inc_preemptions();
        debug!("{cpu}: preempt pid={}", p.pid());
        self.ready.enqueue(p);
        self.dispatch(cpu);
    }

    /// The running process blocked on I/O. It leaves the scheduler until
    /// [`Scheduler::wake_up`].
    pub fn yield_cpu(&self, cpu: CpuId) {
        let p = self.take_current(cpu, "yield");
        p.set_state(ProcessState::Waiting);
        self.stats.inc_yields();
        debug!("{cpu}: yield pid={}", p.pid());
        self.dispatch(cpu);
    }

    /// The running process finished.
    pub fn terminate(&self, cpu: CpuId) {
        let p = self.take_current(cpu, "terminate");
        p.set_state(ProcessState::Terminated);
        self.stats.inc_terminations();
        debug!("{cpu}: terminate pid={}", p.pid());
        self.dispatch(cpu);
    }

    /// A process arrived or its I/O completed.
    ///
    /// Under static priority, kicks the CPU running the least urgent
    /// process if every CPU is busy and that process ranks strictly below
    /// the newcomer.
    pub fn wake_up(&self, process: Arc<Process>) {
        let state = process.state();
        assert!(
            matches!(state, ProcessState::New | ProcessState::Waiting),
            "wake_up of pid {} in state {state}",
            process.pid()
        );

        let pid = process.pid();
        let prio = process.static_priority();
        process.set_state(ProcessState::Ready);
        self.stats.inc_wakeups();
        debug!("wake_up pid={pid} prio={prio}");
        self.ready.enqueue(process);

        let discipline = self.config.discipline;
        if !discipline.preempts_on_wake() {
            return;
        }

        let lowest = self.cpus.lowest_priority_running();
        if let Some(cpu) = discipline.forced_preempt_target(prio, lowest) {
            info!(
                "{cpu}: forcing preemption for pid {pid} (prio {prio} > {})",
                lowest.map_or(0, |(_, p)| p)
            );
            self.stats.inc_forced_preemptions();
            self.harness.force_preempt(cpu);
        }
    }

    /// Close the ready queue. Blocked and future `idle` calls return
    /// without dispatching.
    pub fn shutdown(&self) {
        info!("scheduler shutting down, {} still queued", self.ready.size());
        self.ready.close();
    }
}
