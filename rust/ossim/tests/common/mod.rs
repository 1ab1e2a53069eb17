#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use simplelog::LevelFilter;

use ossim::{CpuId, Discipline, Harness, Pid, Priority, Process, SchedConfig, Scheduler, Ticks};

/// Initialize logging from `RUST_LOG` (off by default).
///
/// Idempotent: only the first call in the process installs the logger.
pub fn setup_test() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(LevelFilter::Off);
    let _ = simplelog::TestLogger::init(level, simplelog::Config::default());
}

/// One `context_switch` call as seen by the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Switch {
    pub cpu: CpuId,
    pub pid: Option<Pid>,
    pub timeslice: Option<Ticks>,
}

pub fn switch(cpu: CpuId, pid: Option<u32>, timeslice: Option<Ticks>) -> Switch {
    Switch {
        cpu,
        pid: pid.map(Pid),
        timeslice,
    }
}

/// A harness that records every call and does nothing else.
#[derive(Default)]
pub struct Recorder {
    switches: Mutex<Vec<Switch>>,
    kicks: Mutex<Vec<CpuId>>,
}

impl Recorder {
    pub fn switches(&self) -> Vec<Switch> {
        self.switches.lock().unwrap().clone()
    }

    /// Pids installed on `cpu`, in order; `None` for idle switches.
    pub fn dispatched_on(&self, cpu: CpuId) -> Vec<Option<Pid>> {
        self.switches()
            .into_iter()
            .filter(|s| s.cpu == cpu)
            .map(|s| s.pid)
            .collect()
    }

    pub fn kicks(&self) -> Vec<CpuId> {
        self.kicks.lock().unwrap().clone()
    }
}

impl Harness for Recorder {
    fn context_switch(&self, cpu: CpuId, process: Option<&Arc<Process>>, timeslice: Option<Ticks>) {
        self.switches.lock().unwrap().push(Switch {
            cpu,
            pid: process.map(|p| p.pid()),
            timeslice,
        });
    }

    fn force_preempt(&self, cpu: CpuId) {
        self.kicks.lock().unwrap().push(cpu);
    }
}

pub fn scheduler(nr_cpus: u32, discipline: Discipline) -> Scheduler<Recorder> {
    setup_test();
    let config = SchedConfig::new(nr_cpus, discipline).unwrap();
    Scheduler::new(config, Recorder::default()).unwrap()
}

pub fn process(pid: u32, prio: Priority) -> Arc<Process> {
    Arc::new(Process::new(Pid(pid), format!("p{pid}"), prio))
}

/// Pids in the ready queue, front to back.
pub fn queued(sched: &Scheduler<Recorder>) -> Vec<u32> {
    sched
        .ready_queue()
        .snapshot()
        .iter()
        .map(|p| p.pid().0)
        .collect()
}

/// Wake `process` and run it on `cpu`, which must be idle with an empty
/// ready queue.
pub fn run_on(sched: &Scheduler<Recorder>, cpu: CpuId, process: &Arc<Process>) {
    sched.wake_up(process.clone());
    sched.idle(cpu);
    let current = sched.cpu_table().current(cpu).unwrap();
    assert!(Arc::ptr_eq(&current, process));
}
