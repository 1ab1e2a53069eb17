use std::fmt;

use serde::Serialize;

use crate::policy::Discipline;
use crate::process::ProcessState;
use crate::stats::Metrics;
use crate::sim::trace::Trace;
use crate::types::{Pid, Priority, Ticks};

#[derive(Debug, Clone, Serialize)]
pub struct ProcessReport {
    pub pid: Pid,
    pub name: String,
    pub priority: Priority,
    /// Final lifecycle state.
    pub state: String,
    /// CPU ticks actually executed.
    pub ran_ticks: Ticks,
    /// Ticks spent READY, from trace timestamps.
    pub ready_ticks: Ticks,
    pub nr_scheduled: usize,
}

/// Summary of a simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub discipline: Discipline,
    pub nr_cpus: u32,
    /// Whether every process terminated before the run ended.
    pub completed: bool,
    pub elapsed_ticks: Ticks,
    pub nr_context_switches: usize,
    pub total_exec_ticks: Ticks,
    pub total_ready_ticks: Ticks,
    pub processes: Vec<ProcessReport>,
    pub metrics: Metrics,
    #[serde(skip)]
    pub trace: Trace,
}

impl SimReport {
    pub fn process(&self, pid: Pid) -> Option<&ProcessReport> {
        self.processes.iter().find(|p| p.pid == pid)
    }

    pub fn all_terminated(&self) -> bool {
        let done = ProcessState::Terminated.to_string();
        self.processes.iter().all(|p| p.state == done)
    }
}

impl fmt::Display for SimReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Simulation {} ({} CPUs, {})",
            if self.completed { "complete" } else { "stopped" },
            self.nr_cpus,
            self.discipline
        )?;
        writeln!(f, "# of Context Switches: {}", self.nr_context_switches)?;
        writeln!(f, "Total execution time: {} ticks", self.total_exec_ticks)?;
        writeln!(f, "Total time spent in READY state: {} ticks", self.total_ready_ticks)?;
        writeln!(f, "Elapsed: {} ticks", self.elapsed_ticks)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>4} {:<10} {:>4} {:<10} {:>6} {:>6} {:>6}",
            "PID", "NAME", "PRIO", "STATE", "RAN", "READY", "SCHED"
        )?;
        for p in &self.processes {
            writeln!(
                f,
                "{:>4} {:<10} {:>4} {:<10} {:>6} {:>6} {:>6}",
                p.pid.0, p.name, p.priority, p.state, p.ran_ticks, p.ready_ticks, p.nr_scheduled
            )?;
        }
        Ok(())
    }
}
