//! ossim - Scheduling core of a simulated multi-core operating system.
//!
//! For each of N simulated CPUs the core decides which runnable process
//! runs next, and reacts to the lifecycle events an execution harness
//! reports: timeslice expiry, I/O yield, termination and I/O completion.
//!
//! # Architecture
//!
//! - **Ready queue**: one shared, lock-protected queue of runnable
//!   processes with a "not empty" condition that idle CPUs block on
//! - **CPU table**: which process each CPU is running, behind its own lock
//! - **Policy**: FIFO, round-robin, or static priority with forced
//!   preemption on wake-up
//! - **Scheduler**: the entry points the harness calls (`idle`, `preempt`,
//!   `yield_cpu`, `terminate`, `wake_up`)
//! - **Sim**: a threaded harness with one OS thread per CPU, a timed I/O
//!   device and an event trace
//!
//! # Usage
//!
//! ```rust,no_run
//! use ossim::sim::{Simulation, SimOptions, Workload};
//! use ossim::{Discipline, SchedConfig};
//!
//! let config = SchedConfig::new(2, Discipline::RoundRobin { timeslice: 3 })?;
//! let sim = Simulation::new(config, Workload::default(), SimOptions::default())?;
//! let report = sim.run()?;
//! println!("{report}");
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod config;
pub mod cpu_table;
pub mod harness;
pub mod policy;
pub mod process;
pub mod ready_queue;
pub mod scheduler;
pub mod sim;
pub mod stats;
pub mod types;

pub use config::SchedConfig;
pub use harness::Harness;
pub use policy::Discipline;
pub use process::{Process, ProcessState};
pub use scheduler::Scheduler;
pub use stats::Metrics;
pub use types::{CpuId, Pid, Priority, Ticks, MAX_CPUS, MAX_PRIORITY, MIN_PRIORITY};
