//! Threaded execution harness.
//!
//! Drives a [`Scheduler`] the way an operating system simulator would: one
//! OS thread per simulated CPU executes the installed process tick by tick,
//! and one I/O thread delivers arrivals and I/O completions as wake-ups.
//!
//! # CPU thread loop
//!
//! 1. No process installed: call `idle`, which blocks until work is ready.
//! 2. A wake-up asked for this CPU: call `preempt`.
//! 3. Otherwise run one tick of the current CPU burst, then:
//!    - last burst done: `terminate`
//!    - CPU burst done, I/O follows: `yield_cpu`, then hand the process to
//!      the I/O device
//!    - timeslice used up: `preempt`
//!
//! When the last process terminates (or [`SimHandle::stop`] is called) the
//! scheduler is shut down, which releases every CPU blocked in `idle`.

mod cpu;
mod io;
mod task;

pub mod clock;
pub mod report;
pub mod trace;
pub mod workload;

pub use clock::SimClock;
pub use report::{ProcessReport, SimReport};
pub use trace::{Trace, TraceEvent, TraceKind};
pub use workload::{Burst, ProcessDef, Workload, WorkloadBuilder};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossbeam::channel::{Receiver, Sender};
use log::{debug, info};

use crate::config::SchedConfig;
use crate::harness::Harness;
use crate::process::Process;
use crate::scheduler::Scheduler;
use crate::stats::Metrics;
use crate::types::{CpuId, Pid, Ticks};
use cpu::SimCpu;
use io::IoRequest;
use task::{SimTask, TickOutcome};

/// Harness-side knobs.
#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Wall-clock length of one tick.
    pub tick: Duration,
}

impl Default for SimOptions {
    fn default() -> Self {
        SimOptions {
            tick: Duration::from_millis(10),
        }
    }
}

/// The [`Harness`] the simulation hands to the scheduler.
pub struct SimHarness {
    cpus: Vec<SimCpu>,
    clock: SimClock,
    trace: Mutex<Trace>,
}

impl SimHarness {
    fn new(nr_cpus: u32, tick: Duration) -> Self {
        SimHarness {
            cpus: (0..nr_cpus).map(|i| SimCpu::new(CpuId(i))).collect(),
            clock: SimClock::new(tick),
            trace: Mutex::new(Trace::new()),
        }
    }

    fn cpu(&self, cpu: CpuId) -> &SimCpu {
        &self.cpus[cpu.index()]
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    fn lock_trace(&self) -> MutexGuard<'_, Trace> {
        self.trace.lock().expect("trace lock poisoned")
    }

    fn record(&self, cpu: Option<CpuId>, kind: TraceKind) {
        let tick = self.clock.now();
        self.lock_trace().record(tick, cpu, kind);
    }

    /// Copy of the trace recorded so far.
    pub fn trace(&self) -> Trace {
        self.lock_trace().clone()
    }
}

impl Harness for SimHarness {
    fn context_switch(&self, cpu: CpuId, process: Option<&Arc<Process>>, timeslice: Option<Ticks>) {
        let kind = match process {
            Some(p) => TraceKind::Scheduled { pid: p.pid() },
            None => TraceKind::Idle,
        };
        self.record(Some(cpu), kind);
        self.cpu(cpu).install(process.cloned(), timeslice);
    }

    fn force_preempt(&self, cpu: CpuId) {
        self.record(Some(cpu), TraceKind::ForcedPreempt);
        self.cpu(cpu).request_preempt();
    }
}

struct SimShared {
    sched: Scheduler<SimHarness>,
    /// Indexed by pid.
    tasks: Vec<Mutex<SimTask>>,
    io_tx: Sender<IoRequest>,
    done: AtomicBool,
    nr_exited: AtomicUsize,
}

/// Ends the simulation if the owning thread unwinds, so no CPU is left
/// blocked in `idle` waiting for a wake-up that will never come.
struct FinishOnPanic<'a>(&'a SimShared);

impl Drop for FinishOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.finish();
        }
    }
}

impl SimShared {
    fn harness(&self) -> &SimHarness {
        self.sched.harness()
    }

    fn clock(&self) -> &SimClock {
        self.harness().clock()
    }

    fn task(&self, pid: Pid) -> MutexGuard<'_, SimTask> {
        self.tasks[pid.0 as usize]
            .lock()
            .expect("sim task lock poisoned")
    }

    fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn finish(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.sched.shutdown();
        let _ = self.io_tx.send(IoRequest::Stop);
    }

    fn submit_wake(&self, process: Arc<Process>, at: Ticks) {
        let pid = process.pid();
        if self.io_tx.send(IoRequest::Wake { process, at }).is_err() {
            debug!("io device gone, dropping wake-up of pid {pid}");
        }
    }

    /// Called on the I/O thread for every due process.
    fn deliver(&self, process: Arc<Process>) {
        if self.is_done() {
            return;
        }
        self.harness()
            .record(None, TraceKind::Woke { pid: process.pid() });
        self.sched.wake_up(process);
    }

    fn cpu_loop(&self, cpu: CpuId) {
        let sim_cpu = self.harness().cpu(cpu);

        while !self.is_done() {
            let Some(process) = sim_cpu.current() else {
                self.sched.idle(cpu);
                continue;
            };
            let pid = process.pid();

            if sim_cpu.take_preempt_request() {
                self.harness()
                    .record(Some(cpu), TraceKind::Preempted { pid });
                self.sched.preempt(cpu);
                continue;
            }

            self.clock().sleep_tick();
            let outcome = self.task(pid).run_tick();
            let slice_expired = sim_cpu.consume_slice();

            match outcome {
                TickOutcome::Exit => {
                    self.harness()
                        .record(Some(cpu), TraceKind::Terminated { pid });
                    self.sched.terminate(cpu);
                    let nr_exited = self.nr_exited.fetch_add(1, Ordering::AcqRel) + 1;
                    if nr_exited == self.tasks.len() {
                        info!("all {nr_exited} processes terminated");
                        self.finish();
                    }
                }
                TickOutcome::BlockOnIo(io_ticks) => {
                    self.harness()
                        .record(Some(cpu), TraceKind::Yielded { pid });
                    self.sched.yield_cpu(cpu);
                    self.submit_wake(process, self.clock().now() + io_ticks);
                }
                TickOutcome::Continue if slice_expired => {
                    self.harness()
                        .record(Some(cpu), TraceKind::Preempted { pid });
                    self.sched.preempt(cpu);
                }
                TickOutcome::Continue => {}
            }
        }
        debug!("{}: thread exiting", sim_cpu.id);
    }

    fn report(&self) -> SimReport {
        let trace = self.harness().trace();
        let ready = trace.ready_ticks();
        let processes: Vec<ProcessReport> = self
            .tasks
            .iter()
            .map(|t| {
                let t = t.lock().expect("sim task lock poisoned");
                let pid = t.process.pid();
                ProcessReport {
                    pid,
                    name: t.process.name().to_string(),
                    priority: t.process.static_priority(),
                    state: t.process.state().to_string(),
                    ran_ticks: t.ran_ticks,
                    ready_ticks: ready.get(&pid).copied().unwrap_or(0),
                    nr_scheduled: trace.schedule_count(pid),
                }
            })
            .collect();

        let config = self.sched.config();
        SimReport {
            discipline: config.discipline,
            nr_cpus: config.cpu_count,
            completed: self.nr_exited.load(Ordering::Acquire) == self.tasks.len(),
            elapsed_ticks: self.clock().now(),
            nr_context_switches: trace.context_switches(),
            total_exec_ticks: processes.iter().map(|p| p.ran_ticks).sum(),
            total_ready_ticks: processes.iter().map(|p| p.ready_ticks).sum(),
            processes,
            metrics: self.sched.metrics(),
            trace,
        }
    }
}

/// A handle for stopping or sampling a running simulation from another
/// thread (e.g. a Ctrl-C handler or a metrics monitor).
#[derive(Clone)]
pub struct SimHandle {
    shared: Arc<SimShared>,
}

impl SimHandle {
    pub fn stop(&self) {
        info!("stopping simulation");
        self.shared.finish();
    }

    pub fn is_done(&self) -> bool {
        self.shared.is_done()
    }

    pub fn metrics(&self) -> Metrics {
        self.shared.sched.metrics()
    }
}

/// A ready-to-run simulation.
pub struct Simulation {
    shared: Arc<SimShared>,
    io_rx: Receiver<IoRequest>,
}

impl Simulation {
    pub fn new(config: SchedConfig, workload: Workload, opts: SimOptions) -> Result<Self> {
        workload.validate()?;
        if opts.tick.is_zero() {
            bail!("tick length must be non-zero");
        }

        let harness = SimHarness::new(config.cpu_count, opts.tick);
        let sched = Scheduler::new(config, harness)?;
        let tasks = workload
            .processes
            .iter()
            .enumerate()
            .map(|(i, def)| Mutex::new(SimTask::new(Pid(i as u32), def)))
            .collect();
        let (io_tx, io_rx) = io::channel();

        Ok(Simulation {
            shared: Arc::new(SimShared {
                sched,
                tasks,
                io_tx,
                done: AtomicBool::new(false),
                nr_exited: AtomicUsize::new(0),
            }),
            io_rx,
        })
    }

    pub fn handle(&self) -> SimHandle {
        SimHandle {
            shared: self.shared.clone(),
        }
    }

    /// Run until every process terminates or the simulation is stopped.
    pub fn run(self) -> Result<SimReport> {
        let Simulation { shared, io_rx } = self;
        let config = *shared.sched.config();
        info!(
            "simulation: {} processes, {} CPUs, {}, tick {:?}",
            shared.tasks.len(),
            config.cpu_count,
            config.discipline,
            shared.clock().tick()
        );

        shared.clock().start();
        for task in &shared.tasks {
            let (process, arrival) = {
                let t = task.lock().expect("sim task lock poisoned");
                (t.process.clone(), t.arrival)
            };
            shared.submit_wake(process, arrival);
        }

        let io_handle = {
            let io_shared = shared.clone();
            thread::Builder::new()
                .name("ossim-io".into())
                .spawn(move || {
                    let _guard = FinishOnPanic(&io_shared);
                    io::run(io_rx, io_shared.clock(), |p| io_shared.deliver(p));
                })
                .context("failed to spawn I/O thread")?
        };

        let mut cpu_handles = Vec::with_capacity(config.cpu_count as usize);
        let mut spawn_err = None;
        for i in 0..config.cpu_count {
            let cpu_shared = shared.clone();
            let spawned = thread::Builder::new()
                .name(format!("ossim-cpu{i}"))
                .spawn(move || {
                    let _guard = FinishOnPanic(&cpu_shared);
                    cpu_shared.cpu_loop(CpuId(i));
                });
            match spawned {
                Ok(h) => cpu_handles.push(h),
                Err(e) => {
                    spawn_err = Some(e);
                    shared.finish();
                    break;
                }
            }
        }

        let mut nr_panicked = 0;
        for h in cpu_handles {
            if h.join().is_err() {
                nr_panicked += 1;
            }
        }
        // All CPUs are gone; stop the I/O device even on early exit.
        shared.finish();
        if io_handle.join().is_err() {
            nr_panicked += 1;
        }

        if let Some(e) = spawn_err {
            return Err(anyhow::Error::from(e).context("failed to spawn CPU thread"));
        }
        if nr_panicked > 0 {
            bail!("{nr_panicked} simulation thread(s) panicked");
        }

        let report = shared.report();
        info!(
            "simulation {} after {} ticks, {} context switches",
            if report.completed { "complete" } else { "stopped" },
            report.elapsed_ticks,
            report.nr_context_switches
        );
        Ok(report)
    }
}
