//! ossim - run the multi-CPU scheduler against a simulated workload.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use ossim::sim::{SimHandle, SimOptions, Simulation, Workload};
use ossim::{Discipline, Metrics, SchedConfig, Ticks};

/// Simulate a multi-core operating system scheduler.
///
/// Each simulated CPU runs on its own thread. Processes alternate CPU and
/// I/O bursts; the scheduler decides which ready process runs next on each
/// CPU. Without -r or -p, processes run first-come first-served until they
/// block or finish.
#[derive(Debug, Parser)]
#[command(name = "ossim", version)]
struct Opts {
    /// Number of simulated CPUs (1-16).
    cpus: u32,

    /// Round-robin scheduling with the given timeslice, in ticks.
    #[clap(short = 'r', long, value_name = "TICKS", conflicts_with = "priority")]
    round_robin: Option<Ticks>,

    /// Static-priority scheduling with forced preemption on wake-up.
    #[clap(short = 'p', long)]
    priority: bool,

    /// JSON workload file. Defaults to the built-in process mix.
    #[clap(short = 'w', long, value_name = "PATH", conflicts_with = "random")]
    workload: Option<PathBuf>,

    /// Generate this many random processes instead of a fixed workload.
    #[clap(long, value_name = "N")]
    random: Option<usize>,

    /// Seed for --random.
    #[clap(long, env = "OSSIM_SEED", default_value_t = 42)]
    seed: u64,

    /// Wall-clock length of one simulated tick in milliseconds.
    #[clap(short = 't', long, default_value_t = 10)]
    tick_ms: u64,

    /// Print scheduler metrics every SECS seconds while running.
    #[clap(short = 's', long, value_name = "SECS")]
    stats: Option<f64>,

    /// Print the final report as JSON.
    #[clap(long)]
    json: bool,

    /// Print the event trace to stderr after the run.
    #[clap(long)]
    dump_trace: bool,

    /// Enable verbose output. Specify multiple times to increase
    /// verbosity.
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Opts {
    fn discipline(&self) -> Discipline {
        match (self.round_robin, self.priority) {
            (Some(timeslice), _) => Discipline::RoundRobin { timeslice },
            (None, true) => Discipline::StaticPriority,
            (None, false) => Discipline::Fifo,
        }
    }

    fn workload(&self) -> Result<Workload> {
        if let Some(path) = &self.workload {
            return Workload::load(path);
        }
        if let Some(n) = self.random {
            if n == 0 {
                bail!("--random needs at least one process");
            }
            info!("generating {n} random processes (seed {})", self.seed);
            return Ok(Workload::random(n, self.seed));
        }
        Ok(Workload::default())
    }
}

fn monitor(handle: SimHandle, intv: Duration) {
    let mut prev = Metrics::default();
    while !handle.is_done() {
        thread::sleep(intv);
        let cur = handle.metrics();
        if let Err(e) = cur.delta(&prev).format(&mut std::io::stdout()) {
            warn!("failed to print metrics: {e}");
            return;
        }
        prev = cur;
    }
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    let llv = match opts.verbose {
        0 => simplelog::LevelFilter::Info,
        1 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    let mut lcfg = simplelog::ConfigBuilder::new();
    lcfg.set_time_level(simplelog::LevelFilter::Error)
        .set_location_level(simplelog::LevelFilter::Off)
        .set_target_level(simplelog::LevelFilter::Off)
        .set_thread_level(simplelog::LevelFilter::Off);
    simplelog::TermLogger::init(
        llv,
        lcfg.build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;

    let config = SchedConfig::new(opts.cpus, opts.discipline())?;
    let workload = opts.workload()?;
    if opts.tick_ms == 0 {
        bail!("--tick-ms must be at least 1");
    }
    let sim_opts = SimOptions {
        tick: Duration::from_millis(opts.tick_ms),
    };

    let sim = Simulation::new(config, workload, sim_opts)?;

    let handle = sim.handle();
    ctrlc::set_handler(move || handle.stop()).context("Error setting Ctrl-C handler")?;

    if let Some(secs) = opts.stats {
        if !secs.is_finite() || secs <= 0.0 {
            bail!("--stats interval must be positive");
        }
        let handle = sim.handle();
        let intv = Duration::from_secs_f64(secs);
        thread::Builder::new()
            .name("ossim-stats".into())
            .spawn(move || monitor(handle, intv))
            .context("failed to spawn stats monitor")?;
    }

    let report = sim.run()?;

    if opts.dump_trace {
        report.trace.dump();
    }
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}
