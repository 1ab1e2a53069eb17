//! Workload definition: which processes exist, when they arrive, and the
//! CPU/I/O bursts each one alternates through.

use std::path::Path;

use anyhow::{bail, Context, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::types::{Priority, Ticks, MAX_PRIORITY, MIN_PRIORITY};

/// One step of a process's scripted behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Burst {
    /// Compute for the given number of ticks.
    Cpu(Ticks),
    /// Block on I/O for the given number of ticks.
    Io(Ticks),
}

/// Definition of a process for workload creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDef {
    pub name: String,
    pub priority: Priority,
    /// Tick at which the process first becomes runnable.
    #[serde(default)]
    pub arrival: Ticks,
    /// Alternating CPU and I/O bursts, starting and ending with CPU.
    pub bursts: Vec<Burst>,
}

impl ProcessDef {
    /// Total CPU demand in ticks.
    pub fn cpu_ticks(&self) -> Ticks {
        self.bursts
            .iter()
            .map(|b| match b {
                Burst::Cpu(t) => *t,
                Burst::Io(_) => 0,
            })
            .sum()
    }

    fn validate(&self) -> Result<()> {
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            bail!(
                "process {:?}: priority {} outside {}..={}",
                self.name,
                self.priority,
                MIN_PRIORITY,
                MAX_PRIORITY
            );
        }
        match (self.bursts.first(), self.bursts.last()) {
            (Some(Burst::Cpu(_)), Some(Burst::Cpu(_))) => {}
            (None, _) => bail!("process {:?}: no bursts", self.name),
            _ => bail!(
                "process {:?}: bursts must start and end with a CPU burst",
                self.name
            ),
        }
        for (i, pair) in self.bursts.windows(2).enumerate() {
            if matches!(
                pair,
                [Burst::Cpu(_), Burst::Cpu(_)] | [Burst::Io(_), Burst::Io(_)]
            ) {
                bail!(
                    "process {:?}: bursts {} and {} do not alternate CPU and I/O",
                    self.name,
                    i,
                    i + 1
                );
            }
        }
        if let Some(i) = self
            .bursts
            .iter()
            .position(|b| matches!(b, Burst::Cpu(0) | Burst::Io(0)))
        {
            bail!("process {:?}: burst {} has zero length", self.name, i);
        }
        Ok(())
    }
}

/// The full set of processes a simulation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub processes: Vec<ProcessDef>,
}

/// Builder for constructing workloads.
pub struct WorkloadBuilder {
    processes: Vec<ProcessDef>,
}

impl Workload {
    pub fn builder() -> WorkloadBuilder {
        WorkloadBuilder {
            processes: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.processes.is_empty() {
            bail!("workload has no processes");
        }
        for def in &self.processes {
            def.validate()?;
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let workload: Workload = serde_json::from_str(json).context("malformed workload JSON")?;
        workload.validate()?;
        Ok(workload)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("invalid workload {}", path.display()))
    }

    /// Generate `nr_procs` processes from a seeded PRNG. The same seed
    /// always yields the same workload.
    pub fn random(nr_procs: usize, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let processes = (0..nr_procs)
            .map(|i| {
                let nr_cpu_bursts = rng.gen_range(1..=4);
                let mut bursts = Vec::with_capacity(nr_cpu_bursts * 2 - 1);
                for b in 0..nr_cpu_bursts {
                    if b > 0 {
                        bursts.push(Burst::Io(rng.gen_range(1..=8)));
                    }
                    bursts.push(Burst::Cpu(rng.gen_range(1..=12)));
                }
                ProcessDef {
                    name: format!("rand{i}"),
                    priority: rng.gen_range(MIN_PRIORITY..=MAX_PRIORITY),
                    arrival: rng.gen_range(0..=20),
                    bursts,
                }
            })
            .collect();
        Workload { processes }
    }
}

impl Default for Workload {
    /// A mix of interactive, I/O-bound processes and long CPU-bound ones.
    fn default() -> Self {
        use Burst::{Cpu, Io};

        let def = |name: &str, priority, arrival, bursts: &[Burst]| ProcessDef {
            name: name.to_string(),
            priority,
            arrival,
            bursts: bursts.to_vec(),
        };
        Workload {
            processes: vec![
                def("Iapache", 8, 0, &[Cpu(1), Io(4), Cpu(1), Io(4), Cpu(2), Io(3), Cpu(1)]),
                def("Ibash", 7, 0, &[Cpu(1), Io(6), Cpu(1), Io(6), Cpu(1)]),
                def("Imozilla", 7, 0, &[Cpu(2), Io(3), Cpu(3), Io(3), Cpu(2), Io(2), Cpu(1)]),
                def("Ccpu", 5, 0, &[Cpu(20), Io(2), Cpu(12)]),
                def("Cgcc", 1, 0, &[Cpu(16), Io(1), Cpu(8), Io(1), Cpu(10)]),
                def("Cspice", 4, 0, &[Cpu(24), Io(2), Cpu(6)]),
                def("Cmysql", 6, 5, &[Cpu(4), Io(5), Cpu(10), Io(2), Cpu(4)]),
                def("Csim", 3, 10, &[Cpu(12), Io(4), Cpu(12)]),
            ],
        }
    }
}

impl WorkloadBuilder {
    /// Add a process with a full ProcessDef.
    pub fn process(mut self, def: ProcessDef) -> Self {
        self.processes.push(def);
        self
    }

    /// Convenience: add a process that arrives at tick 0.
    pub fn add_process(mut self, name: &str, priority: Priority, bursts: &[Burst]) -> Self {
        self.processes.push(ProcessDef {
            name: name.to_string(),
            priority,
            arrival: 0,
            bursts: bursts.to_vec(),
        });
        self
    }

    pub fn build(self) -> Result<Workload> {
        let workload = Workload {
            processes: self.processes,
        };
        workload.validate()?;
        Ok(workload)
    }
}
