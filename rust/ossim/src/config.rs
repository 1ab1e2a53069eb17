//! Startup configuration.

use anyhow::bail;
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::policy::Discipline;
use crate::types::MAX_CPUS;

/// Scheduler configuration. Immutable once the scheduler is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedConfig {
    pub cpu_count: u32,
    pub discipline: Discipline,
}

impl SchedConfig {
    pub fn new(cpu_count: u32, discipline: Discipline) -> Result<Self> {
        let cfg = SchedConfig {
            cpu_count,
            discipline,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cpu_count == 0 || self.cpu_count > MAX_CPUS {
            bail!(
                "invalid CPU count {} (must be between 1 and {})",
                self.cpu_count,
                MAX_CPUS
            );
        }
        if let Discipline::RoundRobin { timeslice: 0 } = self.discipline {
            bail!("round-robin timeslice must be at least one tick");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_configs() {
        assert!(SchedConfig::new(1, Discipline::Fifo).is_ok());
        assert!(SchedConfig::new(MAX_CPUS, Discipline::StaticPriority).is_ok());
        assert!(SchedConfig::new(4, Discipline::RoundRobin { timeslice: 1 }).is_ok());
    }

    #[test]
    fn test_invalid_cpu_count() {
        let err = SchedConfig::new(0, Discipline::Fifo).unwrap_err();
        assert!(err.to_string().contains("invalid CPU count 0"));
        assert!(SchedConfig::new(MAX_CPUS + 1, Discipline::Fifo).is_err());
    }

    #[test]
    fn test_zero_timeslice() {
        let err = SchedConfig::new(2, Discipline::RoundRobin { timeslice: 0 }).unwrap_err();
        assert!(err.to_string().contains("timeslice"));
    }
}
