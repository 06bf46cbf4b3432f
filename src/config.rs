use std::path::PathBuf;

use anyhow::Context;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use toml::{Table, Value};

use crate::alloc::{FlexibleGroup, SplitBound};
use crate::cost::{CostModelConfig, CostModelLut};
use crate::hardware::{Accelerator, AcceleratorConfig, CoreId};
use crate::stages::StageConfig;
use crate::workload::{NodeKey, Operand, Workload, WorkloadConfig};

pub trait Config: DeserializeOwned + Default {
    fn from_section(section: Option<&Value>) -> Result<Self, toml::de::Error> {
        match section {
            Some(value) => value.clone().try_into(),
            None => {
                warn!("config section not found");
                Ok(Self::default())
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RunConfig {
    pub log_level: u64,
    /// Random candidates to evaluate when no candidate is given.
    pub samples: usize,
    pub seed: u64,
    pub threads: usize,
    pub detailed: bool,
    /// Directory for stage logs; `EENN_STAGE_LOG_DIR` or `stage_logs` when unset.
    pub stage_log_dir: Option<PathBuf>,
}

impl Config for RunConfig {}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            log_level: 0,
            samples: 16,
            seed: 0,
            threads: 4,
            detailed: true,
            stage_log_dir: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SearchConfig {
    pub flexible_groups: Vec<FlexibleGroup>,
    /// Candidate cores; all compute cores when empty.
    pub cores: Vec<CoreId>,
    pub prefetch: Vec<Operand>,
    /// Workload order when empty.
    pub scheduling_order: Vec<NodeKey>,
    pub candidate: Option<Vec<CoreId>>,
    pub split_bound: SplitBound,
}

impl Config for SearchConfig {}

/// Everything needed to evaluate allocations of one workload.
pub struct Problem {
    pub run: RunConfig,
    pub search: SearchConfig,
    pub stages: StageConfig,
    pub workload: Workload,
    pub accelerator: Accelerator,
    pub lut: CostModelLut,
}

impl Problem {
    pub fn from_table(table: &Table) -> anyhow::Result<Problem> {
        let run = RunConfig::from_section(table.get("run")).context("invalid [run] section")?;
        let mut search =
            SearchConfig::from_section(table.get("search")).context("invalid [search] section")?;
        let stages = StageConfig::from_section(table.get("stages")).context("invalid [stages] section")?;
        let workload = WorkloadConfig::from_section(table.get("workload"))
            .context("invalid [workload] section")?
            .build()?;
        let accelerator = AcceleratorConfig::from_section(table.get("accelerator"))
            .context("invalid [accelerator] section")?
            .build()?;
        let lut = CostModelConfig::from_section(table.get("cost_model"))
            .context("invalid [cost_model] section")?
            .build();

        if search.cores.is_empty() {
            search.cores = accelerator.compute_core_ids();
        }
        if search.scheduling_order.is_empty() {
            search.scheduling_order = workload.keys();
        }

        Ok(Problem {
            run,
            search,
            stages,
            workload,
            accelerator,
            lut,
        })
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Problem> {
        let table: Table = toml::from_str(text).context("cannot parse problem toml")?;
        Self::from_table(&table)
    }
}
