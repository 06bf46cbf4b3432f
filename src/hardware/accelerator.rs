use std::collections::BTreeMap;

use serde::Deserialize;

use crate::config::Config;
use crate::error::EvalError;
use crate::hardware::{Core, CoreId, MemoryLevel};
use crate::timeq::LinkConfig;

/// Set of cores plus the links that connect them.
#[derive(Debug, Clone)]
pub struct Accelerator {
    cores: BTreeMap<CoreId, Core>,
    offchip_core_id: Option<CoreId>,
    bus: LinkConfig,
    offchip_link: LinkConfig,
}

impl Accelerator {
    pub fn new(
        cores: Vec<Core>,
        offchip_core_id: Option<CoreId>,
        bus: LinkConfig,
        offchip_link: LinkConfig,
    ) -> Result<Self, EvalError> {
        let cores: BTreeMap<CoreId, Core> = cores.into_iter().map(|core| (core.id, core)).collect();
        if let Some(id) = offchip_core_id {
            if !cores.contains_key(&id) {
                return Err(EvalError::UnknownCore(id));
            }
        }
        Ok(Self {
            cores,
            offchip_core_id,
            bus,
            offchip_link,
        })
    }

    pub fn get_core(&self, id: CoreId) -> Result<&Core, EvalError> {
        self.cores.get(&id).ok_or(EvalError::UnknownCore(id))
    }

    pub fn cores(&self) -> impl Iterator<Item = &Core> + '_ {
        self.cores.values()
    }

    /// Ids of the cores that can run computation.
    pub fn compute_core_ids(&self) -> Vec<CoreId> {
        self.cores
            .keys()
            .copied()
            .filter(|&id| Some(id) != self.offchip_core_id)
            .collect()
    }

    pub fn offchip_core_id(&self) -> Option<CoreId> {
        self.offchip_core_id
    }

    /// Memory instance of the designated off-chip core, if there is one.
    pub fn offchip_instance(&self) -> Option<&MemoryLevel> {
        let id = self.offchip_core_id?;
        self.cores.get(&id)?.top_instance()
    }

    pub fn bus(&self) -> &LinkConfig {
        &self.bus
    }

    pub fn offchip_link(&self) -> &LinkConfig {
        &self.offchip_link
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AcceleratorConfig {
    pub cores: Vec<Core>,
    pub offchip_core_id: Option<CoreId>,
    pub bus: LinkConfig,
    pub offchip_link: LinkConfig,
}

impl Config for AcceleratorConfig {}

impl AcceleratorConfig {
    pub fn build(self) -> Result<Accelerator, EvalError> {
        Accelerator::new(self.cores, self.offchip_core_id, self.bus, self.offchip_link)
    }
}
