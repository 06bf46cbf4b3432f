//! Dense latency and energy tables for the allocation optimizer.
//!
//! Every `(node, core, k)` triple gets an entry. A node that cannot run on a
//! core, or cannot be split `k` ways there, is recorded as
//! [`Cost::Infeasible`]; the numeric views substitute [`IMPOSSIBLE`] so the
//! optimizer can index the table without branching on missing keys.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use log::debug;
use serde::Deserialize;

use crate::cost::CostModelLut;
use crate::error::EvalError;
use crate::hardware::{Accelerator, CoreId};
use crate::ids::{self, CompositeId};
use crate::workload::Node;

/// Stand-in for latencies and energies that cannot be achieved.
pub const IMPOSSIBLE: f64 = 1e11;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cost {
    Feasible(f64),
    Infeasible,
}

impl Cost {
    pub fn is_feasible(&self) -> bool {
        matches!(self, Cost::Feasible(_))
    }

    pub fn value(&self) -> Option<f64> {
        match *self {
            Cost::Feasible(value) => Some(value),
            Cost::Infeasible => None,
        }
    }

    pub fn or_sentinel(&self) -> f64 {
        self.value().unwrap_or(IMPOSSIBLE)
    }
}

/// Upper bound on the split factor of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitBound {
    /// At most as many ways as there are candidate cores.
    #[default]
    CandidateCores,
    /// At most as many ways as there are cores the node can run on.
    FeasibleCores,
}

/// `(node key, core, split factor)`.
pub type SplitKey = (CompositeId, CoreId, usize);

#[derive(Debug, Clone)]
pub struct FeasibilityTable {
    core_ids: Vec<CoreId>,
    latencies: BTreeMap<SplitKey, Cost>,
    feasible_cores: BTreeMap<CompositeId, Vec<CoreId>>,
    split_sizes: BTreeMap<(CompositeId, CoreId), u64>,
}

impl FeasibilityTable {
    pub fn core_ids(&self) -> &[CoreId] {
        &self.core_ids
    }

    pub fn len(&self) -> usize {
        self.latencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latencies.is_empty()
    }

    pub fn latency(&self, node: CompositeId, core: CoreId, k: usize) -> Cost {
        self.latencies
            .get(&(node, core, k))
            .copied()
            .unwrap_or(Cost::Infeasible)
    }

    pub fn is_splittable(&self, node: CompositeId, core: CoreId, k: usize) -> bool {
        self.latency(node, core, k).is_feasible()
    }

    /// Cores the node has a performance record for.
    pub fn feasible_cores(&self, node: CompositeId) -> &[CoreId] {
        self.feasible_cores
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn split_loop_size(&self, node: CompositeId, core: CoreId) -> Option<u64> {
        self.split_sizes.get(&(node, core)).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SplitKey, &Cost)> + '_ {
        self.latencies.iter()
    }

    /// Latency per triple, with [`IMPOSSIBLE`] for infeasible entries.
    pub fn dense_latencies(&self) -> BTreeMap<SplitKey, f64> {
        self.latencies
            .iter()
            .map(|(&key, cost)| (key, cost.or_sentinel()))
            .collect()
    }

    /// Whether each triple is a feasible allocation split.
    pub fn splits(&self) -> BTreeMap<SplitKey, bool> {
        self.latencies
            .iter()
            .map(|(&key, cost)| (key, cost.is_feasible()))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct EnergyTable {
    energies: BTreeMap<(CompositeId, CoreId), Cost>,
}

impl EnergyTable {
    pub fn len(&self) -> usize {
        self.energies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energies.is_empty()
    }

    pub fn energy(&self, node: CompositeId, core: CoreId) -> Cost {
        self.energies
            .get(&(node, core))
            .copied()
            .unwrap_or(Cost::Infeasible)
    }

    pub fn dense(&self) -> BTreeMap<(CompositeId, CoreId), f64> {
        self.energies
            .iter()
            .map(|(&key, cost)| (key, cost.or_sentinel()))
            .collect()
    }
}

pub struct FeasibilityBuilder<'a> {
    accelerator: &'a Accelerator,
    lut: &'a CostModelLut,
    bound: SplitBound,
}

impl<'a> FeasibilityBuilder<'a> {
    pub fn new(accelerator: &'a Accelerator, lut: &'a CostModelLut) -> Self {
        Self {
            accelerator,
            lut,
            bound: SplitBound::default(),
        }
    }

    pub fn with_bound(mut self, bound: SplitBound) -> Self {
        self.bound = bound;
        self
    }

    /// Builds the split-latency table over `nodes` and `core_ids`.
    ///
    /// Fails only on identities the table cannot be keyed by: an unknown
    /// core, or a node whose minor id overflows the composite key.
    pub fn build<'n, I>(&self, nodes: I, core_ids: &[CoreId]) -> Result<FeasibilityTable, EvalError>
    where
        I: IntoIterator<Item = &'n Node>,
    {
        let nodes: Vec<&Node> = nodes.into_iter().collect();
        for &core_id in core_ids {
            self.accelerator.get_core(core_id)?;
        }

        let mut base: BTreeMap<(CompositeId, CoreId), (f64, u64)> = BTreeMap::new();
        let mut feasible_cores: BTreeMap<CompositeId, Vec<CoreId>> = BTreeMap::new();
        let mut split_sizes = BTreeMap::new();
        let mut keys = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let key = ids::pack_key(node.key())?;
            keys.push(key);
            let possible = feasible_cores.entry(key).or_default();
            for &core_id in core_ids {
                match self.lut.lookup(node, core_id) {
                    Some(record) => {
                        let split_size = record.split_loop_size();
                        base.insert((key, core_id), (record.latency_total, split_size));
                        split_sizes.insert((key, core_id), split_size);
                        possible.push(core_id);
                    }
                    None => debug!("node {} has no performance record on core {}", node.key(), core_id),
                }
            }
        }

        let k_max = core_ids.len();
        let mut latencies = BTreeMap::new();
        for &key in &keys {
            let bound = match self.bound {
                SplitBound::CandidateCores => k_max,
                SplitBound::FeasibleCores => feasible_cores.get(&key).map_or(0, Vec::len),
            };
            for &core_id in core_ids {
                for k in 1..=k_max {
                    let cost = match base.get(&(key, core_id)) {
                        Some(&(latency, split_size)) => split_latency(latency, split_size, k, bound),
                        None => Cost::Infeasible,
                    };
                    latencies.insert((key, core_id, k), cost);
                }
            }
        }
        debug!(
            "feasibility table built: {} nodes x {} cores, {} entries",
            keys.len(),
            k_max,
            latencies.len()
        );

        Ok(FeasibilityTable {
            core_ids: core_ids.to_vec(),
            latencies,
            feasible_cores,
            split_sizes,
        })
    }

    /// Energy of every `(node, core)` pair; no split adjustment.
    pub fn energies<'n, I>(&self, nodes: I, core_ids: &[CoreId]) -> Result<EnergyTable, EvalError>
    where
        I: IntoIterator<Item = &'n Node>,
    {
        let mut energies = BTreeMap::new();
        for node in nodes {
            let key = ids::pack_key(node.key())?;
            for &core_id in core_ids {
                let cost = match self.lut.lookup(node, core_id) {
                    Some(record) => Cost::Feasible(record.energy_total),
                    None => Cost::Infeasible,
                };
                energies.insert((key, core_id), cost);
            }
        }
        Ok(EnergyTable { energies })
    }
}

/// Latency of a node split `k` ways over a loop of `split_size` iterations.
pub fn split_latency(latency: f64, split_size: u64, k: usize, bound: usize) -> Cost {
    let split_size = split_size.max(1);
    let k_u64 = k as u64;
    if k == 0 || split_size % k_u64 != 0 || k > bound {
        return Cost::Infeasible;
    }
    Cost::Feasible((latency / split_size.min(k_u64) as f64).floor())
}

/// Holds one feasibility table for the lifetime of a search run.
#[derive(Debug, Default)]
pub struct FeasibilityCache {
    table: Mutex<Option<Arc<FeasibilityTable>>>,
}

impl FeasibilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached table, building it with `build` on first use.
    pub fn get_or_build<F>(&self, build: F) -> Result<Arc<FeasibilityTable>, EvalError>
    where
        F: FnOnce() -> Result<FeasibilityTable, EvalError>,
    {
        let mut guard = self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(table) = guard.as_ref() {
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(build()?);
        *guard = Some(Arc::clone(&table));
        Ok(table)
    }

    pub fn is_built(&self) -> bool {
        self.table
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}
