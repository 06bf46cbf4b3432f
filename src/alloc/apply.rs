use std::collections::BTreeMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::cost::{CostModelLut, PerformanceRecord};
use crate::error::EvalError;
use crate::hardware::{Accelerator, Core, CoreId};
use crate::timeq::Cycle;
use crate::workload::{Node, NodeEvaluation, NodeKey, Operand, Workload};

/// Nodes of one layer that must share one core choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlexibleGroup {
    pub id: u32,
    #[serde(default)]
    pub group: u32,
}

impl FlexibleGroup {
    pub fn new(id: u32, group: u32) -> Self {
        Self { id, group }
    }

    pub fn contains(&self, node: &Node) -> bool {
        node.flexible_group() == (self.id, self.group)
    }
}

/// Per-node fields derived from one allocation candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationResult {
    entries: BTreeMap<NodeKey, NodeEvaluation>,
}

impl AllocationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: NodeKey, eval: NodeEvaluation) {
        self.entries.insert(key, eval);
    }

    pub fn get(&self, key: NodeKey) -> Option<&NodeEvaluation> {
        self.entries.get(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, &NodeEvaluation)> + '_ {
        self.entries.iter()
    }

    /// Adds every entry of `other`, overriding entries with the same key.
    pub fn extend(&mut self, other: &AllocationResult) {
        for (&key, eval) in other.iter() {
            self.entries.insert(key, eval.clone());
        }
    }
}

/// Operands of `node` whose tensors exceed the core's on-chip memory.
pub fn too_large_operands(node: &Node, core: &Core) -> SmallVec<[Operand; 3]> {
    Operand::ALL
        .into_iter()
        .filter(|&operand| {
            let bits = node.operand_bits(operand);
            bits > 0 && !core.fits_on_chip(operand, bits)
        })
        .collect()
}

/// Derives node evaluations from allocation candidates.
pub struct Allocator<'a> {
    accelerator: &'a Accelerator,
    lut: &'a CostModelLut,
}

impl<'a> Allocator<'a> {
    pub fn new(accelerator: &'a Accelerator, lut: &'a CostModelLut) -> Self {
        Self { accelerator, lut }
    }

    /// Evaluates every member of every flexible group on the core the
    /// candidate picks for that group.
    pub fn derive(
        &self,
        workload: &Workload,
        groups: &[FlexibleGroup],
        candidate: &[CoreId],
    ) -> Result<AllocationResult, EvalError> {
        if groups.len() != candidate.len() {
            return Err(EvalError::CandidateLength {
                expected: groups.len(),
                got: candidate.len(),
            });
        }

        let mut result = AllocationResult::new();
        for (group, &core_id) in groups.iter().zip(candidate) {
            for node in workload.group_members(group.id, group.group) {
                result.insert(node.key(), self.evaluate(node, core_id)?);
            }
        }
        debug!("allocation {:?} derived for {} nodes", candidate, result.len());
        Ok(result)
    }

    /// Evaluates the nodes outside every flexible group on their fixed core.
    pub fn derive_fixed(
        &self,
        workload: &Workload,
        groups: &[FlexibleGroup],
    ) -> Result<AllocationResult, EvalError> {
        let mut result = AllocationResult::new();
        for node in workload.nodes() {
            if groups.iter().any(|group| group.contains(node)) {
                continue;
            }
            if let Some(core_id) = node.fixed_core {
                result.insert(node.key(), self.evaluate(node, core_id)?);
            }
        }
        Ok(result)
    }

    /// Evaluation outputs of `node` on `core_id`.
    pub fn evaluate(&self, node: &Node, core_id: CoreId) -> Result<NodeEvaluation, EvalError> {
        let core = self.accelerator.get_core(core_id)?;
        let record = self.record(node, core_id)?;
        Ok(self.split_energy(node, core, record))
    }

    fn record(&self, node: &Node, core_id: CoreId) -> Result<&'a PerformanceRecord, EvalError> {
        let Some(class) = self.lut.find_equivalent(node) else {
            warn!("node {} not found in the cost-model lookup table", node.key());
            return Err(EvalError::NoEquivalentNode { node: node.key() });
        };
        self.lut.get_record(class, core_id).ok_or_else(|| {
            warn!("node {} was never evaluated on core {}", node.key(), core_id);
            EvalError::MissingRecord {
                node: node.key(),
                core: core_id,
            }
        })
    }

    fn split_energy(&self, node: &Node, core: &Core, record: &PerformanceRecord) -> NodeEvaluation {
        let too_large = too_large_operands(node, core);
        let mut onchip_energy = record.energy_total;
        let mut offchip_energy = 0.0;
        for &operand in &too_large {
            let operand_offchip = record.offchip_energy(operand);
            offchip_energy += operand_offchip;
            onchip_energy -= operand_offchip;
        }

        let offchip_bandwidth = match self.accelerator.offchip_instance() {
            Some(instance) => record.get_total_inst_bandwidth(&instance.name),
            None => Default::default(),
        };

        NodeEvaluation {
            onchip_energy,
            offchip_energy,
            runtime: record.latency_total.trunc() as Cycle,
            core: Some(core.id),
            too_large_operands: too_large,
            offchip_bandwidth,
        }
    }
}
