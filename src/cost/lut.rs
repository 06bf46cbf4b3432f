use std::collections::{BTreeMap, HashMap};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::hardware::{CoreId, MemoryAccesses};
use crate::workload::{LoopDim, Node, NodeSignature, Operand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalLoop {
    pub dim: LoopDim,
    pub size: u64,
}

impl TemporalLoop {
    pub fn new(dim: LoopDim, size: u64) -> Self {
        Self { dim, size }
    }
}

/// Product of the sizes of the loops over `dims`; 1 when none match.
pub fn get_loop_size(loops: &[TemporalLoop], dims: &[LoopDim]) -> u64 {
    loops
        .iter()
        .filter(|tl| dims.contains(&tl.dim))
        .map(|tl| tl.size)
        .product()
}

/// Cost-model result of one equivalence class on one core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub latency_total: f64,
    pub energy_total: f64,
    /// Per-operand energy per memory level, innermost first; the last entry
    /// is the off-chip level.
    #[serde(default)]
    pub mem_energy_breakdown: BTreeMap<Operand, Vec<f64>>,
    /// Output-stationary temporal mapping, one loop list per memory level.
    #[serde(default)]
    pub temporal_mapping: Vec<Vec<TemporalLoop>>,
    /// Access bandwidth per memory instance name.
    #[serde(default)]
    pub inst_bandwidth: BTreeMap<String, MemoryAccesses>,
}

impl PerformanceRecord {
    pub fn new(latency_total: f64, energy_total: f64) -> Self {
        Self {
            latency_total,
            energy_total,
            mem_energy_breakdown: BTreeMap::new(),
            temporal_mapping: Vec::new(),
            inst_bandwidth: BTreeMap::new(),
        }
    }

    pub fn temporal_loops(&self) -> Vec<TemporalLoop> {
        self.temporal_mapping.iter().flatten().copied().collect()
    }

    /// Parallelism exposed along the output-channel and group dimensions.
    pub fn split_loop_size(&self) -> u64 {
        get_loop_size(&self.temporal_loops(), &LoopDim::SPLITTABLE)
    }

    /// Energy spent on `operand` in the off-chip level.
    pub fn offchip_energy(&self, operand: Operand) -> f64 {
        self.mem_energy_breakdown
            .get(&operand)
            .and_then(|levels| levels.last())
            .copied()
            .unwrap_or(0.0)
    }

    pub fn get_total_inst_bandwidth(&self, instance: &str) -> MemoryAccesses {
        self.inst_bandwidth
            .get(instance)
            .copied()
            .unwrap_or_default()
    }
}

/// Handle to a set of nodes that share cost-model results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EquivalenceClass(usize);

#[derive(Debug, Clone)]
struct ClassEntry {
    signature: NodeSignature,
    records: BTreeMap<CoreId, PerformanceRecord>,
}

/// Precomputed cost-model results, indexed by equivalence class and core.
#[derive(Debug, Clone, Default)]
pub struct CostModelLut {
    classes: Vec<ClassEntry>,
    by_signature: HashMap<NodeSignature, EquivalenceClass>,
}

impl CostModelLut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, signature: NodeSignature, core: CoreId, record: PerformanceRecord) {
        let class = match self.by_signature.get(&signature) {
            Some(&class) => class,
            None => {
                let class = EquivalenceClass(self.classes.len());
                self.classes.push(ClassEntry {
                    signature: signature.clone(),
                    records: BTreeMap::new(),
                });
                self.by_signature.insert(signature, class);
                class
            }
        };
        self.classes[class.0].records.insert(core, record);
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn find_equivalent(&self, node: &Node) -> Option<EquivalenceClass> {
        self.by_signature.get(&node.signature()).copied()
    }

    pub fn signature(&self, class: EquivalenceClass) -> &NodeSignature {
        &self.classes[class.0].signature
    }

    pub fn get_record(&self, class: EquivalenceClass, core: CoreId) -> Option<&PerformanceRecord> {
        self.classes.get(class.0)?.records.get(&core)
    }

    /// Record of the node's equivalence class on `core`, if both exist.
    pub fn lookup(&self, node: &Node, core: CoreId) -> Option<&PerformanceRecord> {
        let class = self.find_equivalent(node)?;
        self.get_record(class, core)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CoreRecordConfig {
    pub core: CoreId,
    #[serde(flatten)]
    pub record: PerformanceRecord,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassConfig {
    pub signature: NodeSignature,
    #[serde(default)]
    pub records: Vec<CoreRecordConfig>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CostModelConfig {
    pub classes: Vec<ClassConfig>,
}

impl Config for CostModelConfig {}

impl CostModelConfig {
    pub fn build(self) -> CostModelLut {
        let mut lut = CostModelLut::new();
        for class in self.classes {
            for entry in class.records {
                lut.insert(class.signature.clone(), entry.core, entry.record);
            }
        }
        debug!("cost model loaded: {} equivalence classes", lut.len());
        lut
    }
}
