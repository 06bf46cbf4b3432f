use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::hardware::{CoreId, MemoryAccesses};
use crate::timeq::Cycle;
use crate::workload::{LoopDim, Operand};

/// Precision assumed for operands without an explicit bit width.
pub const DEFAULT_PRECISION: u32 = 8;

/// `(major, minor)` identity of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    pub id: u32,
    #[serde(default)]
    pub sub_id: u32,
}

impl NodeKey {
    pub fn new(id: u32, sub_id: u32) -> Self {
        Self { id, sub_id }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.id, self.sub_id)
    }
}

/// Position of a node in an early-exit network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "index")]
pub enum NodeTag {
    #[default]
    Untagged,
    /// Computation ahead of the first block.
    Stem,
    /// Backbone block.
    Block(u32),
    /// Exit classifier.
    Exit(u32),
}

impl NodeTag {
    /// Derives the tag from exported layer names such as `/blocks.3/conv/Conv`
    /// or `/classifiers.1/fc/Gemm`.
    pub fn from_name(name: &str) -> NodeTag {
        if let Some(index) = indexed_segment(name, "blocks.") {
            return NodeTag::Block(index);
        }
        if let Some(index) = indexed_segment(name, "classifiers.") {
            return NodeTag::Exit(index);
        }
        if name.split('/').any(|segment| segment == "stem" || segment.starts_with("stem.")) {
            return NodeTag::Stem;
        }
        NodeTag::Untagged
    }
}

fn indexed_segment(name: &str, prefix: &str) -> Option<u32> {
    let start = name.find(prefix)? + prefix.len();
    let rest = &name[start..];
    let end = rest.find('/')?;
    rest[..end].parse().ok()
}

/// Attributes that decide whether two nodes share cost-model results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeSignature {
    pub op_type: String,
    #[serde(default)]
    pub loop_sizes: BTreeMap<LoopDim, u64>,
    #[serde(default)]
    pub precision: BTreeMap<Operand, u32>,
}

/// Outputs written into a node when an allocation is applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeEvaluation {
    pub onchip_energy: f64,
    pub offchip_energy: f64,
    pub runtime: Cycle,
    pub core: Option<CoreId>,
    pub too_large_operands: SmallVec<[Operand; 3]>,
    pub offchip_bandwidth: MemoryAccesses,
}

impl NodeEvaluation {
    pub fn energy(&self) -> f64 {
        self.onchip_energy + self.offchip_energy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: u32,
    #[serde(default)]
    pub sub_id: u32,
    /// Coarse group; nodes sharing `(id, group)` share one core choice.
    #[serde(default)]
    pub group: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tag: NodeTag,
    pub op_type: String,
    #[serde(default)]
    pub loop_sizes: BTreeMap<LoopDim, u64>,
    #[serde(default)]
    pub precision: BTreeMap<Operand, u32>,
    /// Tensor sizes in elements.
    #[serde(default)]
    pub operand_size: BTreeMap<Operand, u64>,
    #[serde(default)]
    pub macs: u64,
    /// Core of a node that is not part of any flexible group.
    #[serde(default)]
    pub fixed_core: Option<CoreId>,
    #[serde(skip)]
    pub eval: NodeEvaluation,
}

impl Node {
    pub fn new(id: u32, sub_id: u32, op_type: &str) -> Self {
        Self {
            id,
            sub_id,
            group: 0,
            name: String::new(),
            tag: NodeTag::Untagged,
            op_type: op_type.to_string(),
            loop_sizes: BTreeMap::new(),
            precision: BTreeMap::new(),
            operand_size: BTreeMap::new(),
            macs: 0,
            fixed_core: None,
            eval: NodeEvaluation::default(),
        }
    }

    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.id, self.sub_id)
    }

    pub fn flexible_group(&self) -> (u32, u32) {
        (self.id, self.group)
    }

    pub fn signature(&self) -> NodeSignature {
        NodeSignature {
            op_type: self.op_type.clone(),
            loop_sizes: self.loop_sizes.clone(),
            precision: self.precision.clone(),
        }
    }

    pub fn precision_of(&self, operand: Operand) -> u32 {
        self.precision.get(&operand).copied().unwrap_or(DEFAULT_PRECISION)
    }

    /// Size of the operand tensor in bits.
    pub fn operand_bits(&self, operand: Operand) -> u64 {
        let elements = self.operand_size.get(&operand).copied().unwrap_or(0);
        elements.saturating_mul(self.precision_of(operand) as u64)
    }

    pub fn energy(&self) -> f64 {
        self.eval.energy()
    }
}
