//! Error types for allocation evaluation.

use crate::hardware::CoreId;
use crate::workload::NodeKey;

/// Fatal conditions raised while evaluating an allocation.
///
/// Missing cost-model data while building the feasibility table is not an
/// error; it is recorded as an infeasible entry instead.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// The evaluator does not provide a fitness function.
    #[error("{0} does not implement get_fitness")]
    NotImplemented(&'static str),

    /// The minor id does not fit the 1000-wide field of the composite key.
    #[error("minor id {minor} of node ({major}, {minor}) does not fit in a composite key")]
    MinorIdOutOfRange { major: u32, minor: u32 },

    /// The accelerator has no core with this id.
    #[error("unknown core {0}")]
    UnknownCore(CoreId),

    /// The workload has no node with this key.
    #[error("unknown node {0}")]
    UnknownNode(NodeKey),

    /// Two nodes share the same (major, minor) identity.
    #[error("duplicate node {0}")]
    DuplicateNode(NodeKey),

    /// The node has no equivalence class in the cost-model lookup table.
    #[error("node {node} not found in the cost-model lookup table")]
    NoEquivalentNode { node: NodeKey },

    /// The node's equivalence class was never evaluated on the chosen core.
    #[error("no performance record for node {node} on core {core}")]
    MissingRecord { node: NodeKey, core: CoreId },

    /// The candidate does not carry one core per flexible group.
    #[error("allocation candidate has {got} entries, expected {expected}")]
    CandidateLength { expected: usize, got: usize },

    /// The node reached the scheduler without a core allocation.
    #[error("node {0} has no core allocation")]
    Unallocated(NodeKey),

    /// The scheduling order is inconsistent with the workload.
    #[error("scheduling order invalid at node {node}: {detail}")]
    ScheduleOrder { node: NodeKey, detail: String },

    /// The schedule contradicts the stage tagging.
    #[error("stage {stage} out of order: {detail}")]
    StageOrder { stage: usize, detail: String },

    /// A stage has no node in one of its two subsets.
    #[error("stage {stage} has no {role} nodes")]
    EmptyStage { stage: usize, role: &'static str },

    /// A node that performs work belongs to no stage.
    #[error("node {0} performs work but belongs to no stage")]
    UnassignedNode(NodeKey),

    /// Stage records could not be persisted.
    #[error("cannot write stage log: {0}")]
    StageLog(#[from] std::io::Error),
}
