pub mod graph;
pub mod node;
pub mod operand;

pub use graph::{EdgeConfig, Workload, WorkloadConfig};
pub use node::{Node, NodeEvaluation, NodeKey, NodeSignature, NodeTag};
pub use operand::{LoopDim, Operand};
