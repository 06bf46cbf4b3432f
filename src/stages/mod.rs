pub mod config;
pub mod decompose;

pub use config::{StageConfig, StageMap, StageMembers, StageRole, StageSpec};
pub use decompose::{StageDecomposer, StageRecord};
