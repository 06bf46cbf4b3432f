use std::collections::HashMap;

use serde::Deserialize;

use crate::config::Config;
use crate::error::EvalError;
use crate::workload::{NodeKey, NodeTag, Workload};

/// Backbone blocks and exit classifiers that make up one stage.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct StageSpec {
    pub blocks: Vec<u32>,
    pub exits: Vec<u32>,
}

/// Grouping of blocks and exits into ordered stages.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct StageConfig {
    pub stages: Vec<StageSpec>,
}

impl Config for StageConfig {}

impl StageConfig {
    /// `num_stages` stages of `blocks_per_stage` consecutive blocks, each
    /// followed by one exit.
    pub fn uniform(num_stages: u32, blocks_per_stage: u32) -> Self {
        let stages = (0..num_stages)
            .map(|stage| StageSpec {
                blocks: (stage * blocks_per_stage..(stage + 1) * blocks_per_stage).collect(),
                exits: vec![stage],
            })
            .collect();
        Self { stages }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRole {
    Block,
    Classifier,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageMembers {
    pub blocks: Vec<NodeKey>,
    pub classifiers: Vec<NodeKey>,
}

/// Node to stage assignment, resolved once per workload.
#[derive(Debug, Clone)]
pub struct StageMap {
    assignment: HashMap<NodeKey, (usize, StageRole)>,
    members: Vec<StageMembers>,
}

impl StageMap {
    pub fn build(workload: &Workload, config: &StageConfig) -> Result<Self, EvalError> {
        let mut block_stage = HashMap::new();
        let mut exit_stage = HashMap::new();
        for (stage, spec) in config.stages.iter().enumerate() {
            block_stage.extend(spec.blocks.iter().map(|&block| (block, stage)));
            exit_stage.extend(spec.exits.iter().map(|&exit| (exit, stage)));
        }

        let mut assignment = HashMap::new();
        let mut members = vec![StageMembers::default(); config.len()];
        for node in workload.nodes() {
            let slot = match node.tag {
                NodeTag::Stem if !config.is_empty() => Some((0, StageRole::Block)),
                NodeTag::Block(block) => block_stage.get(&block).map(|&s| (s, StageRole::Block)),
                NodeTag::Exit(exit) => exit_stage.get(&exit).map(|&s| (s, StageRole::Classifier)),
                _ => None,
            };
            match slot {
                Some((stage, role)) => {
                    assignment.insert(node.key(), (stage, role));
                    match role {
                        StageRole::Block => members[stage].blocks.push(node.key()),
                        StageRole::Classifier => members[stage].classifiers.push(node.key()),
                    }
                }
                None if node.macs > 0 => return Err(EvalError::UnassignedNode(node.key())),
                None => {}
            }
        }

        for (stage, stage_members) in members.iter().enumerate() {
            if stage_members.blocks.is_empty() {
                return Err(EvalError::EmptyStage { stage, role: "block" });
            }
            if stage_members.classifiers.is_empty() {
                return Err(EvalError::EmptyStage {
                    stage,
                    role: "classifier",
                });
            }
        }

        Ok(Self { assignment, members })
    }

    pub fn num_stages(&self) -> usize {
        self.members.len()
    }

    pub fn stage_of(&self, key: NodeKey) -> Option<(usize, StageRole)> {
        self.assignment.get(&key).copied()
    }

    pub fn members(&self, stage: usize) -> &StageMembers {
        &self.members[stage]
    }
}
