use std::collections::HashSet;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::EvalError;
use crate::sched::{ScheduleResult, ScheduledNode};
use crate::stages::{StageConfig, StageMap};
use crate::timeq::Cycle;
use crate::workload::{NodeKey, Workload};

/// Latency and energy of one exit stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// 1-based, in execution order.
    pub stage_id: usize,
    pub block_latency: Cycle,
    pub classifier_latency: Cycle,
    /// From the first block start to the classifier end.
    pub latency: Cycle,
    pub energy: f64,
    /// Energy of next-stage blocks that started before this stage's exit.
    pub energy_overhead: f64,
    pub cum_energy: f64,
    pub cum_macs: u64,
    pub cum_latency_fraction: f64,
    pub energy_fraction: f64,
    pub cum_energy_fraction: f64,
    pub cum_macs_fraction: f64,
}

#[derive(Debug, Clone, Copy)]
struct StageSpan {
    block_start: Cycle,
    block_end: Cycle,
    classifier_start: Cycle,
    classifier_end: Cycle,
}

/// Splits a finished schedule into its early-exit stages.
#[derive(Debug, Clone)]
pub struct StageDecomposer {
    map: StageMap,
}

impl StageDecomposer {
    pub fn new(config: &StageConfig, workload: &Workload) -> Result<Self, EvalError> {
        Ok(Self {
            map: StageMap::build(workload, config)?,
        })
    }

    pub fn num_stages(&self) -> usize {
        self.map.num_stages()
    }

    pub fn stage_map(&self) -> &StageMap {
        &self.map
    }

    pub fn decompose(&self, schedule: &ScheduleResult) -> Result<Vec<StageRecord>, EvalError> {
        let num_stages = self.num_stages();
        let mut blocks = Vec::with_capacity(num_stages);
        let mut classifiers = Vec::with_capacity(num_stages);
        let mut spans = Vec::with_capacity(num_stages);
        for stage in 0..num_stages {
            let members = self.map.members(stage);
            let stage_blocks = scheduled(schedule, &members.blocks)?;
            let stage_classifiers = scheduled(schedule, &members.classifiers)?;
            let span = span_of(stage, &stage_blocks, &stage_classifiers)?;
            blocks.push(stage_blocks);
            classifiers.push(stage_classifiers);
            spans.push(span);
        }

        let total_macs = schedule.total_macs();
        let mut cum_energy = 0.0;
        let mut cum_macs: u64 = 0;
        let mut records = Vec::with_capacity(num_stages);
        for stage in 0..num_stages {
            let span = spans[stage];
            let stage_nodes: Vec<&ScheduledNode> =
                blocks[stage].iter().chain(&classifiers[stage]).copied().collect();
            let origins: HashSet<NodeKey> = stage_nodes.iter().map(|node| node.key).collect();

            let node_energy: f64 = stage_nodes.iter().map(|node| node.energy()).sum();
            let comm_energy: f64 = schedule
                .communication
                .iter()
                .filter(|event| origins.contains(&event.origin))
                .map(|event| event.energy)
                .sum();
            let energy = node_energy + comm_energy;

            let energy_overhead = match blocks.get(stage + 1) {
                Some(next_blocks) => next_blocks
                    .iter()
                    .filter(|node| node.start < span.classifier_end)
                    .map(|node| node.energy())
                    .sum(),
                None => 0.0,
            };

            cum_energy += energy;
            cum_macs += stage_nodes.iter().map(|node| node.macs).sum::<u64>();
            records.push(StageRecord {
                stage_id: stage + 1,
                block_latency: span.block_end - span.block_start,
                classifier_latency: span.classifier_end - span.classifier_start,
                latency: span.classifier_end - span.block_start,
                energy,
                energy_overhead,
                cum_energy,
                cum_macs,
                cum_latency_fraction: cumulative_fraction(span.classifier_end as f64, schedule.total_latency as f64),
                energy_fraction: fraction(energy, schedule.total_energy),
                cum_energy_fraction: cumulative_fraction(cum_energy, schedule.total_energy),
                cum_macs_fraction: cumulative_fraction(cum_macs as f64, total_macs as f64),
            });
        }
        debug!("schedule decomposed into {} stages", records.len());
        Ok(records)
    }
}

fn scheduled<'s>(schedule: &'s ScheduleResult, keys: &[NodeKey]) -> Result<Vec<&'s ScheduledNode>, EvalError> {
    keys.iter()
        .map(|&key| schedule.node(key).ok_or(EvalError::UnknownNode(key)))
        .collect()
}

fn span_of(
    stage: usize,
    blocks: &[&ScheduledNode],
    classifiers: &[&ScheduledNode],
) -> Result<StageSpan, EvalError> {
    let (Some(block_start), Some(block_end)) = (
        blocks.iter().map(|node| node.start).min(),
        blocks.iter().map(|node| node.end).max(),
    ) else {
        return Err(EvalError::EmptyStage { stage, role: "block" });
    };
    let (Some(classifier_start), Some(classifier_end)) = (
        classifiers.iter().map(|node| node.start).min(),
        classifiers.iter().map(|node| node.end).max(),
    ) else {
        return Err(EvalError::EmptyStage {
            stage,
            role: "classifier",
        });
    };

    if classifier_end < block_end {
        warn!("stage {stage}: classifier ends at {classifier_end}, before its blocks end at {block_end}");
        return Err(EvalError::StageOrder {
            stage,
            detail: format!("classifier end {classifier_end} precedes block end {block_end}"),
        });
    }
    if classifier_start < block_start {
        warn!("stage {stage}: classifier starts at {classifier_start}, before its blocks start at {block_start}");
        return Err(EvalError::StageOrder {
            stage,
            detail: format!("classifier start {classifier_start} precedes block start {block_start}"),
        });
    }

    Ok(StageSpan {
        block_start,
        block_end,
        classifier_start,
        classifier_end,
    })
}

fn fraction(value: f64, total: f64) -> f64 {
    if total > 0.0 {
        value / total
    } else {
        0.0
    }
}

/// Share of the whole schedule completed so far; nothing to complete counts
/// as complete.
fn cumulative_fraction(value: f64, total: f64) -> f64 {
    if total > 0.0 {
        value / total
    } else {
        1.0
    }
}
