//! Scheduler contract and the reference list scheduler.

pub mod list;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::EvalError;
use crate::hardware::{Accelerator, CoreId};
use crate::timeq::Cycle;
use crate::workload::{NodeKey, Operand, Workload};

pub use list::ListScheduler;

/// Runs a workload whose nodes carry their allocation.
///
/// Implementations receive owned copies and may consume or mutate them.
pub trait Scheduler: Send + Sync {
    fn run(
        &self,
        workload: Workload,
        accelerator: Accelerator,
        prefetch: &[Operand],
        order: &[NodeKey],
    ) -> Result<ScheduleResult, EvalError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledNode {
    pub key: NodeKey,
    pub core: CoreId,
    pub start: Cycle,
    pub end: Cycle,
    pub onchip_energy: f64,
    pub offchip_energy: f64,
    pub macs: u64,
}

impl ScheduledNode {
    pub fn energy(&self) -> f64 {
        self.onchip_energy + self.offchip_energy
    }
}

/// Transfer of a node's output tensor between two cores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommunicationEvent {
    pub origin: NodeKey,
    pub sender: CoreId,
    pub receiver: CoreId,
    pub start: Cycle,
    pub end: Cycle,
    pub bits: u64,
    pub energy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleResult {
    pub total_energy: f64,
    pub total_latency: Cycle,
    pub nodes: BTreeMap<NodeKey, ScheduledNode>,
    pub communication: Vec<CommunicationEvent>,
    /// The evaluated workload copy.
    #[serde(skip)]
    pub workload: Workload,
}

impl ScheduleResult {
    pub fn node(&self, key: NodeKey) -> Option<&ScheduledNode> {
        self.nodes.get(&key)
    }

    pub fn total_macs(&self) -> u64 {
        self.nodes.values().map(|node| node.macs).sum()
    }

    pub fn communication_energy(&self) -> f64 {
        self.communication.iter().map(|event| event.energy).sum()
    }
}
