use std::collections::BTreeMap;

use crate::cost::{CostModelLut, PerformanceRecord, TemporalLoop};
use crate::hardware::{Accelerator, Core, CoreId, MemoryLevel};
use crate::sched::{CommunicationEvent, ScheduleResult, ScheduledNode};
use crate::timeq::{Cycle, LinkConfig};
use crate::workload::{LoopDim, Node, NodeKey, NodeTag, Operand, Workload};

pub const BUS_ENERGY_PER_BIT: f64 = 0.5;

pub fn sram_core(id: CoreId, capacity_bits: u64) -> Core {
    Core::new(
        id,
        vec![MemoryLevel {
            name: format!("sram{id}"),
            operands: Operand::ALL.to_vec(),
            capacity_bits,
            offchip: false,
        }],
    )
}

pub fn dram_core(id: CoreId) -> Core {
    Core::new(
        id,
        vec![MemoryLevel {
            name: "dram".to_string(),
            operands: Operand::ALL.to_vec(),
            capacity_bits: u64::MAX,
            offchip: true,
        }],
    )
}

pub fn bus() -> LinkConfig {
    LinkConfig {
        base_latency: 0,
        bytes_per_cycle: 8,
        energy_per_bit: BUS_ENERGY_PER_BIT,
    }
}

pub fn offchip_link() -> LinkConfig {
    LinkConfig {
        base_latency: 10,
        bytes_per_cycle: 4,
        energy_per_bit: 0.0,
    }
}

/// `num_cores` compute cores with ample on-chip memory.
pub fn accelerator(num_cores: u32) -> Accelerator {
    let cores = (0..num_cores).map(|id| sram_core(id, 1 << 20)).collect();
    Accelerator::new(cores, None, bus(), offchip_link()).expect("valid accelerator")
}

/// Convolution node whose signature is unique per `k`.
pub fn conv(id: u32, sub_id: u32, k: u64) -> Node {
    let mut node = Node::new(id, sub_id, "conv");
    node.loop_sizes = BTreeMap::from([(LoopDim::K, k), (LoopDim::C, 4)]);
    node.operand_size = BTreeMap::from([(Operand::Input, 64), (Operand::Weight, 64), (Operand::Output, 64)]);
    node.macs = 100;
    node
}

pub fn tagged(mut node: Node, tag: NodeTag, macs: u64) -> Node {
    node.tag = tag;
    node.macs = macs;
    node
}

/// Record whose output-stationary mapping exposes `k * g` split parallelism.
pub fn record(latency: f64, energy: f64, k: u64, g: u64) -> PerformanceRecord {
    let mut record = PerformanceRecord::new(latency, energy);
    record.temporal_mapping = vec![
        vec![TemporalLoop::new(LoopDim::C, 4), TemporalLoop::new(LoopDim::K, k)],
        vec![TemporalLoop::new(LoopDim::G, g), TemporalLoop::new(LoopDim::OX, 7)],
    ];
    record
}

/// Lookup table giving every node the same record on each of `cores`.
pub fn uniform_lut(nodes: &[Node], cores: &[(CoreId, PerformanceRecord)]) -> CostModelLut {
    let mut lut = CostModelLut::new();
    for node in nodes {
        for (core, record) in cores {
            lut.insert(node.signature(), *core, record.clone());
        }
    }
    lut
}

/// `a -> b -> c` chain of distinct layers.
pub fn chain_workload() -> Workload {
    let nodes = vec![conv(0, 0, 16), conv(1, 0, 32), conv(2, 0, 64)];
    let edges = vec![
        (NodeKey::new(0, 0), NodeKey::new(1, 0)),
        (NodeKey::new(1, 0), NodeKey::new(2, 0)),
    ];
    Workload::new(nodes, edges).expect("valid workload")
}

pub fn scheduled(key: NodeKey, core: CoreId, start: Cycle, end: Cycle, energy: f64, macs: u64) -> ScheduledNode {
    ScheduledNode {
        key,
        core,
        start,
        end,
        onchip_energy: energy,
        offchip_energy: 0.0,
        macs,
    }
}

pub fn schedule_of(
    workload: Workload,
    nodes: Vec<ScheduledNode>,
    communication: Vec<CommunicationEvent>,
) -> ScheduleResult {
    let node_energy: f64 = nodes.iter().map(ScheduledNode::energy).sum();
    let comm_energy: f64 = communication.iter().map(|event| event.energy).sum();
    let total_latency = nodes.iter().map(|node| node.end).max().unwrap_or(0);
    ScheduleResult {
        total_energy: node_energy + comm_energy,
        total_latency,
        nodes: nodes.into_iter().map(|node| (node.key, node)).collect(),
        communication,
        workload,
    }
}
