use std::collections::{BTreeMap, HashMap, HashSet};

use log::debug;

use crate::error::EvalError;
use crate::hardware::{Accelerator, CoreId};
use crate::sched::{CommunicationEvent, ScheduleResult, ScheduledNode, Scheduler};
use crate::timeq::{Cycle, TimedLink};
use crate::workload::{NodeKey, Operand, Workload};

/// Non-preemptive list scheduler.
///
/// Nodes start in the given order on their allocated core once the core is
/// free and all inputs have arrived. Outputs crossing cores travel over the
/// shared bus; operands that do not fit on-chip are fetched over the off-chip
/// link before the node starts, or as soon as the core is free when the
/// operand is prefetched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListScheduler;

impl ListScheduler {
    pub fn new() -> Self {
        Self
    }

    fn check_order(workload: &Workload, order: &[NodeKey]) -> Result<(), EvalError> {
        let mut seen = HashSet::with_capacity(order.len());
        for &key in order {
            if workload.node(key).is_none() {
                return Err(EvalError::UnknownNode(key));
            }
            if !seen.insert(key) {
                return Err(EvalError::ScheduleOrder {
                    node: key,
                    detail: "scheduled twice".to_string(),
                });
            }
        }
        if let Some(missing) = workload.nodes().iter().find(|node| !seen.contains(&node.key())) {
            return Err(EvalError::ScheduleOrder {
                node: missing.key(),
                detail: "missing from the scheduling order".to_string(),
            });
        }
        Ok(())
    }
}

impl Scheduler for ListScheduler {
    fn run(
        &self,
        workload: Workload,
        accelerator: Accelerator,
        prefetch: &[Operand],
        order: &[NodeKey],
    ) -> Result<ScheduleResult, EvalError> {
        Self::check_order(&workload, order)?;

        let mut bus = TimedLink::new(*accelerator.bus());
        let mut offchip = TimedLink::new(*accelerator.offchip_link());
        let mut core_free: HashMap<CoreId, Cycle> = HashMap::new();
        let mut arrivals: HashMap<(NodeKey, CoreId), Cycle> = HashMap::new();
        let mut nodes: BTreeMap<NodeKey, ScheduledNode> = BTreeMap::new();
        let mut communication = Vec::new();

        for &key in order {
            let node = workload.node(key).ok_or(EvalError::UnknownNode(key))?;
            let core = node.eval.core.ok_or(EvalError::Unallocated(key))?;
            accelerator.get_core(core)?;

            let mut ready: Cycle = 0;
            for &pred in workload.predecessors(key) {
                let Some(producer) = nodes.get(&pred) else {
                    return Err(EvalError::ScheduleOrder {
                        node: key,
                        detail: format!("predecessor {pred} is scheduled later"),
                    });
                };
                if producer.core == core {
                    ready = ready.max(producer.end);
                    continue;
                }
                if let Some(&arrival) = arrivals.get(&(pred, core)) {
                    ready = ready.max(arrival);
                    continue;
                }
                let bits = workload
                    .node(pred)
                    .map(|producer| producer.operand_bits(Operand::Output))
                    .unwrap_or(0);
                let ticket = bus.reserve(producer.end, bits.div_ceil(8));
                communication.push(CommunicationEvent {
                    origin: pred,
                    sender: producer.core,
                    receiver: core,
                    start: ticket.start_at(),
                    end: ticket.ready_at(),
                    bits,
                    energy: bus.transfer_energy(bits),
                });
                arrivals.insert((pred, core), ticket.ready_at());
                ready = ready.max(ticket.ready_at());
            }

            let core_free_at = core_free.get(&core).copied().unwrap_or(0);
            for &operand in &node.eval.too_large_operands {
                if operand == Operand::Output {
                    continue;
                }
                let issue_at = if prefetch.contains(&operand) {
                    core_free_at
                } else {
                    ready.max(core_free_at)
                };
                let ticket = offchip.reserve(issue_at, node.operand_bits(operand).div_ceil(8));
                ready = ready.max(ticket.ready_at());
            }

            let start = ready.max(core_free_at);
            let end = start.saturating_add(node.eval.runtime);
            core_free.insert(core, end);
            nodes.insert(
                key,
                ScheduledNode {
                    key,
                    core,
                    start,
                    end,
                    onchip_energy: node.eval.onchip_energy,
                    offchip_energy: node.eval.offchip_energy,
                    macs: node.macs,
                },
            );
        }

        let node_energy: f64 = nodes.values().map(ScheduledNode::energy).sum();
        let comm_energy: f64 = communication.iter().map(|event: &CommunicationEvent| event.energy).sum();
        let total_latency = nodes.values().map(|node| node.end).max().unwrap_or(0);
        debug!(
            "schedule done: {} nodes, {} transfers, latency {}, energy {:.3e}",
            nodes.len(),
            communication.len(),
            total_latency,
            node_energy + comm_energy
        );

        Ok(ScheduleResult {
            total_energy: node_energy + comm_energy,
            total_latency,
            nodes,
            communication,
            workload,
        })
    }
}
