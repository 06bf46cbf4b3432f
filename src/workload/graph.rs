use std::collections::HashMap;

use log::debug;
use serde::Deserialize;

use crate::alloc::AllocationResult;
use crate::config::Config;
use crate::error::EvalError;
use crate::workload::{Node, NodeKey, NodeTag};

/// Computation graph whose nodes are allocated onto cores.
///
/// Node identities and edges are fixed at construction; only the evaluation
/// outputs of the nodes change, and only on clones handed to a scheduler.
#[derive(Debug, Clone)]
pub struct Workload {
    nodes: Vec<Node>,
    index: HashMap<NodeKey, usize>,
    edges: Vec<(NodeKey, NodeKey)>,
    preds: HashMap<NodeKey, Vec<NodeKey>>,
}

impl Workload {
    pub fn new(mut nodes: Vec<Node>, edges: Vec<(NodeKey, NodeKey)>) -> Result<Self, EvalError> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (pos, node) in nodes.iter_mut().enumerate() {
            if node.tag == NodeTag::Untagged {
                node.tag = NodeTag::from_name(&node.name);
            }
            if index.insert(node.key(), pos).is_some() {
                return Err(EvalError::DuplicateNode(node.key()));
            }
        }

        let mut preds: HashMap<NodeKey, Vec<NodeKey>> = HashMap::new();
        for &(src, dst) in &edges {
            for key in [src, dst] {
                if !index.contains_key(&key) {
                    return Err(EvalError::UnknownNode(key));
                }
            }
            preds.entry(dst).or_default().push(src);
        }
        debug!("workload built: {} nodes, {} edges", nodes.len(), edges.len());

        Ok(Self {
            nodes,
            index,
            edges,
            preds,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.index.get(&key).map(|&pos| &self.nodes[pos])
    }

    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.index.get(&key).map(|&pos| &mut self.nodes[pos])
    }

    pub fn edges(&self) -> &[(NodeKey, NodeKey)] {
        &self.edges
    }

    pub fn predecessors(&self, key: NodeKey) -> &[NodeKey] {
        self.preds.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Members of the flexible group `(id, group)`.
    pub fn group_members(&self, id: u32, group: u32) -> impl Iterator<Item = &Node> + '_ {
        self.nodes
            .iter()
            .filter(move |node| node.id == id && node.group == group)
    }

    /// Nodes in insertion order, a valid scheduling order when the graph was
    /// listed producers first.
    pub fn keys(&self) -> Vec<NodeKey> {
        self.nodes.iter().map(Node::key).collect()
    }

    pub fn total_macs(&self) -> u64 {
        self.nodes.iter().map(|node| node.macs).sum()
    }

    /// Writes the derived per-node fields into this workload.
    pub fn apply(&mut self, allocation: &AllocationResult) -> Result<(), EvalError> {
        for (&key, eval) in allocation.iter() {
            let node = self.node_mut(key).ok_or(EvalError::UnknownNode(key))?;
            node.eval = eval.clone();
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct EdgeConfig {
    pub src: NodeKey,
    pub dst: NodeKey,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct WorkloadConfig {
    pub nodes: Vec<Node>,
    pub edges: Vec<EdgeConfig>,
}

impl Config for WorkloadConfig {}

impl WorkloadConfig {
    pub fn build(self) -> Result<Workload, EvalError> {
        let edges = self.edges.iter().map(|edge| (edge.src, edge.dst)).collect();
        Workload::new(self.nodes, edges)
    }
}
