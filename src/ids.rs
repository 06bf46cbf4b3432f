//! Composite node identifiers.
//!
//! A node is identified by a `(major, minor)` pair. Tables handed to the
//! allocation optimizer are keyed by a single integer, so the pair is packed
//! as `major * 1000 + minor`. The packing is only a bijection while
//! `minor < 1000`; [`pack`] trusts its caller, [`try_pack`] checks.

use std::collections::BTreeMap;

use crate::error::EvalError;
use crate::hardware::CoreId;
use crate::workload::{Node, NodeKey};

/// Width of the minor field.
pub const MINOR_RADIX: u64 = 1000;

pub type CompositeId = u64;

/// Packs `(major, minor)` into one key. `minor` must be below [`MINOR_RADIX`].
pub fn pack(major: u32, minor: u32) -> CompositeId {
    debug_assert!((minor as u64) < MINOR_RADIX, "minor id {minor} overflows the composite key");
    major as u64 * MINOR_RADIX + minor as u64
}

pub fn unpack(key: CompositeId) -> (u32, u32) {
    ((key / MINOR_RADIX) as u32, (key % MINOR_RADIX) as u32)
}

/// Like [`pack`], but rejects minor ids that would collide with another node.
pub fn try_pack(major: u32, minor: u32) -> Result<CompositeId, EvalError> {
    if minor as u64 >= MINOR_RADIX {
        return Err(EvalError::MinorIdOutOfRange { major, minor });
    }
    Ok(pack(major, minor))
}

pub fn pack_key(key: NodeKey) -> Result<CompositeId, EvalError> {
    try_pack(key.id, key.sub_id)
}

/// Packs the identity of every node.
pub fn pack_nodes<'a, I>(nodes: I) -> Result<BTreeMap<NodeKey, CompositeId>, EvalError>
where
    I: IntoIterator<Item = &'a Node>,
{
    nodes
        .into_iter()
        .map(|node| Ok((node.key(), pack_key(node.key())?)))
        .collect()
}

/// Unpacks the node key of every `(slot, core, key)` triple.
pub fn unpack_slots(slots: &[(usize, CoreId, CompositeId)]) -> Vec<(usize, CoreId, (u32, u32))> {
    slots
        .iter()
        .map(|&(slot, core, key)| (slot, core, unpack(key)))
        .collect()
}

/// Re-keys a packed table by `(major, minor)`.
pub fn unpack_map<V: Clone>(table: &BTreeMap<CompositeId, V>) -> BTreeMap<(u32, u32), V> {
    table
        .iter()
        .map(|(&key, value)| (unpack(key), value.clone()))
        .collect()
}
