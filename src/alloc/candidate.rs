use rand::seq::SliceRandom;
use rand::Rng;

use crate::alloc::{FeasibilityTable, FlexibleGroup};
use crate::error::EvalError;
use crate::hardware::CoreId;
use crate::ids;
use crate::workload::{NodeKey, Workload};

/// One core id per flexible group.
pub type Candidate = Vec<CoreId>;

/// Cores on which every member of each group can run unsplit.
pub fn group_options(
    table: &FeasibilityTable,
    workload: &Workload,
    groups: &[FlexibleGroup],
) -> Result<Vec<Vec<CoreId>>, EvalError> {
    let mut options = Vec::with_capacity(groups.len());
    for group in groups {
        let members = workload
            .group_members(group.id, group.group)
            .map(|node| ids::pack_key(node.key()))
            .collect::<Result<Vec<_>, _>>()?;
        if members.is_empty() {
            return Err(EvalError::UnknownNode(NodeKey::new(group.id, group.group)));
        }
        let cores = table
            .core_ids()
            .iter()
            .copied()
            .filter(|&core| members.iter().all(|&key| table.is_splittable(key, core, 1)))
            .collect();
        options.push(cores);
    }
    Ok(options)
}

/// Draws a candidate uniformly from the per-group options; `None` when some
/// group has no feasible core.
pub fn random_candidate<R: Rng + ?Sized>(rng: &mut R, options: &[Vec<CoreId>]) -> Option<Candidate> {
    options
        .iter()
        .map(|cores| cores.choose(rng).copied())
        .collect()
}
