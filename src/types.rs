use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::error::{CommunityError, Result};
use crate::graph::VInt;

/// Dense community identifier, `0..community_count` once renumbered.
pub type CommID = u32;

/// Grouped form of a partition: one vertex list per community.
pub type CommStructure = Vec<Vec<VInt>>;

/// Which optimizer `detect_communities` runs.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[display(fmt = "louvain")]
    Louvain,
    #[display(fmt = "leiden")]
    Leiden,
}

/// Output of one engine invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityResult {
    pub partition: Vec<CommID>, // Community of each original vertex, contiguous ids.
    pub modularity: f64, // Modularity of `partition` at the requested resolution.
    pub levels: usize, // Number of levels the local-move phase ran on.
    pub connected_guarantee: bool, // True when every community is known to be connected.
    pub converged: bool, // False when a pass cap, level cap or time budget cut the run short.
    pub passes: usize, // Local-move passes summed over all levels.
    pub hierarchy: Vec<Vec<CommID>>, // Per-level partitions over original vertices (Louvain).
    pub level_modularity: Vec<f64>, // Modularity reached after each level.
}

impl CommunityResult {
    /// Number of distinct communities in the final partition.
    pub fn community_count(&self) -> usize {
        self.partition.iter().map(|&c| c as usize + 1).max().unwrap_or(0)
    }

    /// Group vertices by community.
    pub fn communities(&self) -> CommStructure {
        let mut grouped: CommStructure = vec![Vec::new(); self.community_count()];
        for (vertex, &comm) in self.partition.iter().enumerate() {
            grouped[comm as usize].push(vertex as VInt);
        }
        grouped
    }

    /// Turn the convergence flag into an error for callers that need a local optimum.
    pub fn ensure_converged(&self) -> Result<()> {
        if self.converged {
            Ok(())
        } else {
            Err(CommunityError::NotConverged { passes: self.passes })
        }
    }
}

/// Renumber community ids in place to `0..k` by order of first appearance, returns k.
pub(crate) fn renumber(membership: &mut [CommID]) -> usize {
    let bound = membership.iter().map(|&c| c as usize + 1).max().unwrap_or(0);
    let mut mapping = vec![CommID::MAX; bound];
    let mut next = 0 as CommID;
    for comm in membership.iter_mut() {
        let slot = &mut mapping[*comm as usize];
        if *slot == CommID::MAX {
            *slot = next;
            next += 1;
        }
        *comm = *slot;
    }
    next as usize
}

/// Check whether two partitions are equal up to a relabeling of community ids.
pub fn is_relabeling(a: &[CommID], b: &[CommID]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut left = a.to_vec();
    let mut right = b.to_vec();
    renumber(&mut left);
    renumber(&mut right);
    left == right
}
