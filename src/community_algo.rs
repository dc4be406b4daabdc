use rand::Rng;

use crate::config::{DetectionOptions, MIN_GAIN};
use crate::error::{CommunityError, Result};
use crate::graph::{validate_edge_weights, validate_partition, validate_vertex_weights, GraphView};
use crate::level_graph::LevelGraph;
use crate::modularity::validate_resolution;
use crate::types::{Algorithm, CommID, CommunityResult};

mod leiden;
mod louvain;
mod work_queue;

/// Sentinel for "community not collected yet" in [`NeighborWeights`].
const NO_SLOT: usize = usize::MAX;

/// Aggregate state of the communities on one level, updated in place as nodes move.
#[derive(Debug)]
pub(crate) struct CommunityStructure {
    membership: Vec<CommID>, // Locate the community of a node.
    total: Vec<f64>, // Sum of node sizes (degree or Leiden node weight) per community.
    internal: Vec<f64>, // Internal edge weight per community, both directions, loops twice.
    size: Vec<u32>, // Node count per community.
}

impl CommunityStructure {
    /// `membership` ids must be below the node count of `graph`.
    pub(crate) fn new(graph: &LevelGraph, membership: Vec<CommID>, node_sizes: &[f64]) -> CommunityStructure {
        let n = graph.node_count();
        let mut total = vec![0.0f64; n];
        let mut internal = vec![0.0f64; n];
        let mut size = vec![0u32; n];
        for node in 0..n {
            let comm = membership[node] as usize;
            total[comm] += node_sizes[node];
            size[comm] += 1;
            internal[comm] += 2.0 * graph.self_loop(node as u32);
            for &(neighbor, weight) in graph.neighbors(node as u32) {
                if membership[neighbor as usize] as usize == comm {
                    internal[comm] += weight;
                }
            }
        }
        CommunityStructure {
            membership,
            total,
            internal,
            size,
        }
    }

    pub(crate) fn singletons(graph: &LevelGraph, node_sizes: &[f64]) -> CommunityStructure {
        let membership = (0..graph.node_count() as CommID).collect();
        CommunityStructure::new(graph, membership, node_sizes)
    }

    #[inline]
    pub(crate) fn community_of(&self, node: u32) -> CommID {
        self.membership[node as usize]
    }

    pub(crate) fn membership(&self) -> &[CommID] {
        &self.membership
    }

    pub(crate) fn total(&self, comm: CommID) -> f64 {
        self.total[comm as usize]
    }

    pub(crate) fn size(&self, comm: CommID) -> u32 {
        self.size[comm as usize]
    }

    pub(crate) fn into_membership(self) -> Vec<CommID> {
        self.membership
    }

    /// Move `node` to community `to`.
    ///
    /// `weight_from` is the edge weight between `node` and the rest of its
    /// current community, `weight_to` the edge weight between `node` and `to`.
    pub(crate) fn move_vertex(
        &mut self,
        graph: &LevelGraph,
        node: u32,
        to: CommID,
        weight_from: f64,
        weight_to: f64,
        node_size: f64,
    ) {
        let from = self.membership[node as usize];
        if from == to {
            return;
        }
        let loop_weight = 2.0 * graph.self_loop(node);
        let (from, to_idx) = (from as usize, to as usize);
        self.total[from] -= node_size;
        self.total[to_idx] += node_size;
        self.internal[from] -= 2.0 * weight_from + loop_weight;
        self.internal[to_idx] += 2.0 * weight_to + loop_weight;
        self.size[from] -= 1;
        self.size[to_idx] += 1;
        self.membership[node as usize] = to;
    }

    /// Modularity from the incremental state; only meaningful when node sizes are degrees.
    pub(crate) fn modularity(&self, total_weight: f64, resolution: f64) -> f64 {
        if total_weight <= 0.0 {
            return 0.0;
        }
        let two_m = 2.0 * total_weight;
        self.internal
            .iter()
            .zip(self.total.iter())
            .map(|(e_c, d_c)| e_c - resolution * d_c * d_c / two_m)
            .sum::<f64>()
            / two_m
    }
}

/// Scratch table of edge weight from one node to each adjacent community.
///
/// Collecting is O(degree); the first entry is always the node's own community.
#[derive(Debug)]
pub(crate) struct NeighborWeights {
    slot: Vec<usize>, // Position of each community in `entries`, or NO_SLOT.
    entries: Vec<(CommID, f64)>,
}

impl NeighborWeights {
    pub(crate) fn new(community_capacity: usize) -> NeighborWeights {
        NeighborWeights {
            slot: vec![NO_SLOT; community_capacity],
            entries: Vec::new(),
        }
    }

    fn clear(&mut self) {
        for &(comm, _) in &self.entries {
            self.slot[comm as usize] = NO_SLOT;
        }
        self.entries.clear();
    }

    fn add(&mut self, comm: CommID, weight: f64) {
        let s = &mut self.slot[comm as usize];
        if *s == NO_SLOT {
            *s = self.entries.len();
            self.entries.push((comm, weight));
        } else {
            self.entries[*s].1 += weight;
        }
    }

    /// Gather the weights from `node` to the communities of its neighbors
    /// accepted by `include`.
    pub(crate) fn collect(
        &mut self,
        graph: &LevelGraph,
        node: u32,
        membership: &[CommID],
        include: impl Fn(u32) -> bool,
    ) {
        self.clear();
        self.add(membership[node as usize], 0.0);
        for &(neighbor, weight) in graph.neighbors(node) {
            if include(neighbor) {
                self.add(membership[neighbor as usize], weight);
            }
        }
    }

    pub(crate) fn weight_to(&self, comm: CommID) -> f64 {
        match self.slot[comm as usize] {
            NO_SLOT => 0.0,
            s => self.entries[s].1,
        }
    }

    pub(crate) fn entries(&self) -> &[(CommID, f64)] {
        &self.entries
    }
}

/// Best community for `node` among the collected neighbor communities.
///
/// The gain of joining C is `w(node, C) - scale * node_size * total(C)`, with
/// `node` taken out of its own community first. Returns the community with
/// the largest strictly positive improvement over staying, lowest id on ties.
pub(crate) fn best_move(
    cs: &CommunityStructure,
    node: u32,
    node_size: f64,
    neighbors: &NeighborWeights,
    scale: f64,
) -> Option<CommID> {
    let current = cs.community_of(node);
    let stay_gain = neighbors.weight_to(current) - scale * node_size * (cs.total(current) - node_size);

    let mut best: Option<(CommID, f64)> = None;
    for &(comm, weight) in neighbors.entries() {
        if comm == current {
            continue;
        }
        let delta = weight - scale * node_size * cs.total(comm) - stay_gain;
        best = match best {
            None if delta > MIN_GAIN => Some((comm, delta)),
            Some((best_comm, best_delta))
                if delta > best_delta + MIN_GAIN
                    || ((delta - best_delta).abs() <= MIN_GAIN && comm < best_comm) =>
            {
                Some((comm, delta))
            }
            other => other,
        };
    }
    best.map(|(comm, _)| comm)
}

/// Singleton partition returned for graphs without edge weight.
fn singleton_result(vertex_count: usize) -> CommunityResult {
    let partition: Vec<CommID> = (0..vertex_count as CommID).collect();
    CommunityResult {
        hierarchy: vec![partition.clone()],
        partition,
        modularity: 0.0,
        levels: 1,
        connected_guarantee: true,
        converged: true,
        passes: 0,
        level_modularity: vec![0.0],
    }
}

fn validate_options(options: &DetectionOptions, vertex_count: usize, algorithm: Algorithm) -> Result<()> {
    if options.max_passes == 0 {
        return Err(CommunityError::InvalidParameter("max_passes must be at least 1".to_owned()));
    }
    if options.max_levels == 0 {
        return Err(CommunityError::InvalidParameter("max_levels must be at least 1".to_owned()));
    }
    if let Some(partition) = &options.initial_partition {
        validate_partition(vertex_count, partition)?;
    }
    if algorithm == Algorithm::Leiden {
        if !options.randomness.is_finite() || options.randomness <= 0.0 {
            return Err(CommunityError::InvalidParameter(format!(
                "randomness must be positive, got {}",
                options.randomness
            )));
        }
        if options.leiden_iterations == Some(0) {
            return Err(CommunityError::InvalidParameter("leiden_iterations must be at least 1".to_owned()));
        }
        if let Some(vertex_weights) = &options.vertex_weights {
            validate_vertex_weights(vertex_count, vertex_weights)?;
        }
    }
    Ok(())
}

/// Detect communities of `graph` with the chosen engine.
///
/// `weights` are per-edge weights (all 1 when absent). Randomness (visiting
/// order, Leiden refinement) comes only from `rng`, so a fixed seed gives a
/// fixed result. Every validation error is raised before any work starts.
pub fn detect_communities<G, R>(
    graph: &G,
    weights: Option<&[f64]>,
    resolution: f64,
    algorithm: Algorithm,
    options: &DetectionOptions,
    rng: &mut R,
) -> Result<CommunityResult>
where
    G: GraphView + ?Sized,
    R: Rng + ?Sized,
{
    let vertex_count = graph.vertex_count();
    if vertex_count == 0 {
        return Err(CommunityError::EmptyGraph);
    }
    validate_resolution(resolution)?;
    let weights = validate_edge_weights(graph, weights)?;
    validate_options(options, vertex_count, algorithm)?;

    let mut level = LevelGraph::from_graph(graph, &weights);
    if level.total_weight() <= 0.0 {
        log::info!("{}: graph has no edge weight, returning {} singletons", algorithm, vertex_count);
        return Ok(singleton_result(vertex_count));
    }

    log::info!(
        "{}: {} vertices, {} edges, resolution {}",
        algorithm,
        vertex_count,
        graph.edge_count(),
        resolution
    );
    let result = match algorithm {
        Algorithm::Louvain => louvain::run(level, resolution, options, rng),
        Algorithm::Leiden => {
            if let Some(vertex_weights) = &options.vertex_weights {
                level.set_node_weights(vertex_weights.clone());
            }
            leiden::run(&level, resolution, options, rng)
        }
    };
    log::info!(
        "{}: {} communities, modularity {:.6}, {} levels, {} passes{}",
        algorithm,
        result.community_count(),
        result.modularity,
        result.levels,
        result.passes,
        if result.converged { "" } else { " (not converged)" }
    );
    Ok(result)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashSet;

    use crate::graph::GraphSnapshot;

    /// Two cliques of `size` vertices joined by one bridge edge.
    pub(crate) fn two_cliques(size: u32) -> GraphSnapshot {
        let mut edges = Vec::new();
        for offset in [0, size] {
            for i in 0..size {
                for j in (i + 1)..size {
                    edges.push((offset + i, offset + j));
                }
            }
        }
        edges.push((size - 1, size));
        GraphSnapshot::from_edges(2 * size, edges).unwrap()
    }

    pub(crate) fn complete_graph(n: u32) -> GraphSnapshot {
        let edges = (0..n).flat_map(|i| ((i + 1)..n).map(move |j| (i, j)));
        GraphSnapshot::from_edges(n, edges).unwrap()
    }

    /// `count` cliques of `size` vertices arranged in a ring, neighbors linked by one edge.
    pub(crate) fn ring_of_cliques(count: u32, size: u32) -> GraphSnapshot {
        let mut edges = Vec::new();
        for c in 0..count {
            let base = c * size;
            for i in 0..size {
                for j in (i + 1)..size {
                    edges.push((base + i, base + j));
                }
            }
            edges.push((base, ((c + 1) % count) * size + 1));
        }
        GraphSnapshot::from_edges(count * size, edges).unwrap()
    }

    pub(crate) fn community_count(partition: &[u32]) -> usize {
        partition.iter().collect::<HashSet<_>>().len()
    }

    pub(crate) fn is_dense(partition: &[u32]) -> bool {
        let count = community_count(partition);
        partition.iter().all(|&c| (c as usize) < count)
    }
}
