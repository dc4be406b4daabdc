//! Leiden: queue-driven local moves, a randomized refinement that only merges
//! well-connected singletons inside each community, then aggregation on the
//! refined clusters with the local-move partition carried forward.
//!
//! The objective is the constant Potts model over node sizes:
//! `gain(v, C) = w(v, C) - γ / Σsize · size(v) · size(C)`. With sizes equal to
//! the weighted degrees this is modularity up to a positive factor.

use std::borrow::Cow;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::community_algo::work_queue::VertexQueue;
use crate::community_algo::{best_move, CommunityStructure, NeighborWeights};
use crate::config::DetectionOptions;
use crate::level_graph::{unfold, LevelGraph};
use crate::types::{renumber, CommID, CommunityResult};
use crate::util::Budget;

/// Per-invocation counters reported back in the result.
#[derive(Debug, Default)]
struct LeidenStats {
    levels: usize,
    level_modularity: Vec<f64>,
}

/// Run Leiden on the level-0 graph. `base` must carry some edge weight.
pub(super) fn run<R: Rng + ?Sized>(
    base: &LevelGraph,
    resolution: f64,
    options: &DetectionOptions,
    rng: &mut R,
) -> CommunityResult {
    let mut budget = Budget::new(options);
    let mut stats = LeidenStats::default();
    let total_size: f64 = base.node_weights().iter().sum();
    let scale = if total_size > 0.0 { resolution / total_size } else { 0.0 };

    let mut membership: Vec<CommID> = match &options.initial_partition {
        Some(partition) => partition.clone(),
        None => (0..base.node_count() as CommID).collect(),
    };
    renumber(&mut membership);

    let mut iteration = 0usize;
    loop {
        let changed = iterate(base, &mut membership, resolution, scale, options, &mut budget, &mut stats, rng);
        iteration += 1;
        log::debug!("Leiden iteration {}: changed = {}", iteration, changed);
        if !budget.converged() {
            break;
        }
        match options.leiden_iterations {
            Some(limit) if iteration >= limit => break,
            None if !changed => break,
            _ => {}
        }
    }

    let splits = split_disconnected(base, &mut membership);
    if splits > 0 {
        log::debug!("Leiden split {} disconnected communities", splits);
    }
    log::debug!("Leiden finished {} iterations in {:?}", iteration, budget.elapsed());

    CommunityResult {
        modularity: base.modularity(&membership, resolution),
        partition: membership,
        levels: stats.levels,
        connected_guarantee: true,
        converged: budget.converged(),
        passes: budget.passes(),
        hierarchy: Vec::new(),
        level_modularity: stats.level_modularity,
    }
}

/// One Leiden iteration over all levels, starting from `membership` on the
/// base graph and writing the improved partition back. Returns whether any
/// node changed community.
#[allow(clippy::too_many_arguments)]
fn iterate<R: Rng + ?Sized>(
    base: &LevelGraph,
    membership: &mut Vec<CommID>,
    resolution: f64,
    scale: f64,
    options: &DetectionOptions,
    budget: &mut Budget,
    stats: &mut LeidenStats,
    rng: &mut R,
) -> bool {
    let mut graph: Cow<'_, LevelGraph> = Cow::Borrowed(base);
    let mut level_membership = std::mem::take(membership);
    let mut folded: Vec<CommID> = (0..base.node_count() as CommID).collect();
    let mut changed = false;
    let mut levels = 0usize;

    loop {
        // Step 1. Move nodes between communities.
        levels += 1;
        stats.levels += 1;
        changed |= fast_local_move(&graph, &mut level_membership, scale, options, budget, rng);
        let community_count = renumber(&mut level_membership);
        stats.level_modularity.push(graph.modularity(&level_membership, resolution));

        if community_count == graph.node_count() || !budget.converged() {
            break;
        }
        if levels >= options.max_levels {
            log::warn!("Leiden stopped at the level cap ({})", options.max_levels);
            budget.mark_cut_short();
            break;
        }

        // Step 2. Refine each community into well-connected clusters.
        let mut refined = refine(&graph, &level_membership, scale, options, rng);
        let mut refined_count = renumber(&mut refined);
        if refined_count == graph.node_count() {
            // Nothing merged, aggregate by the communities themselves.
            refined = level_membership.clone();
            refined_count = community_count;
        }

        // Step 3. Aggregate on the refined clusters, each starting in its community.
        let mut next_membership = vec![0 as CommID; refined_count];
        for (node, &cluster) in refined.iter().enumerate() {
            next_membership[cluster as usize] = level_membership[node];
        }
        log::info!("Zooming out: {} clusters in {} communities", refined_count, community_count);
        let next = graph.coarsen(&refined, refined_count);
        unfold(&mut folded, &refined);
        graph = Cow::Owned(next);
        level_membership = next_membership;
    }

    *membership = folded.iter().map(|&node| level_membership[node as usize]).collect();
    renumber(membership);
    changed
}

/// Visit nodes from a queue; after a move, the neighbors left outside the
/// target community are queued again. Returns whether any node moved.
fn fast_local_move<R: Rng + ?Sized>(
    graph: &LevelGraph,
    membership: &mut Vec<CommID>,
    scale: f64,
    options: &DetectionOptions,
    budget: &mut Budget,
    rng: &mut R,
) -> bool {
    if budget.time_exhausted() {
        return false;
    }
    let node_count = graph.node_count();
    let node_sizes = graph.node_weights();
    let mut order: Vec<u32> = (0..node_count as u32).collect();
    if options.randomize_order {
        order.shuffle(rng);
    }
    let mut queue = VertexQueue::with_order(node_count, &order);
    let mut cs = CommunityStructure::new(graph, std::mem::take(membership), node_sizes);
    let mut neighbors = NeighborWeights::new(node_count);
    let pop_cap = options.max_passes.saturating_mul(node_count);
    let mut pops = 0usize;
    let mut moved = false;

    budget.record_pass();
    while let Some(node) = queue.pop() {
        pops += 1;
        if pops > pop_cap {
            log::warn!(
                "Leiden local move hit the pass cap ({}), {} nodes still queued",
                options.max_passes,
                queue.len() + 1
            );
            budget.mark_cut_short();
            break;
        }
        if pops > 1 && (pops - 1) % node_count == 0 {
            budget.record_pass();
            if budget.time_exhausted() {
                break;
            }
        }

        let size = node_sizes[node as usize];
        neighbors.collect(graph, node, cs.membership(), |_| true);
        if let Some(target) = best_move(&cs, node, size, &neighbors, scale) {
            let from = cs.community_of(node);
            cs.move_vertex(graph, node, target, neighbors.weight_to(from), neighbors.weight_to(target), size);
            moved = true;
            for &(neighbor, _) in graph.neighbors(node) {
                if cs.community_of(neighbor) != target {
                    queue.push(neighbor);
                }
            }
        }
    }

    *membership = cs.into_membership();
    moved
}

/// Refine `membership`: every community is split back into singletons which
/// then merge, within the community only, into well-connected clusters.
///
/// A singleton v may merge when it is well connected to its community S,
/// `w(v, S - v) >= scale · size(v) · (size(S) - size(v))`, and only into
/// clusters C that are themselves well connected to S. Among clusters with a
/// non-negative gain (staying alone counts as gain 0) one is drawn with
/// probability proportional to `exp((gain - max_gain) / randomness)`.
fn refine<R: Rng + ?Sized>(
    graph: &LevelGraph,
    membership: &[CommID],
    scale: f64,
    options: &DetectionOptions,
    rng: &mut R,
) -> Vec<CommID> {
    let node_count = graph.node_count();
    let node_sizes = graph.node_weights();

    let mut community_size = vec![0.0f64; node_count];
    let mut node_inside = vec![0.0f64; node_count]; // w(v, S - v) for the community S of v.
    for node in 0..node_count {
        let comm = membership[node];
        community_size[comm as usize] += node_sizes[node];
        node_inside[node] = graph
            .neighbors(node as u32)
            .iter()
            .filter(|&&(neighbor, _)| membership[neighbor as usize] == comm)
            .map(|&(_, weight)| weight)
            .sum();
    }
    // w(C, S - C) for every refined cluster C, a singleton at first.
    let mut cluster_inside = node_inside.clone();

    let mut cs = CommunityStructure::singletons(graph, node_sizes);
    let mut neighbors = NeighborWeights::new(node_count);
    let mut candidates: Vec<(CommID, f64)> = Vec::new();
    let mut order: Vec<u32> = (0..node_count as u32).collect();
    if options.randomize_order {
        order.shuffle(rng);
    }

    for &node in &order {
        let current = cs.community_of(node);
        if cs.size(current) != 1 {
            continue;
        }
        let comm = membership[node as usize];
        let size = node_sizes[node as usize];
        let comm_size = community_size[comm as usize];
        if node_inside[node as usize] < scale * size * (comm_size - size) {
            continue;
        }

        neighbors.collect(graph, node, cs.membership(), |neighbor| membership[neighbor as usize] == comm);
        candidates.clear();
        candidates.push((current, 0.0));
        let mut max_gain = 0.0f64;
        for &(cluster, weight) in neighbors.entries() {
            if cluster == current || weight <= 0.0 {
                continue;
            }
            let cluster_size = cs.total(cluster);
            if cluster_inside[cluster as usize] < scale * cluster_size * (comm_size - cluster_size) {
                continue;
            }
            let gain = weight - scale * size * cluster_size;
            if gain >= 0.0 {
                max_gain = max_gain.max(gain);
                candidates.push((cluster, gain));
            }
        }
        if candidates.len() == 1 {
            continue;
        }

        let chosen = sample_cluster(&candidates, max_gain, options.randomness, rng);
        if chosen != current {
            let weight_to = neighbors.weight_to(chosen);
            cluster_inside[chosen as usize] += node_inside[node as usize] - 2.0 * weight_to;
            cs.move_vertex(graph, node, chosen, 0.0, weight_to, size);
        }
    }

    cs.into_membership()
}

/// Draw one candidate with probability proportional to `exp((gain - max_gain) / randomness)`.
fn sample_cluster<R: Rng + ?Sized>(candidates: &[(CommID, f64)], max_gain: f64, randomness: f64, rng: &mut R) -> CommID {
    let mut cumulative: Vec<f64> = Vec::with_capacity(candidates.len());
    let mut total = 0.0f64;
    for &(_, gain) in candidates {
        total += ((gain - max_gain) / randomness).exp();
        cumulative.push(total);
    }
    let r = rng.gen::<f64>() * total;
    let idx = cumulative.iter().position(|&c| r < c).unwrap_or(candidates.len() - 1);
    candidates[idx].0
}

/// Relabel so that every community is connected: each connected piece of a
/// community gets its own id. Returns the number of extra communities made.
///
/// Splitting a community into disconnected parts keeps its internal weight
/// and lowers the degree penalty, so modularity never drops.
fn split_disconnected(graph: &LevelGraph, membership: &mut [CommID]) -> usize {
    let node_count = graph.node_count();
    let community_count = membership.iter().map(|&c| c as usize + 1).max().unwrap_or(0);
    let mut component = vec![CommID::MAX; node_count];
    let mut stack: Vec<u32> = Vec::new();
    let mut next = 0 as CommID;

    for start in 0..node_count {
        if component[start] != CommID::MAX {
            continue;
        }
        let comm = membership[start];
        component[start] = next;
        stack.push(start as u32);
        while let Some(node) = stack.pop() {
            for &(neighbor, _) in graph.neighbors(node) {
                let neighbor = neighbor as usize;
                if component[neighbor] == CommID::MAX && membership[neighbor] == comm {
                    component[neighbor] = next;
                    stack.push(neighbor as u32);
                }
            }
        }
        next += 1;
    }

    membership.copy_from_slice(&component);
    next as usize - community_count
}
