//! Multilevel Louvain: greedy local moves on a level until no move helps,
//! then aggregate every community into one node and start over.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::community_algo::{best_move, CommunityStructure, NeighborWeights};
use crate::config::DetectionOptions;
use crate::level_graph::{unfold, LevelGraph};
use crate::types::{renumber, CommID, CommunityResult};
use crate::util::Budget;

/// Run Louvain on the level-0 graph. `base` must carry some edge weight.
pub(super) fn run<R: Rng + ?Sized>(
    base: LevelGraph,
    resolution: f64,
    options: &DetectionOptions,
    rng: &mut R,
) -> CommunityResult {
    let mut budget = Budget::new(options);
    let vertex_count = base.node_count();

    // Step 1. Starting membership of level 0.
    let mut membership: Vec<CommID> = match &options.initial_partition {
        Some(partition) => {
            let mut start = partition.clone();
            renumber(&mut start);
            start
        }
        None => (0..vertex_count as CommID).collect(),
    };

    let mut graph = base;
    let mut folded: Vec<CommID> = (0..vertex_count as CommID).collect();
    let mut hierarchy: Vec<Vec<CommID>> = Vec::new();
    let mut level_modularity: Vec<f64> = Vec::new();
    let mut levels = 0;

    loop {
        // Step 2. Local moves on the current level.
        levels += 1;
        let moved = local_move(&graph, &mut membership, resolution, options, &mut budget, rng);
        let community_count = renumber(&mut membership);
        unfold(&mut folded, &membership);

        let q = graph.modularity(&membership, resolution);
        let aggregates = community_count < graph.node_count();
        if aggregates || hierarchy.is_empty() {
            hierarchy.push(folded.clone());
            level_modularity.push(q);
        }
        log::debug!("level {}: moved = {}, modularity {:.6}", levels, moved, q);

        if !aggregates || community_count == 1 || !budget.converged() {
            break;
        }
        if levels >= options.max_levels {
            log::warn!("Louvain stopped at the level cap ({})", options.max_levels);
            budget.mark_cut_short();
            break;
        }
        if budget.time_exhausted() {
            break;
        }

        // Step 3. Zoom out: each community becomes a node of the next level.
        log::info!("Zooming out: {} communities left", community_count);
        graph = graph.coarsen(&membership, community_count);
        membership = (0..community_count as CommID).collect();
    }

    log::debug!("Louvain finished {} levels in {:?}", levels, budget.elapsed());
    let modularity = level_modularity.last().copied().unwrap_or(0.0);
    CommunityResult {
        partition: folded,
        modularity,
        levels,
        connected_guarantee: false,
        converged: budget.converged(),
        passes: budget.passes(),
        hierarchy,
        level_modularity,
    }
}

/// Sweep every node until a full pass moves nothing. Returns whether any node moved.
fn local_move<R: Rng + ?Sized>(
    graph: &LevelGraph,
    membership: &mut Vec<CommID>,
    resolution: f64,
    options: &DetectionOptions,
    budget: &mut Budget,
    rng: &mut R,
) -> bool {
    let node_count = graph.node_count();
    let scale = resolution / (2.0 * graph.total_weight());
    let mut cs = CommunityStructure::new(graph, std::mem::take(membership), graph.degrees());
    let mut neighbors = NeighborWeights::new(node_count);
    let mut order: Vec<u32> = (0..node_count as u32).collect();
    let mut moved = false;

    for pass in 0..options.max_passes {
        if budget.time_exhausted() {
            break;
        }
        if options.randomize_order {
            order.shuffle(rng);
        }
        budget.record_pass();

        let mut moves = 0usize;
        for &node in &order {
            neighbors.collect(graph, node, cs.membership(), |_| true);
            if let Some(target) = best_move(&cs, node, graph.degree(node), &neighbors, scale) {
                let from = cs.community_of(node);
                cs.move_vertex(
                    graph,
                    node,
                    target,
                    neighbors.weight_to(from),
                    neighbors.weight_to(target),
                    graph.degree(node),
                );
                moves += 1;
            }
        }
        log::trace!(
            "pass {}: {} moves over {} nodes, modularity {:.6}",
            pass,
            moves,
            node_count,
            cs.modularity(graph.total_weight(), resolution)
        );

        if moves == 0 {
            break;
        }
        moved = true;
        if pass + 1 == options.max_passes {
            log::warn!("Louvain local move hit the pass cap ({})", options.max_passes);
            budget.mark_cut_short();
        }
    }

    *membership = cs.into_membership();
    moved
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::community_algo::detect_communities;
    use crate::community_algo::test_support::{community_count, complete_graph, is_dense, ring_of_cliques, two_cliques};
    use crate::config::DetectionOptions;
    use crate::error::CommunityError;
    use crate::graph::GraphSnapshot;
    use crate::modularity::modularity;
    use crate::types::{is_relabeling, Algorithm};

    fn louvain(g: &GraphSnapshot, options: &DetectionOptions, seed: u64) -> crate::types::CommunityResult {
        let mut rng = StdRng::seed_from_u64(seed);
        detect_communities(g, None, 1.0, Algorithm::Louvain, options, &mut rng).unwrap()
    }

    #[test]
    fn test_two_cliques() {
        let g = two_cliques(5);
        let result = louvain(&g, &DetectionOptions::default(), 1);
        assert!(is_relabeling(&result.partition, &[0, 0, 0, 0, 0, 1, 1, 1, 1, 1]));
        assert!(result.converged);
        assert!(!result.connected_guarantee);
        let q = modularity(&g, &result.partition, None, 1.0).unwrap();
        assert!((q - result.modularity).abs() < 1e-9);
    }

    #[test]
    fn test_ring_of_cliques() {
        let g = ring_of_cliques(8, 5);
        let result = louvain(&g, &DetectionOptions::default(), 11);
        assert_eq!(result.community_count(), 8);
        for clique in result.partition.chunks(5) {
            assert!(clique.iter().all(|&c| c == clique[0]));
        }
        assert!(is_dense(&result.partition));
        assert_eq!(result.hierarchy.last(), Some(&result.partition));
        assert_eq!(result.level_modularity.len(), result.hierarchy.len());
        assert!(result.level_modularity.windows(2).all(|w| w[1] >= w[0] - 1e-12));
    }

    #[test]
    fn test_complete_graph_is_one_community() {
        // Splitting K_n never pays off at resolution 1.
        for n in 2..=10 {
            let g = complete_graph(n);
            let result = louvain(&g, &DetectionOptions::default(), n as u64);
            assert_eq!(community_count(&result.partition), 1, "K_{}", n);
            assert!(result.modularity.abs() < 1e-9);
        }
    }

    #[test]
    fn test_seed_determinism() {
        let mut rng = StdRng::seed_from_u64(99);
        let edges: Vec<(u32, u32)> = (0..400).map(|_| (rng.gen_range(0..120), rng.gen_range(0..120))).collect();
        let g = GraphSnapshot::from_edges(120, edges).unwrap();
        let first = louvain(&g, &DetectionOptions::default(), 5);
        let second = louvain(&g, &DetectionOptions::default(), 5);
        assert_eq!(first, second);
    }

    #[test]
    fn test_fixed_order_ignores_seed() {
        let g = ring_of_cliques(5, 4);
        let options = DetectionOptions::default().with_fixed_order();
        assert_eq!(louvain(&g, &options, 1).partition, louvain(&g, &options, 2).partition);
    }

    #[test]
    fn test_restart_from_result_is_stable() {
        let g = ring_of_cliques(6, 6);
        let first = louvain(&g, &DetectionOptions::default(), 3);
        let options = DetectionOptions::default().with_initial_partition(first.partition.clone());
        let second = louvain(&g, &options, 4);
        assert!(second.modularity >= first.modularity - 1e-12);
        assert!(is_relabeling(&first.partition, &second.partition));
    }

    #[test]
    fn test_pass_cap_reports_not_converged() {
        let g = ring_of_cliques(8, 5);
        let result = louvain(&g, &DetectionOptions::default().with_max_passes(1), 6);
        assert!(!result.converged);
        assert_eq!(result.passes, 1);
        assert_eq!(result.ensure_converged(), Err(CommunityError::NotConverged { passes: 1 }));
        assert_eq!(result.partition.len(), 40);
        assert!(is_dense(&result.partition));
    }

    #[test]
    fn test_zero_time_budget_is_not_converged() {
        let g = two_cliques(4);
        let options = DetectionOptions::default().with_time_budget(Duration::from_millis(0));
        let result = louvain(&g, &options, 1);
        assert!(!result.converged);
        assert!(result.ensure_converged().is_err());
        assert_eq!(result.partition.len(), 8);
    }

    #[test]
    fn test_level_cap_reports_not_converged() {
        let g = ring_of_cliques(16, 3);
        let options = DetectionOptions::default().with_max_levels(1);
        let result = louvain(&g, &options, 8);
        assert_eq!(result.levels, 1);
        assert!(!result.converged);
    }

    #[test]
    fn test_weighted_bridge_changes_split() {
        // A heavy bridge glues vertices 2 and 3 together.
        let g = GraphSnapshot::from_edges(6, vec![(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5), (2, 3)]).unwrap();
        let weights = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 50.0];
        let mut rng = StdRng::seed_from_u64(2);
        let result = detect_communities(&g, Some(&weights), 1.0, Algorithm::Louvain, &DetectionOptions::default(), &mut rng).unwrap();
        assert_eq!(result.partition[2], result.partition[3]);
    }
}
