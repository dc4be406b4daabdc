use crate::error::Result;
use crate::graph::{validate_edge_weights, validate_partition, GraphView};
use crate::types::{renumber, CommID};

/// Sentinel for "no slot allocated yet" in the merge scratch arrays.
const NO_SLOT: usize = usize::MAX;

/// Per-level weighted graph, owned by one engine invocation and dropped once
/// its partition is folded back into the level below.
///
/// Parallel edges are merged, self-loops are kept apart from the adjacency.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelGraph {
    adj: Vec<Vec<(u32, f64)>>, // Merged non-loop neighbors, both directions stored.
    self_loops: Vec<f64>, // Self-loop weight of each node, each loop counted once.
    degrees: Vec<f64>, // Weighted degree, self-loops counted twice.
    node_weights: Vec<f64>, // Node sizes used by the Leiden objective.
    total_weight: f64, // m: sum of all edge weights, self-loops once.
}

impl LevelGraph {
    /// Level-0 graph. `weights` must already be validated against `graph`.
    pub(crate) fn from_graph<G: GraphView + ?Sized>(graph: &G, weights: &[f64]) -> LevelGraph {
        let n = graph.vertex_count();
        let mut adj: Vec<Vec<(u32, f64)>> = vec![Vec::new(); n];
        let mut self_loops = vec![0.0f64; n];
        let mut degrees = vec![0.0f64; n];
        let mut total_weight = 0.0f64;

        for (edge, &weight) in weights.iter().enumerate() {
            let (u, v) = graph.edge_endpoints(edge);
            total_weight += weight;
            if u == v {
                self_loops[u as usize] += weight;
                degrees[u as usize] += 2.0 * weight;
            } else {
                adj[u as usize].push((v, weight));
                adj[v as usize].push((u, weight));
                degrees[u as usize] += weight;
                degrees[v as usize] += weight;
            }
        }

        // Collapse parallel edges so every neighbor shows up once.
        let mut slot = vec![NO_SLOT; n];
        for row in adj.iter_mut() {
            let mut merged: Vec<(u32, f64)> = Vec::with_capacity(row.len());
            for &(neighbor, weight) in row.iter() {
                let s = &mut slot[neighbor as usize];
                if *s == NO_SLOT {
                    *s = merged.len();
                    merged.push((neighbor, weight));
                } else {
                    merged[*s].1 += weight;
                }
            }
            for &(neighbor, _) in &merged {
                slot[neighbor as usize] = NO_SLOT;
            }
            *row = merged;
        }

        LevelGraph {
            adj,
            self_loops,
            node_weights: degrees.clone(),
            degrees,
            total_weight,
        }
    }

    /// Replace the node sizes (defaults to the weighted degrees).
    pub(crate) fn set_node_weights(&mut self, node_weights: Vec<f64>) {
        debug_assert_eq!(node_weights.len(), self.node_count());
        self.node_weights = node_weights;
    }

    pub fn node_count(&self) -> usize {
        self.adj.len()
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn neighbors(&self, node: u32) -> &[(u32, f64)] {
        &self.adj[node as usize]
    }

    pub fn degree(&self, node: u32) -> f64 {
        self.degrees[node as usize]
    }

    pub fn self_loop(&self, node: u32) -> f64 {
        self.self_loops[node as usize]
    }

    pub(crate) fn degrees(&self) -> &[f64] {
        &self.degrees
    }

    pub(crate) fn node_weights(&self) -> &[f64] {
        &self.node_weights
    }

    /// Sum of weighted degrees, i.e. 2m.
    pub fn total_degree(&self) -> f64 {
        self.degrees.iter().sum()
    }

    /// Sum of adjacency weights; every non-loop edge is seen from both ends.
    pub fn adjacency_weight(&self) -> f64 {
        self.adj.iter().flat_map(|row| row.iter().map(|(_, w)| *w)).sum()
    }

    pub fn self_loop_weight(&self) -> f64 {
        self.self_loops.iter().sum()
    }

    /// Modularity of `membership` on this level; equals the modularity of the
    /// unfolded partition on the original graph.
    pub fn modularity(&self, membership: &[CommID], resolution: f64) -> f64 {
        if self.total_weight <= 0.0 {
            return 0.0;
        }
        let bound = membership.iter().map(|&c| c as usize + 1).max().unwrap_or(0);
        let mut internal = vec![0.0f64; bound];
        let mut total = vec![0.0f64; bound];
        for node in 0..self.node_count() {
            let comm = membership[node] as usize;
            total[comm] += self.degrees[node];
            internal[comm] += 2.0 * self.self_loops[node];
            for &(neighbor, weight) in &self.adj[node] {
                if membership[neighbor as usize] as usize == comm {
                    internal[comm] += weight;
                }
            }
        }
        let two_m = 2.0 * self.total_weight;
        internal
            .iter()
            .zip(total.iter())
            .map(|(e_c, d_c)| e_c - resolution * d_c * d_c / two_m)
            .sum::<f64>()
            / two_m
    }

    /// Build the next level: one node per community of `membership`.
    ///
    /// `membership` must be dense in `0..community_count`. Inter-community
    /// weights are summed, intra-community weights become the self-loop, so
    /// the total weighted degree is conserved. Runs in O(nodes + edges).
    pub(crate) fn coarsen(&self, membership: &[CommID], community_count: usize) -> LevelGraph {
        debug_assert_eq!(membership.len(), self.node_count());
        debug_assert!(membership.iter().all(|&c| (c as usize) < community_count));

        let mut members: Vec<Vec<u32>> = vec![Vec::new(); community_count];
        for (node, &comm) in membership.iter().enumerate() {
            members[comm as usize].push(node as u32);
        }

        let mut adj: Vec<Vec<(u32, f64)>> = Vec::with_capacity(community_count);
        let mut self_loops = vec![0.0f64; community_count];
        let mut degrees = vec![0.0f64; community_count];
        let mut node_weights = vec![0.0f64; community_count];
        let mut slot = vec![NO_SLOT; community_count];

        for (comm, nodes) in members.iter().enumerate() {
            let mut row: Vec<(u32, f64)> = Vec::new();
            for &node in nodes {
                let node = node as usize;
                self_loops[comm] += self.self_loops[node];
                degrees[comm] += self.degrees[node];
                node_weights[comm] += self.node_weights[node];
                for &(neighbor, weight) in &self.adj[node] {
                    let target = membership[neighbor as usize] as usize;
                    if target == comm {
                        // Seen once from each endpoint.
                        self_loops[comm] += weight / 2.0;
                    } else if slot[target] == NO_SLOT {
                        slot[target] = row.len();
                        row.push((target as u32, weight));
                    } else {
                        row[slot[target]].1 += weight;
                    }
                }
            }
            for &(target, _) in &row {
                slot[target as usize] = NO_SLOT;
            }
            adj.push(row);
        }

        LevelGraph {
            adj,
            self_loops,
            degrees,
            node_weights,
            total_weight: self.total_weight,
        }
    }
}

/// Compose one level into the running vertex-to-node map:
/// `folded[v] = membership[folded[v]]`.
pub(crate) fn unfold(folded: &mut [CommID], membership: &[CommID]) {
    for node in folded.iter_mut() {
        *node = membership[*node as usize];
    }
}

/// Coarsen `graph` by `partition` (ids renumbered by first appearance).
pub fn coarsen_partition<G: GraphView + ?Sized>(
    graph: &G,
    weights: Option<&[f64]>,
    partition: &[CommID],
) -> Result<LevelGraph> {
    let weights = validate_edge_weights(graph, weights)?;
    validate_partition(graph.vertex_count(), partition)?;
    let mut membership = partition.to_vec();
    let community_count = renumber(&mut membership);
    Ok(LevelGraph::from_graph(graph, &weights).coarsen(&membership, community_count))
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::graph::GraphSnapshot;
    use crate::level_graph::{coarsen_partition, unfold, LevelGraph};

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * (1.0 + a.abs().max(b.abs()))
    }

    fn random_graph(rng: &mut StdRng, n: u32, m: usize) -> (GraphSnapshot, Vec<f64>) {
        let edges: Vec<(u32, u32)> = (0..m).map(|_| (rng.gen_range(0..n), rng.gen_range(0..n))).collect();
        let weights: Vec<f64> = (0..m).map(|_| rng.gen::<f64>()).collect();
        (GraphSnapshot::from_edges(n, edges).unwrap(), weights)
    }

    #[test]
    fn test_parallel_edges_are_merged() {
        let g = GraphSnapshot::from_edges(3, vec![(0, 1), (1, 0), (1, 2), (2, 2)]).unwrap();
        let level = LevelGraph::from_graph(&g, &[1.0, 2.0, 0.5, 4.0]);
        assert_eq!(level.neighbors(0), &[(1, 3.0)]);
        assert_eq!(level.neighbors(1), &[(0, 3.0), (2, 0.5)]);
        assert_eq!(level.self_loop(2), 4.0);
        assert_eq!(level.degree(2), 8.5);
        assert_eq!(level.total_weight(), 7.5);
        assert_eq!(level.total_degree(), 15.0);
    }

    #[test]
    fn test_coarsen_two_triangles() {
        // Two triangles joined by the edge 2-3.
        let g = GraphSnapshot::from_edges(6, vec![(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5), (2, 3)]).unwrap();
        let coarse = coarsen_partition(&g, None, &[4, 4, 4, 1, 1, 1]).unwrap();
        assert_eq!(coarse.node_count(), 2);
        assert_eq!(coarse.self_loop(0), 3.0);
        assert_eq!(coarse.self_loop(1), 3.0);
        assert_eq!(coarse.neighbors(0), &[(1, 1.0)]);
        assert_eq!(coarse.degree(0), 7.0);
        assert_eq!(coarse.total_weight(), 7.0);
    }

    #[test]
    fn test_coarsening_conserves_weighted_degree() {
        let mut rng = StdRng::seed_from_u64(137);
        for round in 0..40 {
            let n = rng.gen_range(1..200u32);
            let m = rng.gen_range(0..=1000usize);
            let (g, weights) = random_graph(&mut rng, n, m);
            let k = rng.gen_range(1..=n);
            let partition: Vec<u32> = (0..n).map(|_| rng.gen_range(0..k)).collect();

            let original = LevelGraph::from_graph(&g, &weights);
            let coarse = coarsen_partition(&g, Some(&weights), &partition).unwrap();
            let conserved = coarse.adjacency_weight() + 2.0 * coarse.self_loop_weight();
            assert!(
                approx_eq(conserved, original.total_degree()),
                "round {}: {} != {}",
                round,
                conserved,
                original.total_degree()
            );
            assert!(approx_eq(coarse.total_degree(), original.total_degree()));
            assert!(approx_eq(coarse.modularity(&(0..coarse.node_count() as u32).collect::<Vec<_>>(), 1.0),
                              original.modularity(&partition, 1.0)));
        }
    }

    #[test]
    fn test_unfold_composes_levels() {
        let mut folded = vec![0, 1, 2, 3, 4];
        unfold(&mut folded, &[0, 0, 1, 1, 2]);
        assert_eq!(folded, vec![0, 0, 1, 1, 2]);
        unfold(&mut folded, &[1, 1, 0]);
        assert_eq!(folded, vec![1, 1, 1, 1, 0]);
    }

    #[test]
    fn test_coarsen_rejects_bad_partition() {
        let g = GraphSnapshot::from_edges(3, vec![(0, 1)]).unwrap();
        assert!(coarsen_partition(&g, None, &[0, 1]).is_err());
        assert!(coarsen_partition(&g, Some(&[-1.0]), &[0, 1, 2]).is_err());
    }
}
