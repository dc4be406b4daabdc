use std::collections::VecDeque;

use crate::error::{CommunityError, Result};
use crate::types::CommID;

pub type VInt = u32;

/// Read-only access to an undirected multigraph, as handed over by the graph store.
///
/// Vertices are `0..vertex_count()`, edges are `0..edge_count()`; self-loops and
/// parallel edges are allowed. Edge weights travel next to the graph as a slice
/// indexed by edge id.
pub trait GraphView {
    fn vertex_count(&self) -> usize;

    fn edge_count(&self) -> usize;

    /// Endpoints of `edge`, which must be below `edge_count()`.
    fn edge_endpoints(&self, edge: usize) -> (VInt, VInt);
}

// Graph Snapshot with edge ids, the in-memory adapter used by callers and tests.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    pub(crate) adj_map: Vec<Vec<(VInt, usize)>>, // Neighbor and edge id, one entry per endpoint.
    pub(crate) edge_list: Vec<(VInt, VInt)>, // Endpoints, indexed by edge id.
    pub(crate) v_size: u32,
    pub(crate) e_size: u32,
}

impl GraphSnapshot {
    pub fn new(v_size: u32) -> GraphSnapshot {
        // Create an edge-less snapshot with `v_size` vertices.
        GraphSnapshot {
            adj_map: vec![Vec::new(); v_size as usize],
            edge_list: Vec::new(),
            v_size,
            e_size: 0u32,
        }
    }

    /// Build a snapshot from an edge iterator, edge ids follow iteration order.
    pub fn from_edges(v_size: u32, edges_iter: impl IntoIterator<Item = (VInt, VInt)>) -> Result<GraphSnapshot> {
        let mut graph = GraphSnapshot::new(v_size);
        for (u, v) in edges_iter {
            graph.insert_edge(u, v)?;
        }
        Ok(graph)
    }

    /// Append an undirected edge and return its id.
    pub fn insert_edge(&mut self, u: VInt, v: VInt) -> Result<usize> {
        for vertex in [u, v] {
            if vertex >= self.v_size {
                return Err(CommunityError::VertexOutOfRange {
                    vertex,
                    vertex_count: self.v_size as usize,
                });
            }
        }
        let edge_id = self.edge_list.len();
        self.edge_list.push((u, v));
        self.adj_map[u as usize].push((v, edge_id));
        if u != v {
            self.adj_map[v as usize].push((u, edge_id));
        }
        self.e_size += 1;
        Ok(edge_id)
    }

    /// Weighted degree of every vertex, see [`vertex_strength`].
    pub fn strength(&self, weights: Option<&[f64]>) -> Result<Vec<f64>> {
        vertex_strength(self, weights)
    }

    /// Weakly connected components, each sorted by vertex id.
    pub fn wcc(&self) -> Vec<Vec<VInt>> {
        let mut visited = vec![false; self.v_size as usize];
        let mut components = Vec::new();
        for start in 0..self.v_size {
            if !visited[start as usize] {
                let mut component = self.bfs_component(start, &mut visited);
                component.sort_unstable();
                components.push(component);
            }
        }
        components
    }

    fn bfs_component(&self, start: VInt, visited: &mut [bool]) -> Vec<VInt> {
        let mut component = Vec::new();
        let mut queue = VecDeque::new();
        visited[start as usize] = true;
        queue.push_back(start);
        while let Some(current) = queue.pop_front() {
            component.push(current);
            for &(neighbor, _) in &self.adj_map[current as usize] {
                if !visited[neighbor as usize] {
                    visited[neighbor as usize] = true;
                    queue.push_back(neighbor);
                }
            }
        }
        component
    }

    /// Whether every community of `partition` induces a connected subgraph.
    pub fn is_partition_connected(&self, partition: &[CommID]) -> Result<bool> {
        is_partition_connected(self, partition)
    }
}

impl GraphView for GraphSnapshot {
    fn vertex_count(&self) -> usize {
        self.v_size as usize
    }

    fn edge_count(&self) -> usize {
        self.e_size as usize
    }

    fn edge_endpoints(&self, edge: usize) -> (VInt, VInt) {
        self.edge_list[edge]
    }
}

/// Check that every edge endpoint reported by `graph` is one of its vertices.
pub(crate) fn validate_endpoints<G: GraphView + ?Sized>(graph: &G) -> Result<()> {
    let vertex_count = graph.vertex_count();
    for edge in 0..graph.edge_count() {
        let (u, v) = graph.edge_endpoints(edge);
        if let Some(vertex) = [u, v].into_iter().find(|&x| x as usize >= vertex_count) {
            return Err(CommunityError::VertexOutOfRange { vertex, vertex_count });
        }
    }
    Ok(())
}

/// Materialize edge weights: absent weights mean weight 1 for every edge.
///
/// Fails with `VertexOutOfRange` when an edge leaves the vertex set, and with
/// `InvalidWeights` on a length mismatch or on a negative / non-finite weight.
pub(crate) fn validate_edge_weights<G: GraphView + ?Sized>(graph: &G, weights: Option<&[f64]>) -> Result<Vec<f64>> {
    validate_endpoints(graph)?;
    let edge_count = graph.edge_count();
    match weights {
        None => Ok(vec![1.0; edge_count]),
        Some(weights) => {
            if weights.len() != edge_count {
                return Err(CommunityError::InvalidWeights(format!(
                    "{} edge weights given for {} edges",
                    weights.len(),
                    edge_count
                )));
            }
            if let Some((edge, weight)) = weights
                .iter()
                .enumerate()
                .find(|(_, w)| !w.is_finite() || **w < 0.0)
            {
                return Err(CommunityError::InvalidWeights(format!(
                    "edge {} has weight {}",
                    edge, weight
                )));
            }
            Ok(weights.to_vec())
        }
    }
}

/// Check that a vertex weight vector matches the graph and holds no negative entry.
pub(crate) fn validate_vertex_weights(vertex_count: usize, weights: &[f64]) -> Result<()> {
    if weights.len() != vertex_count {
        return Err(CommunityError::InvalidWeights(format!(
            "{} vertex weights given for {} vertices",
            weights.len(),
            vertex_count
        )));
    }
    if let Some((vertex, weight)) = weights
        .iter()
        .enumerate()
        .find(|(_, w)| !w.is_finite() || **w < 0.0)
    {
        return Err(CommunityError::InvalidWeights(format!(
            "vertex {} has weight {}",
            vertex, weight
        )));
    }
    Ok(())
}

/// Check that `partition` assigns every vertex a community id in `0..vertex_count`.
pub(crate) fn validate_partition(vertex_count: usize, partition: &[CommID]) -> Result<()> {
    if partition.len() != vertex_count {
        return Err(CommunityError::InvalidPartition(format!(
            "partition covers {} vertices, graph has {}",
            partition.len(),
            vertex_count
        )));
    }
    if let Some((vertex, comm)) = partition
        .iter()
        .enumerate()
        .find(|(_, c)| **c as usize >= vertex_count)
    {
        return Err(CommunityError::InvalidPartition(format!(
            "vertex {} assigned to community {}, expected below {}",
            vertex, comm, vertex_count
        )));
    }
    Ok(())
}

/// Sum of incident edge weights per vertex; a self-loop counts twice.
pub fn vertex_strength<G: GraphView + ?Sized>(graph: &G, weights: Option<&[f64]>) -> Result<Vec<f64>> {
    let weights = validate_edge_weights(graph, weights)?;
    let mut strength = vec![0.0f64; graph.vertex_count()];
    for (edge, weight) in weights.iter().enumerate() {
        let (u, v) = graph.edge_endpoints(edge);
        strength[u as usize] += weight;
        strength[v as usize] += weight;
    }
    Ok(strength)
}

/// Whether every community of `partition` induces a connected subgraph of `graph`.
///
/// One BFS per community, restricted to same-community neighbors; a community
/// reached from two different starts is disconnected.
pub fn is_partition_connected<G: GraphView + ?Sized>(graph: &G, partition: &[CommID]) -> Result<bool> {
    let vertex_count = graph.vertex_count();
    validate_partition(vertex_count, partition)?;
    validate_endpoints(graph)?;

    let mut adj: Vec<Vec<VInt>> = vec![Vec::new(); vertex_count];
    for edge in 0..graph.edge_count() {
        let (u, v) = graph.edge_endpoints(edge);
        if u != v && partition[u as usize] == partition[v as usize] {
            adj[u as usize].push(v);
            adj[v as usize].push(u);
        }
    }

    let mut visited = vec![false; vertex_count];
    let mut community_seen = vec![false; vertex_count];
    let mut queue = VecDeque::new();
    for start in 0..vertex_count {
        if visited[start] {
            continue;
        }
        let comm = partition[start] as usize;
        if community_seen[comm] {
            return Ok(false);
        }
        community_seen[comm] = true;
        visited[start] = true;
        queue.push_back(start as VInt);
        while let Some(current) = queue.pop_front() {
            for &neighbor in &adj[current as usize] {
                if !visited[neighbor as usize] {
                    visited[neighbor as usize] = true;
                    queue.push_back(neighbor);
                }
            }
        }
    }
    Ok(true)
}

#[cfg(test)]
mod test_graph {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::community_algo::detect_communities;
    use crate::config::DetectionOptions;
    use crate::error::CommunityError;
    use crate::graph::{
        is_partition_connected, validate_edge_weights, validate_partition, vertex_strength, GraphSnapshot, GraphView,
        VInt,
    };
    use crate::level_graph::coarsen_partition;
    use crate::modularity::modularity;
    use crate::types::Algorithm;

    fn path_graph(n: u32) -> GraphSnapshot {
        GraphSnapshot::from_edges(n, (0..n - 1).map(|i| (i, i + 1))).unwrap()
    }

    #[test]
    fn test_from_edges() {
        let g = GraphSnapshot::from_edges(4, vec![(0, 1), (1, 2), (2, 0), (3, 3)]).unwrap();
        assert_eq!(g.vertex_count(), 4);
        assert_eq!(g.edge_count(), 4);
        assert_eq!(g.edge_endpoints(3), (3, 3));
        // A self-loop is listed once.
        assert_eq!(g.adj_map[3], vec![(3, 3)]);
        assert_eq!(g.adj_map[0], vec![(1, 0), (2, 2)]);
    }

    /// Adapter whose single edge points past its vertex set.
    struct DanglingEdgeView;

    impl GraphView for DanglingEdgeView {
        fn vertex_count(&self) -> usize {
            2
        }

        fn edge_count(&self) -> usize {
            1
        }

        fn edge_endpoints(&self, _edge: usize) -> (VInt, VInt) {
            (0, 5)
        }
    }

    #[test]
    fn test_foreign_view_with_dangling_edge() {
        let out_of_range = CommunityError::VertexOutOfRange { vertex: 5, vertex_count: 2 };
        let view = DanglingEdgeView;
        assert_eq!(validate_edge_weights(&view, None).unwrap_err(), out_of_range);
        assert_eq!(vertex_strength(&view, Some(&[1.0])).unwrap_err(), out_of_range);
        assert_eq!(is_partition_connected(&view, &[0, 0]).unwrap_err(), out_of_range);
        assert_eq!(modularity(&view, &[0, 1], None, 1.0).unwrap_err(), out_of_range);
        assert_eq!(coarsen_partition(&view, None, &[0, 0]).unwrap_err(), out_of_range);

        let mut rng = StdRng::seed_from_u64(1);
        for algorithm in [Algorithm::Louvain, Algorithm::Leiden] {
            let result = detect_communities(&view, None, 1.0, algorithm, &DetectionOptions::default(), &mut rng);
            assert_eq!(result.unwrap_err(), out_of_range);
        }
    }

    #[test]
    fn test_out_of_range_edge() {
        let result = GraphSnapshot::from_edges(3, vec![(0, 1), (1, 5)]);
        assert_eq!(
            result.unwrap_err(),
            CommunityError::VertexOutOfRange { vertex: 5, vertex_count: 3 }
        );
    }

    #[test]
    fn test_strength_counts_loops_twice() {
        let g = GraphSnapshot::from_edges(3, vec![(0, 1), (1, 2), (2, 2)]).unwrap();
        let strength = g.strength(Some(&[0.5, 2.0, 1.5])).unwrap();
        assert_eq!(strength, vec![0.5, 2.5, 5.0]);
        let unweighted = g.strength(None).unwrap();
        assert_eq!(unweighted, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_validate_edge_weights() {
        let g = path_graph(3);
        assert_eq!(validate_edge_weights(&g, None).unwrap(), vec![1.0, 1.0]);
        assert!(matches!(
            validate_edge_weights(&g, Some(&[1.0])),
            Err(CommunityError::InvalidWeights(_))
        ));
        assert!(matches!(
            validate_edge_weights(&g, Some(&[1.0, -0.1])),
            Err(CommunityError::InvalidWeights(_))
        ));
        assert!(matches!(
            validate_edge_weights(&g, Some(&[f64::NAN, 1.0])),
            Err(CommunityError::InvalidWeights(_))
        ));
    }

    #[test]
    fn test_validate_partition() {
        assert!(validate_partition(3, &[0, 1, 2]).is_ok());
        assert!(matches!(validate_partition(3, &[0, 1]), Err(CommunityError::InvalidPartition(_))));
        assert!(matches!(validate_partition(3, &[0, 3, 1]), Err(CommunityError::InvalidPartition(_))));
    }

    #[test]
    fn test_wcc() {
        let g = GraphSnapshot::from_edges(6, vec![(0, 1), (1, 2), (4, 3)]).unwrap();
        let components = g.wcc();
        assert_eq!(components, vec![vec![0, 1, 2], vec![3, 4], vec![5]]);
    }

    #[test]
    fn test_partition_connectivity() {
        let g = path_graph(5);
        assert!(g.is_partition_connected(&[0, 0, 0, 1, 1]).unwrap());
        // 0 and 2 share a community but 1 sits between them.
        assert!(!g.is_partition_connected(&[0, 1, 0, 2, 2]).unwrap());
        assert!(is_partition_connected(&g, &[0, 1, 2, 3, 4]).unwrap());
        assert!(g.is_partition_connected(&[0, 0]).is_err());
    }
}
