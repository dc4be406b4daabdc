//! Modularity of a partition:
//!
//! ```text
//! Q = (1 / 2m) × Σ_c [ e_c − γ · d_c² / 2m ]
//! ```
//!
//! m is the total edge weight, e_c the weight of edges inside community c
//! counted from both endpoints (a self-loop of weight w adds 2w), d_c the sum
//! of weighted degrees in c. A graph without edge weight has no modularity
//! signal and scores 0.

use crate::error::{CommunityError, Result};
use crate::graph::{validate_edge_weights, validate_partition, GraphView};
use crate::types::CommID;

/// Check that the resolution is a positive finite number.
pub(crate) fn validate_resolution(resolution: f64) -> Result<()> {
    if !resolution.is_finite() || resolution <= 0.0 {
        return Err(CommunityError::InvalidParameter(format!(
            "resolution must be positive, got {}",
            resolution
        )));
    }
    Ok(())
}

/// Modularity of `partition` under resolution `resolution`.
///
/// `partition[v]` is the community of vertex v and must be below the vertex count.
pub fn modularity<G: GraphView + ?Sized>(
    graph: &G,
    partition: &[CommID],
    weights: Option<&[f64]>,
    resolution: f64,
) -> Result<f64> {
    validate_resolution(resolution)?;
    validate_partition(graph.vertex_count(), partition)?;
    let weights = validate_edge_weights(graph, weights)?;

    let total_weight: f64 = weights.iter().sum();
    if total_weight <= 0.0 {
        return Ok(0.0);
    }

    let mut internal = vec![0.0f64; graph.vertex_count()];
    let mut degree = vec![0.0f64; graph.vertex_count()];
    for (edge, &weight) in weights.iter().enumerate() {
        let (u, v) = graph.edge_endpoints(edge);
        let (cu, cv) = (partition[u as usize] as usize, partition[v as usize] as usize);
        degree[cu] += weight;
        degree[cv] += weight;
        if cu == cv {
            internal[cu] += 2.0 * weight;
        }
    }

    let two_m = 2.0 * total_weight;
    let q = internal
        .iter()
        .zip(degree.iter())
        .map(|(e_c, d_c)| e_c - resolution * d_c * d_c / two_m)
        .sum::<f64>();
    Ok(q / two_m)
}
