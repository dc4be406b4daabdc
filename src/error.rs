use derive_more::Display;

/// Result alias used by every community detection entry point.
pub type Result<T> = std::result::Result<T, CommunityError>;

/// Errors raised while validating inputs or running an engine.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum CommunityError {
    /// The graph has no vertex at all.
    #[display(fmt = "graph has no vertices")]
    EmptyGraph,

    /// Edge weights (or vertex weights) are negative, not finite, or of the wrong length.
    #[display(fmt = "invalid weights: {}", _0)]
    InvalidWeights(String),

    /// A partition does not cover the vertex set, or uses an out-of-range community id.
    #[display(fmt = "invalid partition: {}", _0)]
    InvalidPartition(String),

    /// A hard iteration cap or time budget stopped the engine before a local optimum.
    #[display(fmt = "not converged after {} passes", passes)]
    NotConverged { passes: usize },

    /// A tuning parameter is outside its domain (e.g. resolution <= 0).
    #[display(fmt = "invalid parameter: {}", _0)]
    InvalidParameter(String),

    /// An edge endpoint is not a vertex of the graph.
    #[display(fmt = "vertex {} out of range, graph has {} vertices", vertex, vertex_count)]
    VertexOutOfRange { vertex: u32, vertex_count: usize },
}

impl std::error::Error for CommunityError {}
