//! Community detection on weighted undirected graphs: modularity scoring,
//! multilevel Louvain and Leiden, and the coarsening primitive they share.

pub mod batch;
pub mod community_algo;
pub mod config;
pub mod error;
pub mod graph;
pub mod level_graph;
pub mod logger;
pub mod modularity;
pub mod types;
mod util;

pub use batch::{detect_many, DetectionJob};
pub use community_algo::detect_communities;
pub use config::DetectionOptions;
pub use error::{CommunityError, Result};
pub use graph::{is_partition_connected, vertex_strength, GraphSnapshot, GraphView, VInt};
pub use level_graph::{coarsen_partition, LevelGraph};
pub use logger::init_logger;
pub use modularity::modularity;
pub use types::{is_relabeling, Algorithm, CommID, CommStructure, CommunityResult};
