use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::community_algo::detect_communities;
use crate::config::DetectionOptions;
use crate::error::Result;
use crate::graph::GraphView;
use crate::types::{Algorithm, CommunityResult};

/// One detection request of a batch. Every job owns its seed, so results do
/// not depend on how rayon schedules the batch.
#[derive(Debug)]
pub struct DetectionJob<'a, G: ?Sized> {
    pub graph: &'a G,
    pub weights: Option<&'a [f64]>,
    pub resolution: f64,
    pub algorithm: Algorithm,
    pub options: DetectionOptions,
    pub seed: u64,
}

impl<'a, G: GraphView + ?Sized> DetectionJob<'a, G> {
    /// Unweighted job at resolution 1 with default options.
    pub fn new(graph: &'a G, algorithm: Algorithm, seed: u64) -> Self {
        DetectionJob {
            graph,
            weights: None,
            resolution: 1.0,
            algorithm,
            options: DetectionOptions::default(),
            seed,
        }
    }

    pub fn with_weights(mut self, weights: &'a [f64]) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_options(mut self, options: DetectionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn run(&self) -> Result<CommunityResult> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        detect_communities(self.graph, self.weights, self.resolution, self.algorithm, &self.options, &mut rng)
    }
}

/// Run independent jobs on the rayon pool; results come back in job order.
pub fn detect_many<G: GraphView + Sync + ?Sized>(jobs: &[DetectionJob<'_, G>]) -> Vec<Result<CommunityResult>> {
    log::info!("Running {} detection jobs", jobs.len());
    jobs.par_iter().map(|job| job.run()).collect()
}
