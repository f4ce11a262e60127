//! Cluster post-processing hooks applied before a cluster becomes a hit.

use crate::heap::ClusterItem;
use vxdigi_core::LadderGeometry;

/// Reshapes a finished cluster before it is committed as hits.
///
/// A processor may return the cluster unchanged, drop it (empty vector),
/// filter its pixels or split it into several clusters. Closures with the
/// same signature implement the trait.
pub trait ClusterProcessor: Send + Sync {
    /// Processes one finished cluster.
    fn process(&self, cluster: ClusterItem, geometry: &LadderGeometry) -> Vec<ClusterItem>;

    /// Name used in log messages.
    fn name(&self) -> &'static str {
        "custom"
    }
}

impl<F> ClusterProcessor for F
where
    F: Fn(ClusterItem, &LadderGeometry) -> Vec<ClusterItem> + Send + Sync,
{
    fn process(&self, cluster: ClusterItem, geometry: &LadderGeometry) -> Vec<ClusterItem> {
        self(cluster, geometry)
    }
}

/// Identity processor, the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl ClusterProcessor for Passthrough {
    fn process(&self, cluster: ClusterItem, _geometry: &LadderGeometry) -> Vec<ClusterItem> {
        vec![cluster]
    }

    fn name(&self) -> &'static str {
        "Passthrough"
    }
}

/// Removes pixels on the outer border of the ladder.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgePixelFilter;

impl ClusterProcessor for EdgePixelFilter {
    fn process(&self, mut cluster: ClusterItem, geometry: &LadderGeometry) -> Vec<ClusterItem> {
        cluster.pixels.retain(|p| !geometry.is_edge(p.row, p.col));
        if cluster.pixels.is_empty() {
            Vec::new()
        } else {
            vec![cluster]
        }
    }

    fn name(&self) -> &'static str {
        "EdgePixelFilter"
    }
}

/// Keeps clusters whose pixel count lies within bounds.
#[derive(Debug, Clone, Copy)]
pub struct SizeFilter {
    /// Minimum number of pixels to keep a cluster.
    pub min_cluster_size: usize,
    /// Maximum number of pixels (for filtering large artifacts).
    pub max_cluster_size: Option<usize>,
}

impl Default for SizeFilter {
    fn default() -> Self {
        Self {
            min_cluster_size: 1,
            max_cluster_size: None,
        }
    }
}

impl ClusterProcessor for SizeFilter {
    fn process(&self, cluster: ClusterItem, _geometry: &LadderGeometry) -> Vec<ClusterItem> {
        let size = cluster.pixels.len();
        if size >= self.min_cluster_size && self.max_cluster_size.is_none_or(|max| size <= max) {
            vec![cluster]
        } else {
            Vec::new()
        }
    }

    fn name(&self) -> &'static str {
        "SizeFilter"
    }
}
