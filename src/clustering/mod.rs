//! Weighted geographic clustering of demand points.
//!
//! Locations are clustered on (latitude, longitude) with a weighted, seeded k-means. Every
//! cluster is then represented by its *center*: the member closest (great-circle distance) to
//! the centroid of the member locations. Demand and travel costs can be re-aggregated onto
//! the centers with the functions in [`aggregate`].

pub mod aggregate;
mod kmeans;

use std::collections::HashSet;

use derive_more::{Deref, Display, From, Into};
use float_ord::FloatOrd;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use typed_index_collections::TiVec;

use crate::geo::{centroid, great_circle, LatLon};

pub use aggregate::{aggregate_costs, aggregate_demand};

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct ClusterIndex(usize);

#[derive(Debug, Clone)]
pub struct KMeansConfig {
    /// The number of clusters
    pub clusters: usize,
    /// Seed of the k-means++ initialisation
    pub seed: u64,
    pub max_iterations: usize,
    /// Convergence threshold on the squared centroid shift, relative to the data variance
    pub tolerance: f64,
    /// Number of independent initialisations, the one with the lowest inertia is kept
    pub restarts: usize,
}

impl KMeansConfig {
    pub fn new(clusters: usize) -> KMeansConfig {
        KMeansConfig {
            clusters,
            seed: 0,
            max_iterations: 300,
            tolerance: 1e-4,
            restarts: 10,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> KMeansConfig {
        self.seed = seed;
        self
    }
}

#[derive(Debug, Display)]
pub enum ClusteringError {
    #[display(fmt = "the number of clusters must be positive")]
    NoClusters,
    #[display(fmt = "cannot form {} clusters from {} locations", clusters, points)]
    TooManyClusters { clusters: usize, points: usize },
    #[display(fmt = "only {} distinct locations for {} clusters", distinct, clusters)]
    TooFewDistinct { distinct: usize, clusters: usize },
    #[display(fmt = "expected {} cluster centers, found {}", expected, actual)]
    CenterCountMismatch { expected: usize, actual: usize },
    #[display(fmt = "expected one weight per location ({}), got {}", expected, actual)]
    WeightCountMismatch { expected: usize, actual: usize },
    #[display(fmt = "weight of location {} is negative or not finite", _0)]
    InvalidWeight(usize),
    #[display(fmt = "data covers {} locations, but the clustering has {}", actual, expected)]
    LocationCountMismatch { expected: usize, actual: usize },
}

impl std::error::Error for ClusteringError {}

/// A partition of a set of locations into clusters, each with a designated center location.
#[derive(Debug, Clone)]
pub struct Clustering {
    /// The cluster of every location
    labels: Vec<ClusterIndex>,
    /// The location chosen as center of each cluster
    centers: TiVec<ClusterIndex, usize>,
    /// The members of each cluster, in increasing order
    members: TiVec<ClusterIndex, Vec<usize>>,
}

impl Clustering {
    /// Clusters `points` into `config.clusters` groups, weighting each point by `weights`
    pub fn new(points: &[LatLon], weights: &[f64], config: &KMeansConfig) -> Result<Clustering, ClusteringError> {
        let k = config.clusters;
        let n = points.len();
        if k == 0 {
            return Err(ClusteringError::NoClusters);
        }
        if k > n {
            return Err(ClusteringError::TooManyClusters { clusters: k, points: n });
        }
        if weights.len() != n {
            return Err(ClusteringError::WeightCountMismatch {
                expected: n,
                actual: weights.len(),
            });
        }
        if let Some(i) = weights.iter().position(|w| !(w.is_finite() && *w >= 0.0)) {
            return Err(ClusteringError::InvalidWeight(i));
        }

        let distinct = points
            .iter()
            .map(|p| (p.lat.to_bits(), p.lon.to_bits()))
            .collect::<HashSet<_>>()
            .len();
        if distinct < k {
            return Err(ClusteringError::TooFewDistinct { distinct, clusters: k });
        }

        let weights = match weights.iter().sum::<f64>() > 0.0 {
            true => weights.to_vec(),
            false => {
                debug!("All weights are zero, clustering with uniform weights");
                vec![1.0; n]
            }
        };

        let coords = points.iter().map(|p| [p.lat, p.lon]).collect::<Vec<_>>();
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut best: Option<kmeans::KMeans> = None;
        for _ in 0..config.restarts.max(1) {
            let run = kmeans::weighted_kmeans(&coords, &weights, k, config.max_iterations, config.tolerance, &mut rng)?;
            if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }
        let best = best.ok_or(ClusteringError::NoClusters)?;

        let mut members: TiVec<ClusterIndex, Vec<usize>> = vec![Vec::new(); k].into();
        for (i, &label) in best.labels.iter().enumerate() {
            members[ClusterIndex(label)].push(i);
        }

        let centers = members
            .iter()
            .map(|m| centermost(points, m))
            .collect::<Option<TiVec<ClusterIndex, usize>>>();
        let centers = match centers {
            Some(centers) => centers,
            None => {
                return Err(ClusteringError::CenterCountMismatch {
                    expected: k,
                    actual: members.iter().filter(|m| !m.is_empty()).count(),
                })
            }
        };

        info!("Clustered {} locations into {} clusters (inertia {:.4})", n, k, best.inertia);

        Ok(Clustering {
            labels: best.labels.into_iter().map(ClusterIndex).collect(),
            centers,
            members,
        })
    }

    /// The number of clusters
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// The number of clustered locations
    pub fn locations(&self) -> usize {
        self.labels.len()
    }

    pub fn label(&self, location: usize) -> ClusterIndex {
        self.labels[location]
    }

    pub fn labels(&self) -> &[ClusterIndex] {
        &self.labels
    }

    /// The location chosen as the center of `cluster`
    pub fn center(&self, cluster: ClusterIndex) -> usize {
        self.centers[cluster]
    }

    /// The center locations, ordered by cluster
    pub fn centers(&self) -> &TiVec<ClusterIndex, usize> {
        &self.centers
    }

    /// The center of the cluster `location` belongs to
    pub fn center_of(&self, location: usize) -> usize {
        self.centers[self.labels[location]]
    }

    pub fn is_center(&self, location: usize) -> bool {
        self.center_of(location) == location
    }

    pub fn members(&self, cluster: ClusterIndex) -> &[usize] {
        &self.members[cluster]
    }
}

/// The member closest to the centroid of the members, or `None` for an empty cluster
fn centermost(points: &[LatLon], members: &[usize]) -> Option<usize> {
    let mid = centroid(members.iter().map(|&i| points[i]))?;
    members
        .iter()
        .copied()
        .min_by_key(|&i| FloatOrd(great_circle(points[i], mid)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize) -> Vec<LatLon> {
        // four loose groups around England
        let bases = [(51.5, -0.1), (52.5, -1.9), (53.5, -2.2), (50.4, -4.1)];
        (0..n)
            .map(|i| {
                let (lat, lon) = bases[i % 4];
                let offset = (i / 4) as f64 * 0.01;
                LatLon {
                    lat: lat + offset,
                    lon: lon - offset,
                }
            })
            .collect()
    }

    #[test]
    fn produces_exactly_k_centers() {
        let points = grid(40);
        let weights = (0..40).map(|i| (i % 7) as f64).collect::<Vec<_>>();
        for k in [1, 3, 4, 10, 40] {
            let clustering = Clustering::new(&points, &weights, &KMeansConfig::new(k)).unwrap();
            assert_eq!(clustering.len(), k);
            assert_eq!(clustering.centers().iter().collect::<HashSet<_>>().len(), k);
            for (c, &center) in clustering.centers().iter_enumerated() {
                assert_eq!(clustering.label(center), c);
                assert!(clustering.members(c).contains(&center));
            }
            let total = clustering.centers().iter_enumerated().map(|(c, _)| clustering.members(c).len()).sum::<usize>();
            assert_eq!(total, 40);
        }
    }

    #[test]
    fn deterministic_for_a_seed() {
        let points = grid(30);
        let weights = vec![1.0; 30];
        let config = KMeansConfig::new(5).with_seed(42);
        let a = Clustering::new(&points, &weights, &config).unwrap();
        let b = Clustering::new(&points, &weights, &config).unwrap();
        assert_eq!(a.labels(), b.labels());
        assert_eq!(a.centers(), b.centers());
    }

    #[test]
    fn center_is_the_member_closest_to_the_centroid() {
        let points = vec![
            LatLon { lat: 50.0, lon: 0.0 },
            LatLon { lat: 50.1, lon: 0.0 },
            LatLon { lat: 50.2, lon: 0.0 },
        ];
        let clustering = Clustering::new(&points, &[0.0, 0.0, 0.0], &KMeansConfig::new(1)).unwrap();
        assert_eq!(clustering.center(ClusterIndex::from(0)), 1);
        assert!(clustering.is_center(1));
        assert_eq!(clustering.center_of(2), 1);
    }

    #[test]
    fn degenerate_requests_fail() {
        let points = grid(8);
        let weights = vec![1.0; 8];
        assert!(matches!(
            Clustering::new(&points, &weights, &KMeansConfig::new(0)),
            Err(ClusteringError::NoClusters)
        ));
        assert!(matches!(
            Clustering::new(&points, &weights, &KMeansConfig::new(9)),
            Err(ClusteringError::TooManyClusters { .. })
        ));
        let same = vec![LatLon { lat: 51.0, lon: 0.0 }; 5];
        assert!(matches!(
            Clustering::new(&same, &[1.0; 5], &KMeansConfig::new(2)),
            Err(ClusteringError::TooFewDistinct { distinct: 1, clusters: 2 })
        ));
        assert!(matches!(
            Clustering::new(&points, &[1.0; 3], &KMeansConfig::new(2)),
            Err(ClusteringError::WeightCountMismatch { .. })
        ));
        let mut negative = weights.clone();
        negative[4] = -1.0;
        assert!(matches!(
            Clustering::new(&points, &negative, &KMeansConfig::new(2)),
            Err(ClusteringError::InvalidWeight(4))
        ));
    }
}
