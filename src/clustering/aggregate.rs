use ndarray::{Array2, Array4, Axis};

use super::{Clustering, ClusteringError};

/// Sums demand of all members of a cluster onto the cluster.
///
/// `demand` is indexed by [location, product, period, scenario]; the result is indexed by
/// [cluster, product, period, scenario], so that every (product, period, scenario) total is
/// unchanged.
pub fn aggregate_demand(clustering: &Clustering, demand: &Array4<f64>) -> Result<Array4<f64>, ClusteringError> {
    let (n, p, t, s) = demand.dim();
    if n != clustering.locations() {
        return Err(ClusteringError::LocationCountMismatch {
            expected: clustering.locations(),
            actual: n,
        });
    }

    let mut out = Array4::zeros((clustering.len(), p, t, s));
    for (location, row) in demand.outer_iter().enumerate() {
        let mut target = out.index_axis_mut(Axis(0), *clustering.label(location));
        target += &row;
    }

    Ok(out)
}

/// Sums the cost from every origin to all destinations of a cluster.
///
/// `costs` is indexed by [origin, destination] and the clustering is over the destinations;
/// the result is indexed by [origin, cluster].
pub fn aggregate_costs(clustering: &Clustering, costs: &Array2<f64>) -> Result<Array2<f64>, ClusteringError> {
    if costs.ncols() != clustering.locations() {
        return Err(ClusteringError::LocationCountMismatch {
            expected: clustering.locations(),
            actual: costs.ncols(),
        });
    }

    let mut out = Array2::zeros((costs.nrows(), clustering.len()));
    for (destination, column) in costs.axis_iter(Axis(1)).enumerate() {
        let mut target = out.column_mut(*clustering.label(destination));
        target += &column;
    }

    Ok(out)
}
