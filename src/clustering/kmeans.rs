use float_ord::FloatOrd;
use log::trace;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::Rng;

use super::ClusteringError;

pub(super) type Point = [f64; 2];

fn sq_dist(a: &Point, b: &Point) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}

/// The index and squared distance of the centroid closest to `p`, lowest index on ties
fn nearest(p: &Point, centroids: &[Point]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (c, centroid) in centroids.iter().enumerate() {
        let d = sq_dist(p, centroid);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}

pub(super) struct KMeans {
    pub labels: Vec<usize>,
    pub centroids: Vec<Point>,
    /// Weighted sum of squared distances to the assigned centroid
    pub inertia: f64,
}

/// k-means++ seeding: each new centroid is drawn with probability proportional to
/// `weight * d^2`, where `d` is the distance to the closest centroid chosen so far.
fn seed(points: &[Point], weights: &[f64], k: usize, rng: &mut StdRng) -> Result<Vec<Point>, ClusteringError> {
    let first = match WeightedIndex::new(weights) {
        Ok(dist) => dist.sample(rng),
        Err(_) => rng.gen_range(0..points.len()),
    };
    let mut centroids = vec![points[first]];
    let mut closest = points.iter().map(|p| sq_dist(p, &points[first])).collect::<Vec<_>>();

    while centroids.len() < k {
        let scores = closest.iter().zip(weights).map(|(d, w)| d * w);
        let next = match WeightedIndex::new(scores) {
            Ok(dist) => dist.sample(rng),
            // only zero-weight points remain away from the centroids; take the farthest one
            Err(_) => match closest.iter().enumerate().filter(|(_, d)| **d > 0.0).max_by_key(|(_, d)| FloatOrd(**d)) {
                Some((i, _)) => i,
                None => {
                    return Err(ClusteringError::TooFewDistinct {
                        distinct: centroids.len(),
                        clusters: k,
                    })
                }
            },
        };

        centroids.push(points[next]);
        for (d, p) in closest.iter_mut().zip(points) {
            *d = d.min(sq_dist(p, &points[next]));
        }
    }

    Ok(centroids)
}

/// Moves centroids of empty clusters onto the point farthest from its own centroid,
/// taken from a cluster that keeps at least one other member.
fn relocate_empty(points: &[Point], labels: &mut [usize], centroids: &mut [Point]) {
    let k = centroids.len();
    loop {
        let mut sizes = vec![0usize; k];
        for &l in labels.iter() {
            sizes[l] += 1;
        }
        let empty = match sizes.iter().position(|&s| s == 0) {
            Some(c) => c,
            None => return,
        };

        let farthest = (0..points.len())
            .filter(|&i| sizes[labels[i]] > 1)
            .map(|i| (i, sq_dist(&points[i], &centroids[labels[i]])))
            .filter(|&(_, d)| d > 0.0)
            .max_by_key(|&(_, d)| FloatOrd(d));

        match farthest {
            Some((i, _)) => {
                trace!("relocating empty cluster {} to point {}", empty, i);
                centroids[empty] = points[i];
                labels[i] = empty;
            }
            // every point sits on a centroid, nothing left to move
            None => return,
        }
    }
}

fn assign(points: &[Point], centroids: &[Point], labels: &mut [usize]) {
    for (label, p) in labels.iter_mut().zip(points) {
        *label = nearest(p, centroids).0;
    }
}

/// Lloyd's algorithm on weighted points, starting from k-means++ centroids
pub(super) fn weighted_kmeans(
    points: &[Point],
    weights: &[f64],
    k: usize,
    max_iterations: usize,
    tolerance: f64,
    rng: &mut StdRng,
) -> Result<KMeans, ClusteringError> {
    let mut centroids = seed(points, weights, k, rng)?;
    let mut labels = vec![0; points.len()];

    // the tolerance is relative to the spread of the data
    let n = points.len() as f64;
    let variance = (0..2)
        .map(|dim| {
            let mean = points.iter().map(|p| p[dim]).sum::<f64>() / n;
            points.iter().map(|p| (p[dim] - mean).powi(2)).sum::<f64>() / n
        })
        .sum::<f64>()
        / 2.0;
    let tolerance = tolerance * variance;

    for iteration in 0..max_iterations {
        assign(points, &centroids, &mut labels);
        relocate_empty(points, &mut labels, &mut centroids);

        let mut sums = vec![[0.0, 0.0]; k];
        let mut mass = vec![0.0; k];
        for ((p, &w), &l) in points.iter().zip(weights).zip(&labels) {
            sums[l][0] += w * p[0];
            sums[l][1] += w * p[1];
            mass[l] += w;
        }

        let mut shift = 0.0;
        for c in 0..k {
            // a cluster of zero-weight points keeps its centroid
            if mass[c] > 0.0 {
                let updated = [sums[c][0] / mass[c], sums[c][1] / mass[c]];
                shift += sq_dist(&updated, &centroids[c]);
                centroids[c] = updated;
            }
        }

        trace!("k-means iteration {}: centroid shift {:e}", iteration, shift);
        if shift <= tolerance {
            break;
        }
    }

    assign(points, &centroids, &mut labels);
    relocate_empty(points, &mut labels, &mut centroids);

    let inertia = points
        .iter()
        .zip(weights)
        .zip(&labels)
        .map(|((p, w), &l)| w * sq_dist(p, &centroids[l]))
        .sum();

    Ok(KMeans {
        labels,
        centroids,
        inertia,
    })
}
