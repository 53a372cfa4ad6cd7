//! Centroid-distance weights: binary k-nearest band and inverse distance.
//!
//! For row i every j ≠ i is ranked by ascending D[i][j]; the sort is stable,
//! so equal distances keep index order. An optional radius drops candidates
//! beyond it before the k-nearest cut. Coincident centroids (D = 0) can be
//! selected but never receive weight.
use crate::matrix::SquareMatrix;

/// Indices of the `k` nearest neighbors of `row`, nearest first.
pub fn k_nearest(distances: &SquareMatrix, row: usize, k: usize, radius: Option<f64>) -> Vec<usize> {
    let d = distances.row(row);
    let mut candidates: Vec<usize> = (0..distances.n)
        .filter(|&j| j != row)
        .filter(|&j| radius.map_or(true, |r| d[j] <= r))
        .collect();
    candidates.sort_by(|&a, &b| d[a].total_cmp(&d[b]));
    candidates.truncate(k);
    candidates
}

fn nearest_weights(
    distances: &SquareMatrix,
    k: usize,
    radius: Option<f64>,
    weight: impl Fn(f64) -> f64,
) -> SquareMatrix {
    let mut c = SquareMatrix::zeros(distances.n);
    for i in 0..distances.n {
        for j in k_nearest(distances, i, k, radius) {
            let d = distances.get(i, j);
            if d > 0.0 {
                c.set(i, j, weight(d));
            }
        }
    }
    c
}

/// C[i][j] = 1 for the k nearest neighbors of i.
pub fn distance_band_weights(distances: &SquareMatrix, k: usize, radius: Option<f64>) -> SquareMatrix {
    nearest_weights(distances, k, radius, |_| 1.0)
}

/// C[i][j] = 1 / D[i][j]^power for the k nearest neighbors of i.
pub fn inverse_distance_weights(
    distances: &SquareMatrix,
    k: usize,
    power: f64,
    radius: Option<f64>,
) -> SquareMatrix {
    nearest_weights(distances, k, radius, |d| 1.0 / d.powf(power))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::normalize_rows;

    /// Distances between points on a line at the given positions.
    fn line(xs: &[f64]) -> SquareMatrix {
        SquareMatrix::from_fn(xs.len(), |i, j| (xs[i] - xs[j]).abs())
    }

    #[test]
    fn ties_break_by_index() {
        let d = line(&[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(k_nearest(&d, 1, 1, None), vec![0]);
        assert_eq!(k_nearest(&d, 2, 1, None), vec![1]);
        assert_eq!(k_nearest(&d, 2, 3, None), vec![1, 3, 0]);
    }

    #[test]
    fn full_band_is_uniform() {
        let d = line(&[0.0, 1.0, 3.0, 7.0, 8.0]);
        let w = normalize_rows(&distance_band_weights(&d, 4, None));
        for i in 0..5 {
            for j in 0..5 {
                let expected = if i == j { 0.0 } else { 0.25 };
                assert!((w.get(i, j) - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn inverse_power_zero_matches_band() {
        let d = line(&[0.0, 1.5, 2.0, 6.0, 6.5, 9.0]);
        for k in 1..5 {
            let band = distance_band_weights(&d, k, None);
            let idw = inverse_distance_weights(&d, k, 0.0, None);
            assert_eq!(band, idw, "k = {k}");
            let w = normalize_rows(&idw);
            for i in 0..d.n {
                for &v in w.row(i).iter().filter(|&&v| v > 0.0) {
                    assert!((v - 1.0 / k as f64).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn inverse_distance_favours_closer_neighbors() {
        let d = line(&[0.0, 1.0, 3.0]);
        let c = inverse_distance_weights(&d, 2, 2.0, None);
        assert!((c.get(0, 1) - 1.0).abs() < 1e-12);
        assert!((c.get(0, 2) - 1.0 / 9.0).abs() < 1e-12);
        let w = normalize_rows(&c);
        assert!((w.get(0, 1) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn radius_prefilters_candidates() {
        let d = line(&[0.0, 1.0, 5.0]);
        let c = distance_band_weights(&d, 2, Some(2.0));
        assert_eq!(c.row(0), &[0.0, 1.0, 0.0]);
        assert_eq!(c.row(2), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn coincident_centroids_get_no_weight() {
        let d = line(&[0.0, 0.0, 4.0]);
        let c = distance_band_weights(&d, 1, None);
        assert_eq!(c.row(0), &[0.0, 0.0, 0.0]);
        assert_eq!(c.row(2), &[1.0, 0.0, 0.0]);
    }
}
