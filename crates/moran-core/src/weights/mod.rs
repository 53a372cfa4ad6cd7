//! Spatial weight matrices.
//!
//! A [`WeightingMode`] selects how the raw neighbor matrix C is built; every
//! mode shares the same row normalization into W. Both matrices have a zero
//! diagonal, and each row of W sums to 1 or, for a feature with no neighbors,
//! to exactly 0.
pub mod contiguity;
pub mod distance;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::PolygonSet;
use crate::matrix::SquareMatrix;

/// Neighbor rule for polygon contiguity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjacencyRule {
    /// Buffered geometries intersect.
    Rook,
    /// Buffered geometries touch: shared boundary, disjoint interiors.
    Queen,
}

/// How neighbors are found and weighted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WeightingMode {
    /// Polygon adjacency after buffering by `buffer`, capped at the first `k`
    /// neighbors in index order.
    Contiguity {
        rule: AdjacencyRule,
        k: usize,
        #[serde(default)]
        buffer: f64,
    },
    /// Binary weight for the `k` nearest centroids.
    DistanceBand {
        k: usize,
        /// Candidates farther than this are discarded before the k-nearest cut.
        #[serde(default)]
        radius: Option<f64>,
    },
    /// Weight 1 / d^power for the `k` nearest centroids.
    InverseDistance {
        k: usize,
        power: f64,
        #[serde(default)]
        radius: Option<f64>,
    },
}

impl Default for WeightingMode {
    fn default() -> Self {
        WeightingMode::DistanceBand { k: 1, radius: None }
    }
}

impl WeightingMode {
    pub fn neighbor_count(&self) -> usize {
        match *self {
            WeightingMode::Contiguity { k, .. }
            | WeightingMode::DistanceBand { k, .. }
            | WeightingMode::InverseDistance { k, .. } => k,
        }
    }

    /// Distance cutoff, if the mode has one.
    pub fn radius(&self) -> Option<f64> {
        match *self {
            WeightingMode::Contiguity { .. } => None,
            WeightingMode::DistanceBand { radius, .. } | WeightingMode::InverseDistance { radius, .. } => radius,
        }
    }

    /// Check every parameter against a set of `n` features.
    ///
    /// Runs before any matrix is touched; a failure here means nothing was computed.
    pub fn validate(&self, n: usize) -> Result<()> {
        if n < 2 {
            return Err(Error::InsufficientData { available: n, required: 2 });
        }
        let k = self.neighbor_count();
        if k < 1 {
            return Err(Error::invalid("k", k, "neighbor count must be at least 1"));
        }
        if k >= n {
            return Err(Error::invalid("k", k, format!("neighbor count must be below the feature count {n}")));
        }
        match *self {
            WeightingMode::Contiguity { buffer, .. } => {
                if !buffer.is_finite() || buffer < 0.0 {
                    return Err(Error::invalid("buffer", buffer, "buffer must be finite and non-negative"));
                }
            }
            WeightingMode::DistanceBand { radius, .. } => validate_radius(radius)?,
            WeightingMode::InverseDistance { power, radius, .. } => {
                if !power.is_finite() || power < 0.0 {
                    return Err(Error::invalid("power", power, "power must be finite and non-negative"));
                }
                validate_radius(radius)?;
            }
        }
        Ok(())
    }
}

fn validate_radius(radius: Option<f64>) -> Result<()> {
    match radius {
        Some(r) if !r.is_finite() || r <= 0.0 => {
            Err(Error::invalid("radius", r, "radius must be finite and positive"))
        }
        _ => Ok(()),
    }
}

/// Raw and row-normalized weights for one polygon set and one mode.
#[derive(Debug, Clone, Serialize)]
pub struct WeightMatrix {
    /// C: raw neighbor weights.
    pub raw: SquareMatrix,
    /// W: C with every row scaled to sum to 1 (or left all-zero).
    pub normalized: SquareMatrix,
}

impl WeightMatrix {
    /// Normalize a raw matrix and pair the two.
    pub fn from_raw(raw: SquareMatrix) -> Self {
        let normalized = normalize_rows(&raw);
        Self { raw, normalized }
    }

    pub fn n(&self) -> usize {
        self.raw.n
    }

    /// Number of nonzero raw weights per row.
    pub fn neighbor_counts(&self) -> Vec<usize> {
        (0..self.raw.n)
            .map(|r| self.raw.row(r).iter().filter(|&&w| w > 0.0).count())
            .collect()
    }

    /// Features with no neighbor at all.
    pub fn islands(&self) -> Vec<usize> {
        self.neighbor_counts()
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c == 0)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Scale each row to unit sum. Zero-sum rows stay all-zero.
pub fn normalize_rows(raw: &SquareMatrix) -> SquareMatrix {
    let mut w = raw.clone();
    for r in 0..w.n {
        let row = w.row_mut(r);
        let sum: f64 = row.iter().sum();
        if sum > 0.0 && sum.is_finite() {
            row.iter_mut().for_each(|v| *v /= sum);
        } else {
            row.iter_mut().for_each(|v| *v = 0.0);
        }
    }
    w
}

/// Build C and W for `set` under `mode`.
pub fn build_weights(set: &PolygonSet, mode: &WeightingMode) -> Result<WeightMatrix> {
    mode.validate(set.len())?;

    let raw = match *mode {
        WeightingMode::Contiguity { rule, k, buffer } => {
            contiguity::contiguity_weights(set.polygons(), rule, k, buffer)
        }
        WeightingMode::DistanceBand { k, radius } => {
            distance::distance_band_weights(set.distances(), k, radius)
        }
        WeightingMode::InverseDistance { k, power, radius } => {
            distance::inverse_distance_weights(set.distances(), k, power, radius)
        }
    };

    let weights = WeightMatrix::from_raw(raw);
    let islands = weights.islands();
    tracing::debug!(n = weights.n(), islands = islands.len(), ?mode, "built weight matrix");
    Ok(weights)
}
