//! Ordered polygon features with their derived centroids and distances.
//!
//! Index order is load-bearing: feature `i` is row and column `i` of every
//! matrix built downstream. Centroids and the distance matrix are derived once
//! at construction and never change; dropping features produces a new set.
use geo::{Centroid, EuclideanDistance, Intersects, Point, Polygon, Relate};

use crate::error::{Error, Result};
use crate::matrix::SquareMatrix;

/// Relative tolerance for the "boundaries meet exactly" test on buffered polygons.
const TOUCH_TOL: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct PolygonSet {
    polygons: Vec<Polygon<f64>>,
    values: Vec<f64>,
    centroids: Vec<Point<f64>>,
    distances: SquareMatrix,
}

impl PolygonSet {
    /// Validate the features and derive centroids plus the centroid distance matrix.
    pub fn new(polygons: Vec<Polygon<f64>>, values: Vec<f64>) -> Result<Self> {
        if polygons.len() != values.len() {
            return Err(Error::LengthMismatch { polygons: polygons.len(), values: values.len() });
        }
        if polygons.len() < 2 {
            return Err(Error::InsufficientData { available: polygons.len(), required: 2 });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::NonFiniteValue { index });
        }

        let centroids = polygons
            .iter()
            .enumerate()
            .map(|(index, p)| p.centroid().ok_or(Error::EmptyGeometry { index }))
            .collect::<Result<Vec<_>>>()?;

        let n = centroids.len();
        let mut distances = SquareMatrix::zeros(n);
        for i in 0..n {
            for j in i + 1..n {
                let d = centroids[i].euclidean_distance(&centroids[j]);
                distances.set(i, j, d);
                distances.set(j, i, d);
            }
        }

        tracing::debug!(features = n, "derived centroids and distance matrix");

        Ok(Self { polygons, values, centroids, distances })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn polygons(&self) -> &[Polygon<f64>] {
        &self.polygons
    }

    /// The selected attribute, one value per feature.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn centroids(&self) -> &[Point<f64>] {
        &self.centroids
    }

    pub fn distances(&self) -> &SquareMatrix {
        &self.distances
    }

    /// Smallest and largest strictly positive centroid distance.
    /// `None` when every centroid coincides.
    pub fn distance_range(&self) -> Option<(f64, f64)> {
        let mut positive = self.distances.data.iter().copied().filter(|&d| d > 0.0).peekable();
        positive.peek()?;
        Some(positive.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }

    /// A new set without the features at `indices`. Centroids and distances are rebuilt.
    pub fn without(&self, indices: &[usize]) -> Result<Self> {
        let (polygons, values): (Vec<_>, Vec<_>) = self
            .polygons
            .iter()
            .zip(&self.values)
            .enumerate()
            .filter(|(i, _)| !indices.contains(i))
            .map(|(_, (p, &v))| (p.clone(), v))
            .unzip();
        Self::new(polygons, values)
    }
}

/// Do `a` and `b` intersect once each is expanded by `buffer`?
///
/// With round-join buffering this holds iff the originals intersect or lie
/// within `2 * buffer` of each other.
pub fn buffered_intersects(a: &Polygon<f64>, b: &Polygon<f64>, buffer: f64) -> bool {
    if a.intersects(b) {
        return true;
    }
    buffer > 0.0 && a.euclidean_distance(b) <= 2.0 * buffer
}

/// Do `a` and `b` touch (share boundary points, disjoint interiors) once each
/// is expanded by `buffer`?
pub fn buffered_touches(a: &Polygon<f64>, b: &Polygon<f64>, buffer: f64) -> bool {
    if buffer == 0.0 {
        return a.relate(b).is_touches();
    }
    if a.intersects(b) {
        return false;
    }
    let gap = 2.0 * buffer;
    (a.euclidean_distance(b) - gap).abs() <= TOUCH_TOL * gap.max(1.0)
}
