//! Global Moran's I.
//!
//! With deviations d_i = x_i − x̄ and row-normalized weights W:
//!
//!   I = Σ_i Σ_j W[i][j]·d_i·d_j / Σ_i d_i²
//!
//! The numerator is accumulated as Σ_i d_i·(W·d)_i so the N×N cross-product
//! table is only built when a caller asks for it. A constant attribute makes
//! the denominator vanish; the statistic is then [`DEGENERATE`] (NaN), never a
//! panic or an error.
use serde::Serialize;

use crate::error::{Error, Result};
use crate::matrix::SquareMatrix;

/// Sentinel returned when the attribute has zero variance.
pub const DEGENERATE: f64 = f64::NAN;

pub fn is_degenerate(i: f64) -> bool {
    i.is_nan()
}

/// Deviations from the mean.
pub fn deviations(x: &[f64]) -> Vec<f64> {
    if x.is_empty() {
        return Vec::new();
    }
    let mean = x.iter().sum::<f64>() / x.len() as f64;
    x.iter().map(|&v| v - mean).collect()
}

/// True when S2 is indistinguishable from the rounding left by the mean.
///
/// Each deviation of a constant vector carries at most about N·ε·max|x| of
/// error, so S2 is compared against the square of that bound.
fn has_zero_variance(x: &[f64], sum_sq_dev: f64) -> bool {
    let max_abs = x.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let tol = x.len() as f64 * f64::EPSILON * max_abs;
    sum_sq_dev == 0.0 || sum_sq_dev <= tol * tol
}

/// Moran's I of `x` under normalized weights `w`.
///
/// Pure: neither argument is modified, and identical inputs give identical output.
///
/// # Panics
///
/// If `x.len() != w.n`. Use [`try_morans_i`] for unchecked input.
pub fn morans_i(x: &[f64], w: &SquareMatrix) -> f64 {
    assert_eq!(x.len(), w.n, "attribute length must match weight matrix size");
    let d = deviations(x);
    let s2: f64 = d.iter().map(|v| v * v).sum();
    if has_zero_variance(x, s2) {
        return DEGENERATE;
    }

    let s: f64 = d
        .iter()
        .enumerate()
        .map(|(i, &di)| {
            let lag: f64 = w.row(i).iter().zip(&d).map(|(wij, dj)| wij * dj).sum();
            di * lag
        })
        .sum();

    s / s2
}

/// [`morans_i`] with the attribute length checked against W.
pub fn try_morans_i(x: &[f64], w: &SquareMatrix) -> Result<f64> {
    if x.len() != w.n {
        return Err(Error::DimensionMismatch { expected: w.n, actual: x.len() });
    }
    Ok(morans_i(x, w))
}

/// Expected value of I under complete spatial randomness, −1/(N−1).
pub fn expected_i(n: usize) -> f64 {
    -1.0 / (n as f64 - 1.0)
}

/// Deviation cross-product table P[i][j] = d_i·d_j.
pub fn deviation_products(x: &[f64]) -> SquareMatrix {
    let d = deviations(x);
    SquareMatrix::from_fn(d.len(), |i, j| d[i] * d[j])
}

/// Data behind a Moran scatterplot.
#[derive(Debug, Clone, Serialize)]
pub struct MoranScatter {
    /// Standardized attribute, (x − x̄) / σ with population σ.
    pub z: Vec<f64>,
    /// Spatial lag of z, W·z.
    pub lag: Vec<f64>,
    /// OLS slope of `lag` on `z`. NaN when undefined.
    pub slope: f64,
}

/// Standardized values against their spatial lag.
///
/// Empty vectors and a NaN slope for a constant attribute.
pub fn moran_scatter(x: &[f64], w: &SquareMatrix) -> MoranScatter {
    let d = deviations(x);
    let s2: f64 = d.iter().map(|v| v * v).sum();
    if d.is_empty() || has_zero_variance(x, s2) {
        return MoranScatter { z: Vec::new(), lag: Vec::new(), slope: f64::NAN };
    }

    let std = (s2 / d.len() as f64).sqrt();
    let z: Vec<f64> = d.iter().map(|v| v / std).collect();
    let lag: Vec<f64> = (0..w.n)
        .map(|i| w.row(i).iter().zip(&z).map(|(wij, zj)| wij * zj).sum())
        .collect();

    // z has zero mean and unit population variance, so the slope reduces to
    // Σ(z·lag − z·lag_mean) / Σz².
    let n = z.len() as f64;
    let lag_mean = lag.iter().sum::<f64>() / n;
    let sxy: f64 = z.iter().zip(&lag).map(|(a, b)| a * (b - lag_mean)).sum();
    let sxx: f64 = z.iter().map(|a| a * a).sum();
    let slope = if sxx < 1e-12 { f64::NAN } else { sxy / sxx };

    MoranScatter { z, lag, slope }
}
