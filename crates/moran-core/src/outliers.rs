//! IQR outlier screening for the selected attribute.
//!
//! Quartiles use linear interpolation between order statistics at position
//! q·(N−1). A value is flagged when it lies below Q1 − 1.5·IQR or above
//! Q3 + 1.5·IQR. Constant data (IQR = 0) flags nothing.
use serde::Serialize;

use crate::error::{Error, Result};
use crate::geometry::PolygonSet;

/// Fence multiplier applied to the interquartile range.
pub const IQR_FENCE: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierReport {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower_fence: f64,
    pub upper_fence: f64,
    /// Flagged features as (index, value), in index order.
    pub outliers: Vec<(usize, f64)>,
}

impl OutlierReport {
    pub fn count(&self) -> usize {
        self.outliers.len()
    }

    pub fn indices(&self) -> Vec<usize> {
        self.outliers.iter().map(|&(i, _)| i).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.outliers.iter().map(|&(_, v)| v).collect()
    }
}

/// Percentile `q` ∈ [0, 1] of already-sorted data, linear interpolation.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let t = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * t
}

/// Screen `values` for IQR outliers.
pub fn detect_outliers(values: &[f64]) -> OutlierReport {
    if values.is_empty() {
        return OutlierReport {
            q1: f64::NAN,
            q3: f64::NAN,
            iqr: 0.0,
            lower_fence: f64::NAN,
            upper_fence: f64::NAN,
            outliers: Vec::new(),
        };
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q1 = quantile_sorted(&sorted, 0.25);
    let q3 = quantile_sorted(&sorted, 0.75);
    let iqr = q3 - q1;
    let lower_fence = q1 - IQR_FENCE * iqr;
    let upper_fence = q3 + IQR_FENCE * iqr;

    let outliers = if iqr > 0.0 {
        values
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v < lower_fence || v > upper_fence)
            .map(|(i, &v)| (i, v))
            .collect()
    } else {
        Vec::new()
    };

    OutlierReport { q1, q3, iqr, lower_fence, upper_fence, outliers }
}

/// Drop the flagged features, returning a rebuilt set.
///
/// Callers decide whether to apply this; detection alone never mutates anything.
/// The report must come from `set.values()`; an index past the end is rejected.
pub fn remove_outliers(set: &PolygonSet, report: &OutlierReport) -> Result<PolygonSet> {
    if report.outliers.is_empty() {
        return Ok(set.clone());
    }
    if let Some(&(index, _)) = report.outliers.iter().find(|&&(i, _)| i >= set.len()) {
        return Err(Error::invalid(
            "outlier index",
            index,
            format!("report does not match a set of {} features", set.len()),
        ));
    }
    tracing::info!(
        removed = report.count(),
        remaining = set.len().saturating_sub(report.count()),
        "removing outliers"
    );
    set.without(&report.indices())
}
