//! Pipeline orchestrator: polygon set → weights → Moran's I → permutation test.
//!
//! Every stage takes values and returns new ones; nothing is carried between
//! runs. Configuration is validated against the feature count before any
//! matrix is built.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::PolygonSet;
use crate::matrix::SquareMatrix;
use crate::morans::{deviation_products, expected_i, is_degenerate, moran_scatter, morans_i, MoranScatter, DEGENERATE};
use crate::permutation::{CancelFlag, PermutationConfig, PermutationTester};
use crate::weights::{build_weights, WeightingMode};

// ── Configuration ─────────────────────────────────────────────────────────────

/// Everything a run needs besides the data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub weighting: WeightingMode,
    pub permutations: PermutationConfig,
}

// ── Results ───────────────────────────────────────────────────────────────────

/// Conditions worth reporting that do not stop a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// The attribute is constant; I and every derived statistic are NaN.
    DegenerateAttribute,
    /// More than half of the permutation trials were degenerate.
    MostTrialsDegenerate { degenerate: usize, trials: usize },
    /// Some features have no neighbor; their W rows are all zero.
    Islands { count: usize },
    /// The distance radius is below the smallest centroid distance, so no
    /// feature has a neighbor.
    RadiusBelowMinDistance { radius: f64, min_distance: f64 },
}

/// Scalars and tables for one completed analysis.
#[derive(Debug, Clone, Serialize)]
pub struct MoransIResult {
    pub n: usize,
    pub weighting: WeightingMode,
    /// Observed Moran's I; NaN for a constant attribute.
    pub i: f64,
    /// −1/(N−1).
    pub expected_i: f64,
    pub permutation_mean: f64,
    pub permutation_std: f64,
    pub z_score: f64,
    /// 1/(R+1); 0.001 at the default 999 trials.
    pub p_value: f64,
    pub p_value_empirical: f64,
    pub permutations: usize,
    pub seed: Option<u64>,
    /// Observed I followed by each trial value.
    pub permutation_samples: Vec<f64>,
    pub warnings: Vec<Warning>,
    pub scatter: MoranScatter,
    /// C
    pub raw_weights: SquareMatrix,
    /// W
    pub normalized_weights: SquareMatrix,
    /// P[i][j] = d_i·d_j
    pub deviation_products: SquareMatrix,
}

impl MoransIResult {
    pub fn is_degenerate(&self) -> bool {
        is_degenerate(self.i)
    }
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

/// Run the full pipeline on `set`.
pub fn analyze(set: &PolygonSet, config: &AnalysisConfig) -> Result<MoransIResult> {
    analyze_with_cancel(set, config, None)
}

/// Run the full pipeline, checking `cancel` between permutation trials.
///
/// Order:
///   1. Validate configuration against N
///   2. Weight matrices C and W
///   3. Observed I and cross-product table P
///   4. Permutation test (skipped for a constant attribute)
pub fn analyze_with_cancel(
    set: &PolygonSet,
    config: &AnalysisConfig,
    cancel: Option<&CancelFlag>,
) -> Result<MoransIResult> {
    let n = set.len();

    // ── 1. Validation ───────────────────────────────────────────────────────
    config.weighting.validate(n)?;
    config.permutations.validate()?;

    // ── 2. Weights ──────────────────────────────────────────────────────────
    let weights = build_weights(set, &config.weighting)?;
    let mut warnings = Vec::new();
    if let (Some(radius), Some((min_distance, _))) = (config.weighting.radius(), set.distance_range()) {
        if radius < min_distance {
            tracing::warn!(radius, min_distance, "radius excludes every neighbor");
            warnings.push(Warning::RadiusBelowMinDistance { radius, min_distance });
        }
    }
    let islands = weights.islands();
    if !islands.is_empty() {
        tracing::warn!(count = islands.len(), "features without neighbors");
        warnings.push(Warning::Islands { count: islands.len() });
    }

    // ── 3. Observed statistic ───────────────────────────────────────────────
    let x = set.values();
    let i = morans_i(x, &weights.normalized);
    let products = deviation_products(x);
    let scatter = moran_scatter(x, &weights.normalized);
    tracing::info!(n, i, "observed Moran's I");

    // ── 4. Inference ────────────────────────────────────────────────────────
    if is_degenerate(i) {
        tracing::warn!("attribute is constant; skipping permutation test");
        warnings.insert(0, Warning::DegenerateAttribute);
        return Ok(MoransIResult {
            n,
            weighting: config.weighting.clone(),
            i: DEGENERATE,
            expected_i: expected_i(n),
            permutation_mean: f64::NAN,
            permutation_std: f64::NAN,
            z_score: f64::NAN,
            p_value: f64::NAN,
            p_value_empirical: f64::NAN,
            permutations: 0,
            seed: config.permutations.seed,
            permutation_samples: vec![DEGENERATE],
            warnings,
            scatter,
            raw_weights: weights.raw,
            normalized_weights: weights.normalized,
            deviation_products: products,
        });
    }

    let perm = PermutationTester::new(config.permutations.clone()).run(x, &weights.normalized, cancel)?;
    if perm.mostly_degenerate() {
        warnings.push(Warning::MostTrialsDegenerate { degenerate: perm.degenerate_trials, trials: perm.trials });
    }

    Ok(MoransIResult {
        n,
        weighting: config.weighting.clone(),
        i,
        expected_i: perm.expected,
        permutation_mean: perm.mean,
        permutation_std: perm.std_dev,
        z_score: perm.z_score,
        p_value: perm.p_value_nominal,
        p_value_empirical: perm.p_value_empirical,
        permutations: perm.trials,
        seed: perm.seed,
        permutation_samples: perm.samples,
        warnings,
        scatter,
        raw_weights: weights.raw,
        normalized_weights: weights.normalized,
        deviation_products: products,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::geometry::tests::row_of_squares;

    fn config(weighting: WeightingMode, trials: usize) -> AnalysisConfig {
        AnalysisConfig { weighting, permutations: PermutationConfig::seeded(trials, 2024) }
    }

    #[test]
    fn colinear_scenario() {
        let set = PolygonSet::new(row_of_squares(4), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let r = analyze(&set, &config(WeightingMode::DistanceBand { k: 1, radius: None }, 99)).unwrap();
        for s in r.normalized_weights.row_sums() {
            assert!((s - 1.0).abs() < 1e-12);
        }
        assert!(r.i > 0.0);
        assert!((r.i - 0.4).abs() < 1e-12);
        assert_eq!(r.expected_i, -1.0 / 3.0);
        assert_eq!(r.permutation_samples.len(), 100);
        assert!((r.p_value - 0.01).abs() < 1e-15);
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn constant_attribute_yields_sentinel() {
        let set = PolygonSet::new(row_of_squares(4), vec![5.0; 4]).unwrap();
        let r = analyze(&set, &config(WeightingMode::DistanceBand { k: 2, radius: None }, 99)).unwrap();
        assert!(r.is_degenerate());
        assert!(r.z_score.is_nan());
        assert_eq!(r.warnings, vec![Warning::DegenerateAttribute]);
        assert_eq!(r.deviation_products.data, vec![0.0; 16]);
    }

    #[test]
    fn configuration_errors_fail_fast() {
        let set = PolygonSet::new(row_of_squares(3), vec![1.0, 2.0, 3.0]).unwrap();
        let err = analyze(&set, &config(WeightingMode::DistanceBand { k: 3, radius: None }, 9)).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "k", .. }));
        let err = analyze(&set, &config(WeightingMode::DistanceBand { k: 1, radius: None }, 0)).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "trials", .. }));
    }

    #[test]
    fn islands_are_flagged() {
        let set = PolygonSet::new(row_of_squares(4), vec![1.0, 3.0, 2.0, 4.0]).unwrap();
        let r = analyze(&set, &config(WeightingMode::DistanceBand { k: 1, radius: Some(0.5) }, 9)).unwrap();
        assert_eq!(
            r.warnings,
            vec![Warning::RadiusBelowMinDistance { radius: 0.5, min_distance: 1.0 }, Warning::Islands { count: 4 }]
        );
        assert_eq!(r.i, 0.0);
    }

    #[test]
    fn radius_covering_nearest_neighbor_is_not_flagged() {
        let set = PolygonSet::new(row_of_squares(4), vec![1.0, 3.0, 2.0, 4.0]).unwrap();
        let r = analyze(&set, &config(WeightingMode::InverseDistance { k: 2, power: 1.0, radius: Some(1.0) }, 9)).unwrap();
        assert!(r.warnings.is_empty(), "{:?}", r.warnings);
    }

    #[test]
    fn config_defaults_from_empty_json() {
        let cfg: AnalysisConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, AnalysisConfig::default());
        assert_eq!(cfg.permutations.trials, 999);
    }
}
