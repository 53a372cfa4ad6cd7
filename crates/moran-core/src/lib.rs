//! Global Moran's I for polygon features with permutation inference.
//!
//! ```ignore
//! let set = PolygonSet::new(polygons, values)?;
//! let result = analyze(&set, &AnalysisConfig::default())?;
//! ```
pub mod analysis;
pub mod error;
pub mod geometry;
pub mod matrix;
pub mod morans;
pub mod outliers;
pub mod permutation;
pub mod weights;

pub use analysis::{analyze, analyze_with_cancel, AnalysisConfig, MoransIResult, Warning};
pub use error::{Error, Result};
pub use geometry::PolygonSet;
pub use matrix::SquareMatrix;
pub use morans::{expected_i, is_degenerate, moran_scatter, morans_i, try_morans_i, MoranScatter};
pub use outliers::{detect_outliers, remove_outliers, OutlierReport};
pub use permutation::{CancelFlag, PermutationConfig, PermutationResult, PermutationTester};
pub use weights::{build_weights, AdjacencyRule, WeightMatrix, WeightingMode};
