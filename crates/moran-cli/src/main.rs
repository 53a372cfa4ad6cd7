//! Command-line front end: load features, pick one attribute, run Moran's I.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use geo::{LineString, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use moran_core::{
    analyze, detect_outliers, remove_outliers, AdjacencyRule, AnalysisConfig, PolygonSet, WeightingMode,
};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "moran", about = "Global Moran's I with permutation inference for polygon features")]
struct Args {
    /// Feature collection JSON: {"features": [{"polygon": [[x, y], ...], "properties": {...}}]}.
    #[arg(short, long)]
    input: PathBuf,

    /// Numeric property to analyze.
    #[arg(short, long)]
    attribute: String,

    /// AnalysisConfig JSON; flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,

    /// Neighbor count k.
    #[arg(short, long)]
    k: Option<usize>,

    #[arg(long, value_enum)]
    rule: Option<RuleArg>,

    /// Contiguity buffer distance.
    #[arg(long)]
    buffer: Option<f64>,

    /// Inverse-distance power.
    #[arg(long)]
    power: Option<f64>,

    /// Discard candidate neighbors beyond this centroid distance.
    #[arg(long)]
    radius: Option<f64>,

    /// Number of permutations.
    #[arg(short, long)]
    permutations: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Drop IQR outliers before building weights.
    #[arg(long)]
    remove_outliers: bool,

    /// Write the result JSON here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Contiguity,
    DistanceBand,
    InverseDistance,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RuleArg {
    Rook,
    Queen,
}

impl From<RuleArg> for AdjacencyRule {
    fn from(r: RuleArg) -> Self {
        match r {
            RuleArg::Rook => AdjacencyRule::Rook,
            RuleArg::Queen => AdjacencyRule::Queen,
        }
    }
}

// ── Input ─────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    /// Exterior ring; closed automatically if the last point differs from the first.
    polygon: Vec<[f64; 2]>,
    #[serde(default)]
    properties: Map<String, Value>,
}

fn load_features(path: &Path, attribute: &str) -> Result<PolygonSet> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let fc: FeatureCollection =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;

    let mut polygons = Vec::with_capacity(fc.features.len());
    let mut values = Vec::with_capacity(fc.features.len());
    for (i, f) in fc.features.into_iter().enumerate() {
        let value = match f.properties.get(attribute) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(_) => bail!("feature {i}: property '{attribute}' is not numeric"),
            None => bail!("feature {i}: missing property '{attribute}'"),
        };
        values.push(value.with_context(|| format!("feature {i}: '{attribute}' out of range"))?);
        let ring: Vec<(f64, f64)> = f.polygon.iter().map(|&[x, y]| (x, y)).collect();
        polygons.push(Polygon::new(LineString::from(ring), vec![]));
    }

    PolygonSet::new(polygons, values).context("building polygon set")
}

// ── Configuration ─────────────────────────────────────────────────────────────

fn load_config(args: &Args) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => AnalysisConfig::default(),
    };

    config.weighting = resolve_weighting(args, config.weighting);
    if let Some(trials) = args.permutations {
        config.permutations.trials = trials;
    }
    if args.seed.is_some() {
        config.permutations.seed = args.seed;
    }
    if args.timeout_ms.is_some() {
        config.permutations.timeout_ms = args.timeout_ms;
    }
    Ok(config)
}

/// Apply flag overrides. An explicit `--mode` starts from that mode's defaults.
fn resolve_weighting(args: &Args, base: WeightingMode) -> WeightingMode {
    let base = match args.mode {
        None => base,
        Some(ModeArg::Contiguity) => WeightingMode::Contiguity { rule: AdjacencyRule::Rook, k: 1, buffer: 0.0 },
        Some(ModeArg::DistanceBand) => WeightingMode::DistanceBand { k: 1, radius: None },
        Some(ModeArg::InverseDistance) => WeightingMode::InverseDistance { k: 1, power: 1.0, radius: None },
    };
    match base {
        WeightingMode::Contiguity { rule, k, buffer } => WeightingMode::Contiguity {
            rule: args.rule.map_or(rule, AdjacencyRule::from),
            k: args.k.unwrap_or(k),
            buffer: args.buffer.unwrap_or(buffer),
        },
        WeightingMode::DistanceBand { k, radius } => WeightingMode::DistanceBand {
            k: args.k.unwrap_or(k),
            radius: args.radius.or(radius),
        },
        WeightingMode::InverseDistance { k, power, radius } => WeightingMode::InverseDistance {
            k: args.k.unwrap_or(k),
            power: args.power.unwrap_or(power),
            radius: args.radius.or(radius),
        },
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber")
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose)?;

    let config = load_config(&args)?;
    let mut set = load_features(&args.input, &args.attribute)?;
    info!(features = set.len(), attribute = %args.attribute, "loaded {}", args.input.display());
    if let Some((lo, hi)) = set.distance_range() {
        info!(min = lo, max = hi, "centroid distance range");
    }

    let report = detect_outliers(set.values());
    if report.count() > 0 {
        warn!(count = report.count(), lower = report.lower_fence, upper = report.upper_fence, "outliers detected");
        if args.remove_outliers {
            set = remove_outliers(&set, &report)?;
        }
    } else {
        info!("no outliers detected");
    }

    let start = Instant::now();
    let result = analyze(&set, &config)?;
    info!(
        i = result.i,
        expected = result.expected_i,
        z = result.z_score,
        p = result.p_value_empirical,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "analysis complete"
    );
    for w in &result.warnings {
        warn!(?w, "result warning");
    }

    let json = serde_json::to_string_pretty(&result)?;
    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!("wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_flag_replaces_config_mode() {
        let args = Args::parse_from(["moran", "-i", "x.json", "-a", "v", "--mode", "inverse-distance", "-k", "3", "--power", "2"]);
        let mode = resolve_weighting(&args, WeightingMode::default());
        assert_eq!(mode, WeightingMode::InverseDistance { k: 3, power: 2.0, radius: None });
    }

    #[test]
    fn flags_patch_config_mode() {
        let args = Args::parse_from(["moran", "-i", "x.json", "-a", "v", "--rule", "queen", "--buffer", "5"]);
        let base = WeightingMode::Contiguity { rule: AdjacencyRule::Rook, k: 4, buffer: 0.0 };
        let mode = resolve_weighting(&args, base);
        assert_eq!(mode, WeightingMode::Contiguity { rule: AdjacencyRule::Queen, k: 4, buffer: 5.0 });
    }
}
