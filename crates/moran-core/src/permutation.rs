//! Monte Carlo permutation test for Moran's I.
//!
//! Each trial shuffles a private copy of the attribute and re-evaluates the
//! kernel against the same W. Trial `t` draws from its own RNG seeded from
//! (base seed, t), so a seeded run gives identical samples whether trials run
//! one after another or on the rayon pool (`threading` feature).
//!
//! The sample is the observed I followed by the R trial values. Mean and
//! population standard deviation are taken over its finite members; the
//! expectation under spatial randomness is the closed form −1/(N−1).
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
#[cfg(feature = "threading")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::matrix::SquareMatrix;
use crate::morans::{expected_i, is_degenerate, morans_i};

pub const DEFAULT_TRIALS: usize = 999;

macro_rules! trial_iter {
    ($range:expr) => {{
        #[cfg(feature = "threading")]
        {
            use rayon::iter::IntoParallelIterator;
            IntoParallelIterator::into_par_iter($range)
        }
        #[cfg(not(feature = "threading"))]
        {
            IntoIterator::into_iter($range)
        }
    }};
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermutationConfig {
    /// Number of random permutations R.
    pub trials: usize,
    /// Base seed. `None` draws one from the thread RNG; the value used is reported.
    pub seed: Option<u64>,
    /// Abort the run once this much wall-clock time has passed.
    pub timeout_ms: Option<u64>,
}

impl Default for PermutationConfig {
    fn default() -> Self {
        Self { trials: DEFAULT_TRIALS, seed: None, timeout_ms: None }
    }
}

impl PermutationConfig {
    pub fn seeded(trials: usize, seed: u64) -> Self {
        Self { trials, seed: Some(seed), timeout_ms: None }
    }

    pub fn validate(&self) -> Result<()> {
        if self.trials < 1 {
            return Err(Error::invalid("trials", self.trials, "at least one permutation is required"));
        }
        Ok(())
    }
}

/// Shared flag for stopping a running permutation test from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PermutationResult {
    pub observed: f64,
    /// E[I] = −1/(N−1).
    pub expected: f64,
    pub mean: f64,
    pub std_dev: f64,
    /// (I − E[I]) / σ. NaN when σ is zero or undefined.
    pub z_score: f64,
    /// Smallest attainable p for R trials, 1/(R+1).
    pub p_value_nominal: f64,
    /// Two-tailed pseudo p-value from the rank of |I − E[I]| among the trials.
    pub p_value_empirical: f64,
    pub trials: usize,
    pub degenerate_trials: usize,
    /// Base seed the trial RNGs were derived from; `None` for a caller-supplied RNG.
    pub seed: Option<u64>,
    /// Observed I first, then every trial value in trial order.
    pub samples: Vec<f64>,
}

impl PermutationResult {
    /// True when more than half of the trials produced the degenerate sentinel.
    pub fn mostly_degenerate(&self) -> bool {
        self.degenerate_trials * 2 > self.trials
    }
}

/// A uniformly random rearrangement of `x`.
pub fn permute<R: Rng + ?Sized>(x: &[f64], rng: &mut R) -> Vec<f64> {
    let mut out = x.to_vec();
    out.shuffle(rng);
    out
}

fn trial_seed(base: u64, trial: usize) -> u64 {
    // splitmix64 finalizer over the trial index
    let mut z = base.wrapping_add((trial as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn check_dimensions(x: &[f64], w: &SquareMatrix) -> Result<()> {
    if x.len() != w.n {
        return Err(Error::DimensionMismatch { expected: w.n, actual: x.len() });
    }
    if x.len() < 2 {
        return Err(Error::InsufficientData { available: x.len(), required: 2 });
    }
    Ok(())
}

/// Runs the permutation test for one (x, W) pair.
pub struct PermutationTester {
    config: PermutationConfig,
}

impl PermutationTester {
    pub fn new(config: PermutationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PermutationConfig {
        &self.config
    }

    /// Seeded run; parallel when built with `threading`.
    pub fn run(&self, x: &[f64], w: &SquareMatrix, cancel: Option<&CancelFlag>) -> Result<PermutationResult> {
        self.config.validate()?;
        check_dimensions(x, w)?;

        let requested = self.config.trials;
        let base = self.config.seed.unwrap_or_else(rand::random);
        let deadline = self.config.timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms));
        let completed = AtomicUsize::new(0);
        let started = Instant::now();

        let observed = morans_i(x, w);
        let trials = trial_iter!(0..requested)
            .map(|t| {
                let stop = cancel.is_some_and(CancelFlag::is_cancelled)
                    || deadline.is_some_and(|d| Instant::now() >= d);
                if stop {
                    return Err(Error::Cancelled { completed: completed.load(Ordering::Relaxed), requested });
                }
                let mut rng = StdRng::seed_from_u64(trial_seed(base, t));
                let i = morans_i(&permute(x, &mut rng), w);
                completed.fetch_add(1, Ordering::Relaxed);
                Ok(i)
            })
            .collect::<Result<Vec<f64>>>();

        let trials = match trials {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "permutation test stopped");
                return Err(e);
            }
        };

        tracing::info!(
            trials = requested,
            seed = base,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "permutation test finished"
        );
        Ok(summarize(observed, trials, x.len(), Some(base)))
    }

    /// Serial run drawing every shuffle from a caller-supplied RNG.
    pub fn run_with_rng<R: Rng + ?Sized>(
        &self,
        x: &[f64],
        w: &SquareMatrix,
        rng: &mut R,
        cancel: Option<&CancelFlag>,
    ) -> Result<PermutationResult> {
        self.config.validate()?;
        check_dimensions(x, w)?;

        let requested = self.config.trials;
        let deadline = self.config.timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms));
        let observed = morans_i(x, w);
        let mut trials = Vec::with_capacity(requested);
        for completed in 0..requested {
            if cancel.is_some_and(CancelFlag::is_cancelled) || deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(Error::Cancelled { completed, requested });
            }
            trials.push(morans_i(&permute(x, rng), w));
        }
        Ok(summarize(observed, trials, x.len(), None))
    }
}

fn summarize(observed: f64, trials: Vec<f64>, n: usize, seed: Option<u64>) -> PermutationResult {
    let requested = trials.len();
    let degenerate_trials = trials.iter().filter(|&&v| is_degenerate(v)).count();

    let mut samples = Vec::with_capacity(requested + 1);
    samples.push(observed);
    samples.extend(trials);

    let finite: Vec<f64> = samples.iter().copied().filter(|v| !is_degenerate(*v)).collect();
    let (mean, std_dev) = if finite.is_empty() {
        (f64::NAN, f64::NAN)
    } else {
        let m = finite.iter().sum::<f64>() / finite.len() as f64;
        let var = finite.iter().map(|v| (v - m).powi(2)).sum::<f64>() / finite.len() as f64;
        (m, var.sqrt())
    };

    let expected = expected_i(n);
    let z_score = if std_dev > 0.0 { (observed - expected) / std_dev } else { f64::NAN };

    let p_value_empirical = if is_degenerate(observed) {
        f64::NAN
    } else {
        let obs_dev = (observed - expected).abs();
        let valid = samples[1..].iter().filter(|v| !is_degenerate(**v));
        let (extreme, count) = valid.fold((0usize, 0usize), |(e, c), v| {
            let hit = (v - expected).abs() >= obs_dev - 1e-12;
            (e + hit as usize, c + 1)
        });
        (extreme + 1) as f64 / (count + 1) as f64
    };

    let result = PermutationResult {
        observed,
        expected,
        mean,
        std_dev,
        z_score,
        p_value_nominal: 1.0 / (requested + 1) as f64,
        p_value_empirical,
        trials: requested,
        degenerate_trials,
        seed,
        samples,
    };
    if result.mostly_degenerate() {
        tracing::warn!(degenerate = degenerate_trials, trials = requested, "most permutation trials were degenerate");
    }
    result
}
