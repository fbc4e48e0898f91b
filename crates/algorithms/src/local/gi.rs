//! Getis-Ord Gi* hot spot statistic
//!
//! Streams neighbor rows out of a weights source, appends each entity to
//! its own neighborhood with a self potential weight, and produces a
//! z-score and p-value per entity. An optional permutation stage replaces
//! the analytic p-value with a pseudo p-value built from resampled
//! spatial lags.

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use lisa_core::{EntityId, Error, Result, ValueVector};

use crate::bins::{fdr_bins, p_value_bins};
use crate::local::{check_coverage, resample_indices, restrict_row, ResampleMode, WeightsSource};
use crate::neighbors::{NeighborDiagnostics, NeighborInfo, DEFAULT_WARN_NEIGHBORS};
use crate::stats::{pseudo_p_value, z_prob, Tail};

/// Minimum observations for the variance terms to be defined.
const MIN_NUM_OBS: usize = 3;

/// Tuning knobs for a Gi* run.
#[derive(Debug, Clone)]
pub struct GiParams {
    /// Number of resampling draws; `None` keeps the analytic p-value.
    pub permutations: Option<usize>,
    /// Whether draws go with or without replacement.
    pub resample: ResampleMode,
    /// Seed for reproducible draws; `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Classify bins with the false discovery rate correction.
    pub apply_fdr: bool,
    /// Per-entity self weight in positional order; defaults to 1 each.
    /// Negative entries are clamped to zero.
    pub self_potential: Option<Vec<f64>>,
    /// Neighbor count past which a warning is emitted.
    pub warn_neighbors: usize,
    /// Hard cap on neighbors per entity; rows are truncated past it.
    pub max_neighbors: Option<usize>,
}

impl Default for GiParams {
    fn default() -> Self {
        Self {
            permutations: None,
            resample: ResampleMode::Permutation,
            seed: None,
            apply_fdr: false,
            self_potential: None,
            warn_neighbors: DEFAULT_WARN_NEIGHBORS,
            max_neighbors: None,
        }
    }
}

/// Per-entity Gi* output, positionally aligned with the input vector.
#[derive(Debug, Clone)]
pub struct GiResult {
    pub ids: Vec<EntityId>,
    /// Gi* z-scores; NaN for entities with no neighbors.
    pub z_scores: Array1<f64>,
    /// Two-tailed analytic p-values; NaN where the z-score is NaN.
    pub p_values: Array1<f64>,
    /// Permutation pseudo p-values when resampling was requested.
    pub pseudo_p: Option<Array1<f64>>,
    /// Confidence bins in {-3..3}; sign follows the z-score.
    pub bins: Vec<i8>,
    pub diagnostics: NeighborDiagnostics,
}

impl GiResult {
    /// The p-value column the bins were classified on.
    pub fn classified_p(&self) -> &Array1<f64> {
        self.pseudo_p.as_ref().unwrap_or(&self.p_values)
    }
}

/// Run Gi* for every entity in `values` against the given weights.
///
/// Fails up front when the store cannot cover the analysis set, when the
/// attribute is constant, or when fewer than three observations exist.
/// Entities with no surviving neighbors get NaN sentinels; if every
/// entity is isolated the run fails with `Error::AllIsolated`.
pub fn local_g(
    values: &ValueVector,
    source: &mut dyn WeightsSource,
    params: &GiParams,
) -> Result<GiResult> {
    let n = values.len();
    if n < MIN_NUM_OBS {
        return Err(Error::InvalidParameter {
            name: "values",
            value: n.to_string(),
            reason: format!("at least {MIN_NUM_OBS} observations are required"),
        });
    }
    // NaN variance (e.g. a NaN attribute value) is degenerate too.
    if !(values.variance() > 0.0) {
        return Err(Error::DegenerateVariance);
    }
    check_coverage(values, source)?;

    let self_weights = resolve_self_potential(params.self_potential.as_deref(), n)?;

    let y = values.values();
    let n_f = n as f64;
    let y_mean = values.mean();
    let y2_mean = y.iter().map(|v| v * v).sum::<f64>() / n_f;
    // Population standard deviation of the attribute.
    let s = (y2_mean - y_mean * y_mean).sqrt();

    let mut z_scores = vec![f64::NAN; n];
    let mut pseudo = params.permutations.map(|_| vec![f64::NAN; n]);
    let mut seen = vec![false; n];

    let mut info = NeighborInfo::new(params.warn_neighbors, params.max_neighbors);
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let row_standard = source.row_standard();
    while let Some(row) = source.next_row()? {
        let Some(pos) = values.order_of(row.id) else {
            // The store may cover a superset of the analysis.
            continue;
        };
        seen[pos] = true;

        let restricted = restrict_row(&row, values, row_standard);
        let mut neighbor_ids: Vec<EntityId> =
            restricted.positions.iter().map(|p| values.id(*p)).collect();
        let mut neighbor_values: Vec<f64> =
            restricted.positions.iter().map(|p| values.value(*p)).collect();
        let mut weights = restricted.weights;
        let mut positions = restricted.positions;

        let nn = info.process_info(row.id, &mut neighbor_ids, &mut neighbor_values, &mut weights);
        if nn == 0 {
            continue;
        }
        positions.truncate(nn);

        // The entity belongs to its own Gi* neighborhood.
        weights.push(self_weights[pos]);
        positions.push(pos);
        if row_standard {
            let total: f64 = weights.iter().sum();
            if total > 0.0 {
                for w in &mut weights {
                    *w /= total;
                }
            }
        }

        let sum_w: f64 = weights.iter().sum();
        let sum_w2: f64 = weights.iter().map(|w| w * w).sum();
        let lag: f64 = positions
            .iter()
            .zip(&weights)
            .map(|(p, w)| values.value(*p) * w)
            .sum();

        let ei = sum_w * y_mean;
        let denom = s * ((n_f * sum_w2 - sum_w * sum_w) / (n_f - 1.0)).sqrt();
        if denom > 0.0 {
            z_scores[pos] = (lag - ei) / denom;
        }

        if let (Some(perms), Some(pseudo)) = (params.permutations, pseudo.as_mut()) {
            // The permuted statistic is monotone in the spatial lag, so
            // draws compare lags directly. Every slot in the row is
            // redrawn from the full value vector, the appended self
            // weight included.
            let draws =
                resample_indices(&mut rng, params.resample, n, positions.len(), perms)?;
            let perm_lags: Vec<f64> = draws
                .par_iter()
                .map(|draw| {
                    draw.iter()
                        .zip(&weights)
                        .map(|(idx, w)| y[*idx] * w)
                        .sum()
                })
                .collect();
            pseudo[pos] = pseudo_p_value(lag, &perm_lags);
        }
    }

    if let Some(pos) = seen.iter().position(|s| !s) {
        return Err(Error::CorruptStore(format!(
            "entity {} never appeared in the weights store",
            values.id(pos)
        )));
    }

    info.report_no_neighbors(true)?;
    info.report_warnings();
    info.report_maximums();
    let diagnostics = info.summary();

    let p_values: Vec<f64> = z_scores
        .iter()
        .map(|z| if z.is_nan() { f64::NAN } else { z_prob(*z, Tail::Both) })
        .collect();

    let classify_p = pseudo.as_deref().unwrap_or(&p_values);
    let bins = if params.apply_fdr {
        fdr_bins(&z_scores, classify_p)
    } else {
        p_value_bins(&z_scores, classify_p)
    };

    Ok(GiResult {
        ids: values.ids().to_vec(),
        z_scores: Array1::from_vec(z_scores),
        p_values: Array1::from_vec(p_values),
        pseudo_p: pseudo.map(Array1::from_vec),
        bins,
        diagnostics,
    })
}

/// Expand and sanitize the self potential column.
fn resolve_self_potential(potential: Option<&[f64]>, n: usize) -> Result<Vec<f64>> {
    let Some(potential) = potential else {
        return Ok(vec![1.0; n]);
    };
    if potential.len() != n {
        return Err(Error::InvalidParameter {
            name: "self_potential",
            value: potential.len().to_string(),
            reason: format!("must supply one weight per observation ({n})"),
        });
    }
    let mut clamped = false;
    let resolved: Vec<f64> = potential
        .iter()
        .map(|w| {
            if *w < 0.0 {
                clamped = true;
                0.0
            } else {
                *w
            }
        })
        .collect();
    if clamped {
        tracing::warn!("negative self potential weights were clamped to zero");
    }
    Ok(resolved)
}
