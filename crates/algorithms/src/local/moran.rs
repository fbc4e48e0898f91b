//! Anselin local Moran's I cluster and outlier statistic
//!
//! Works on attribute deviations from the mean: a positive statistic
//! marks an entity whose neighborhood resembles it (a cluster), a
//! negative one marks an entity unlike its neighbors (an outlier).
//! Significant entities are labeled HH/LL (clusters) or HL/LH
//! (outliers) from the signs of the entity deviation and the z-score.

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use lisa_core::{EntityId, Error, Result, ValueVector};

use crate::bins::{fdr_bins, p_value_bins};
use crate::local::{check_coverage, resample_indices, restrict_row, ResampleMode, WeightsSource};
use crate::neighbors::{NeighborDiagnostics, NeighborInfo, DEFAULT_WARN_NEIGHBORS};
use crate::stats::{pseudo_p_value, z_prob, Tail};

const MIN_NUM_OBS: usize = 3;

/// Cluster/outlier class of one significant entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterLabel {
    /// High value surrounded by high values.
    HighHigh,
    /// Low value surrounded by low values.
    LowLow,
    /// High outlier among low values.
    HighLow,
    /// Low outlier among high values.
    LowHigh,
    NotSignificant,
}

impl ClusterLabel {
    /// Short code as conventionally reported (`HH`, `LL`, `HL`, `LH`).
    pub fn code(self) -> &'static str {
        match self {
            ClusterLabel::HighHigh => "HH",
            ClusterLabel::LowLow => "LL",
            ClusterLabel::HighLow => "HL",
            ClusterLabel::LowHigh => "LH",
            ClusterLabel::NotSignificant => "",
        }
    }
}

/// Tuning knobs for a local Moran run.
#[derive(Debug, Clone)]
pub struct LocalMoranParams {
    /// Number of resampling draws; `None` keeps the analytic p-value.
    pub permutations: Option<usize>,
    pub resample: ResampleMode,
    pub seed: Option<u64>,
    /// Classify significance with the false discovery rate correction.
    pub apply_fdr: bool,
    pub warn_neighbors: usize,
    pub max_neighbors: Option<usize>,
}

impl Default for LocalMoranParams {
    fn default() -> Self {
        Self {
            permutations: None,
            resample: ResampleMode::Permutation,
            seed: None,
            apply_fdr: false,
            warn_neighbors: DEFAULT_WARN_NEIGHBORS,
            max_neighbors: None,
        }
    }
}

/// Per-entity local Moran output, positionally aligned with the input.
#[derive(Debug, Clone)]
pub struct LocalMoranResult {
    pub ids: Vec<EntityId>,
    /// Local Moran's I values; NaN for entities with no neighbors.
    pub moran_i: Array1<f64>,
    /// Expected values under the randomization null.
    pub expected: Array1<f64>,
    /// Randomization variances.
    pub variances: Array1<f64>,
    pub z_scores: Array1<f64>,
    /// Two-tailed analytic p-values.
    pub p_values: Array1<f64>,
    /// Permutation pseudo p-values when resampling was requested.
    pub pseudo_p: Option<Array1<f64>>,
    /// Confidence bins in {-3..3}; sign follows the z-score.
    pub bins: Vec<i8>,
    /// Cluster/outlier label per entity.
    pub labels: Vec<ClusterLabel>,
    pub diagnostics: NeighborDiagnostics,
}

/// Run local Moran's I for every entity in `values` against the weights.
///
/// The preconditions match Gi*: the store must cover the analysis set,
/// the attribute must vary, and at least three observations are needed
/// for the randomization variance. Isolated entities get NaN sentinels
/// and the `NotSignificant` label.
pub fn local_moran(
    values: &ValueVector,
    source: &mut dyn WeightsSource,
    params: &LocalMoranParams,
) -> Result<LocalMoranResult> {
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

    let n_f = n as f64;
    let nm1 = n_f - 1.0;
    let nm2 = n_f - 2.0;
    let y_mean = values.mean();
    let y_dev: Vec<f64> = values.values().iter().map(|v| v - y_mean).collect();
    // Sample-normalized squared deviation, the m2 moment of the statistic.
    let dev2_norm_sum = y_dev.iter().map(|d| d * d).sum::<f64>() / nm1;
    let dev4_norm_sum = y_dev.iter().map(|d| d.powi(4)).sum::<f64>() / nm1;
    let b2i = dev4_norm_sum / (dev2_norm_sum * dev2_norm_sum);

    let mut moran_i = vec![f64::NAN; n];
    let mut expected = vec![f64::NAN; n];
    let mut variances = vec![f64::NAN; n];
    let mut z_scores = vec![f64::NAN; n];
    let mut lags = vec![f64::NAN; n];
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
            continue;
        };
        seen[pos] = true;

        let restricted = restrict_row(&row, values, row_standard);
        let mut neighbor_ids: Vec<EntityId> =
            restricted.positions.iter().map(|p| values.id(*p)).collect();
        let mut neighbor_values: Vec<f64> =
            restricted.positions.iter().map(|p| y_dev[*p]).collect();
        let mut weights = restricted.weights;
        let mut positions = restricted.positions;

        let nn = info.process_info(row.id, &mut neighbor_ids, &mut neighbor_values, &mut weights);
        if nn == 0 {
            continue;
        }
        positions.truncate(nn);

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
        let lag: f64 = neighbor_values.iter().zip(&weights).map(|(d, w)| d * w).sum();

        let yi_dev = y_dev[pos];
        let li = (yi_dev / dev2_norm_sum) * lag;
        let ei = -sum_w / nm1;
        let v1 = (sum_w2 * (n_f - b2i)) / nm1;
        let v2 = (sum_w * sum_w) / (nm1 * nm1);
        let v3 = (sum_w * sum_w - sum_w2) * (2.0 * b2i - n_f);
        let vi = v1 + v3 / (nm1 * nm2) - v2;

        moran_i[pos] = li;
        lags[pos] = lag;
        expected[pos] = ei;
        variances[pos] = vi;
        if vi > 0.0 {
            z_scores[pos] = (li - ei) / vi.sqrt();
        }

        if let (Some(perms), Some(pseudo)) = (params.permutations, pseudo.as_mut()) {
            // The sign of yi_dev flips the statistic, so draws compare
            // full permuted statistics rather than bare lags.
            let scale = yi_dev / dev2_norm_sum;
            let draws = resample_indices(&mut rng, params.resample, n, nn, perms)?;
            let perm_stats: Vec<f64> = draws
                .par_iter()
                .map(|draw| {
                    let perm_lag: f64 = draw
                        .iter()
                        .zip(&weights)
                        .map(|(idx, w)| y_dev[*idx] * w)
                        .sum();
                    scale * perm_lag
                })
                .collect();
            pseudo[pos] = pseudo_p_value(li, &perm_stats);
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

    let labels: Vec<ClusterLabel> = (0..n)
        .map(|pos| {
            let significant = if params.apply_fdr {
                bins[pos].abs() >= 2
            } else {
                classify_p[pos] <= 0.05
            };
            if !significant || z_scores[pos].is_nan() {
                return ClusterLabel::NotSignificant;
            }
            // Clusters split on the neighborhood's side of the mean,
            // outliers on the entity's own side against a low lag.
            let lag_high = lags[pos] >= 0.0;
            let yi_high = y_dev[pos] >= 0.0;
            if z_scores[pos] > 0.0 {
                if lag_high {
                    ClusterLabel::HighHigh
                } else {
                    ClusterLabel::LowLow
                }
            } else if yi_high && !lag_high {
                ClusterLabel::HighLow
            } else {
                ClusterLabel::LowHigh
            }
        })
        .collect();

    Ok(LocalMoranResult {
        ids: values.ids().to_vec(),
        moran_i: Array1::from_vec(moran_i),
        expected: Array1::from_vec(expected),
        variances: Array1::from_vec(variances),
        z_scores: Array1::from_vec(z_scores),
        p_values: Array1::from_vec(p_values),
        pseudo_p: pseudo.map(Array1::from_vec),
        bins,
        labels,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neighbors::{DistanceBand, DistanceWeight, Site};
    use approx::assert_relative_eq;

    /// Two separated strips of high and low values plus one low entity
    /// embedded in the high strip.
    fn two_regimes() -> (ValueVector, DistanceBand) {
        let mut pairs = Vec::new();
        let mut sites = Vec::new();
        for i in 0..6 {
            let id = i + 1;
            pairs.push((id, 10.0 + (i % 3) as f64 * 0.1));
            sites.push(Site::new(id, i as f64, 0.0));
        }
        for i in 0..6 {
            let id = i + 7;
            pairs.push((id, 1.0 + (i % 3) as f64 * 0.1));
            sites.push(Site::new(id, i as f64, 30.0));
        }
        // Low outlier inside the high strip.
        pairs.push((13, 1.0));
        sites.push(Site::new(13, 2.5, 0.5));
        let values = ValueVector::from_pairs(pairs).unwrap();
        let band = DistanceBand::new(sites, 1.5, DistanceWeight::Binary, false).unwrap();
        (values, band)
    }

    #[test]
    fn test_cluster_and_outlier_signs() {
        let (values, mut band) = two_regimes();
        let result = local_moran(&values, &mut band, &LocalMoranParams::default()).unwrap();
        // Interior members of each strip cohere with their neighbors.
        assert!(result.z_scores[1] > 0.0);
        assert!(result.z_scores[8] > 0.0);
        // The embedded low value disagrees with its high neighbors.
        let outlier = values.order_of(13).unwrap();
        assert!(result.z_scores[outlier] < 0.0);
        assert!(result.moran_i[outlier] < 0.0);
    }

    #[test]
    fn test_outlier_labeled_low_high() {
        let (values, mut band) = two_regimes();
        let result = local_moran(&values, &mut band, &LocalMoranParams::default()).unwrap();
        let outlier = values.order_of(13).unwrap();
        if result.p_values[outlier] <= 0.05 {
            assert_eq!(result.labels[outlier], ClusterLabel::LowHigh);
        }
        // High-strip interior entities are HH whenever significant.
        for pos in 0..6 {
            if result.labels[pos] != ClusterLabel::NotSignificant {
                assert_eq!(result.labels[pos], ClusterLabel::HighHigh);
            }
        }
    }

    #[test]
    fn test_cluster_side_follows_the_lag() {
        // Entity 2 sits a hair below the mean between one extreme high
        // neighbor and one background neighbor, so its own deviation
        // says "low" while its neighborhood says "high". The cluster
        // side comes from the lag: the label must be HighHigh.
        let mut pairs = vec![(1, 30.0), (2, 10.1), (3, 10.0)];
        let mut sites = vec![
            Site::new(1, 0.0, 0.0),
            Site::new(2, 1.0, 0.0),
            Site::new(3, 2.0, 0.0),
        ];
        for i in 0..197 {
            let id = 4 + i as EntityId;
            pairs.push((id, 10.0));
            sites.push(Site::new(id, 10.0 + 3.0 * i as f64, 0.0));
        }
        let values = ValueVector::from_pairs(pairs).unwrap();
        let mut band = DistanceBand::new(sites, 1.0, DistanceWeight::Binary, false).unwrap();
        let params = LocalMoranParams {
            permutations: Some(999),
            seed: Some(11),
            ..LocalMoranParams::default()
        };
        let result = local_moran(&values, &mut band, &params).unwrap();

        let pos = values.order_of(2).unwrap();
        // Own deviation is negative yet the statistic sits above its
        // (negative) expectation, and the extreme-high neighbor makes
        // the observed statistic near-minimal among permuted draws.
        assert!(result.moran_i[pos] < 0.0);
        assert!(result.z_scores[pos] > 0.0);
        assert!(result.pseudo_p.as_ref().unwrap()[pos] <= 0.05);
        assert_eq!(result.labels[pos], ClusterLabel::HighHigh);
    }

    #[test]
    fn test_expected_value_formula() {
        let (values, mut band) = two_regimes();
        let result = local_moran(&values, &mut band, &LocalMoranParams::default()).unwrap();
        let n = values.len() as f64;
        // Binary weights: E[I_i] is -(neighbor count)/(n-1).
        // Entity 1 sits at the strip end with a single in-band neighbor.
        assert_relative_eq!(result.expected[0], -1.0 / (n - 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_hand_computed_statistic() {
        let values = ValueVector::from_pairs(vec![
            (1, 4.0),
            (2, 2.0),
            (3, 6.0),
            (4, 0.0),
        ])
        .unwrap();
        let sites = vec![
            Site::new(1, 0.0, 0.0),
            Site::new(2, 1.0, 0.0),
            Site::new(3, 2.0, 0.0),
            Site::new(4, 3.0, 0.0),
        ];
        let mut band = DistanceBand::new(sites, 1.0, DistanceWeight::Binary, false).unwrap();
        let result = local_moran(&values, &mut band, &LocalMoranParams::default()).unwrap();

        // mean 3, deviations [1, -1, 3, -3], m2 = (1+1+9+9)/3.
        let m2 = 20.0 / 3.0;
        // Entity 1: single neighbor (id 2, dev -1), lag -1.
        assert_relative_eq!(result.moran_i[0], (1.0 / m2) * -1.0, epsilon = 1e-12);
        // Entity 2: neighbors 1 and 3, lag 1 + 3 = 4.
        assert_relative_eq!(result.moran_i[1], (-1.0 / m2) * 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_attribute_rejected() {
        let values =
            ValueVector::from_pairs((1..=4).map(|id| (id, 1.0)).collect::<Vec<_>>()).unwrap();
        let sites = (1..=4).map(|id| Site::new(id, id as f64, 0.0)).collect();
        let mut band = DistanceBand::new(sites, 1.0, DistanceWeight::Binary, false).unwrap();
        assert!(matches!(
            local_moran(&values, &mut band, &LocalMoranParams::default()),
            Err(Error::DegenerateVariance)
        ));
    }

    #[test]
    fn test_seeded_pseudo_p_reproducible() {
        let (values, mut band) = two_regimes();
        let params = LocalMoranParams {
            permutations: Some(99),
            seed: Some(1234),
            ..LocalMoranParams::default()
        };
        let first = local_moran(&values, &mut band, &params).unwrap();
        band.reset();
        let second = local_moran(&values, &mut band, &params).unwrap();
        let (a, b) = (first.pseudo_p.unwrap(), second.pseudo_p.unwrap());
        for i in 0..values.len() {
            assert_relative_eq!(a[i], b[i]);
            assert!(a[i] > 0.0 && a[i] <= 1.0);
        }
    }
}
