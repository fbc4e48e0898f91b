//! Confidence-tier significance bins
//!
//! Results are reported as signed bins in {-3..3}: the magnitude encodes
//! the confidence tier (99%, 95%, 90%) and the sign follows the
//! statistic, so +3 is a hot spot at 99% confidence and -3 the matching
//! cold spot. The FDR variant tightens each tier's cutoff with the
//! Benjamini-Hochberg rank correction before binning.

/// Tier levels, tightest first.
const LEVELS: [(f64, i8); 3] = [(0.01, 3), (0.05, 2), (0.10, 1)];

/// Classify each statistic into a signed confidence bin.
///
/// NaN statistics or p-values land in bin 0.
pub fn p_value_bins(stats: &[f64], p_values: &[f64]) -> Vec<i8> {
    stats
        .iter()
        .zip(p_values)
        .map(|(stat, p)| {
            if stat.is_nan() || p.is_nan() {
                return 0;
            }
            let tier = LEVELS
                .iter()
                .find(|(level, _)| *p <= *level)
                .map(|(_, tier)| *tier)
                .unwrap_or(0);
            if *stat < 0.0 {
                -tier
            } else {
                tier
            }
        })
        .collect()
}

/// Classify with the false discovery rate correction applied per tier.
///
/// Entities are ranked by ascending p-value and the rank `k` entity's
/// cutoffs shrink to `level * k / N`; its bin is the tightest tier its
/// own p-value still satisfies. Tied p-values share the run's last
/// rank, so the outcome depends only on the multiset of p-values, not
/// on input order.
pub fn fdr_bins(stats: &[f64], p_values: &[f64]) -> Vec<i8> {
    let mut order: Vec<usize> = (0..p_values.len())
        .filter(|i| !p_values[*i].is_nan() && !stats[*i].is_nan())
        .collect();
    order.sort_by(|a, b| {
        p_values[*a]
            .partial_cmp(&p_values[*b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let total = order.len() as f64;

    let mut bins = vec![0i8; p_values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && p_values[order[end]] == p_values[order[start]] {
            end += 1;
        }
        let rank = end as f64;
        for idx in &order[start..end] {
            for (level, tier) in LEVELS {
                if p_values[*idx] <= level * rank / total {
                    bins[*idx] = if stats[*idx] < 0.0 { -tier } else { tier };
                    break;
                }
            }
        }
        start = end;
    }
    bins
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_tiers() {
        let stats = [2.8, -2.1, 1.7, 0.4, -3.5];
        let ps = [0.005, 0.03, 0.08, 0.7, 0.009];
        assert_eq!(p_value_bins(&stats, &ps), vec![3, -2, 1, 0, -3]);
    }

    #[test]
    fn test_tier_boundaries_inclusive() {
        let stats = [1.0, 1.0, 1.0, -1.0];
        let ps = [0.01, 0.05, 0.10, 0.10];
        assert_eq!(p_value_bins(&stats, &ps), vec![3, 2, 1, -1]);
    }

    #[test]
    fn test_nan_lands_in_zero() {
        let stats = [f64::NAN, 2.0];
        let ps = [0.001, f64::NAN];
        assert_eq!(p_value_bins(&stats, &ps), vec![0, 0]);
    }

    #[test]
    fn test_fdr_never_looser_than_fixed() {
        let stats = [3.0, 2.5, -2.0, 1.8, 0.2, -0.1, 1.1, -2.8];
        let ps = [0.001, 0.004, 0.02, 0.04, 0.5, 0.9, 0.09, 0.006];
        let fixed = p_value_bins(&stats, &ps);
        let fdr = fdr_bins(&stats, &ps);
        for (a, b) in fdr.iter().zip(&fixed) {
            assert!(a.abs() <= b.abs(), "fdr {a} vs fixed {b}");
        }
    }

    #[test]
    fn test_fdr_order_invariant() {
        let stats = [3.0, -2.5, 2.0, 1.8, 0.2, -1.1];
        let ps = [0.001, 0.004, 0.02, 0.04, 0.5, 0.09];
        let forward = fdr_bins(&stats, &ps);

        let mut rev_stats = stats;
        let mut rev_ps = ps;
        rev_stats.reverse();
        rev_ps.reverse();
        let mut backward = fdr_bins(&rev_stats, &rev_ps);
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_fdr_small_uniform_ps_all_pass() {
        // Every p far below level * rank / N passes the tightest tier.
        let stats = [1.0; 4];
        let ps = [0.0001, 0.0002, 0.0003, 0.0004];
        assert_eq!(fdr_bins(&stats, &ps), vec![3, 3, 3, 3]);
    }

    #[test]
    fn test_fdr_rejects_borderline_crowd() {
        // Fixed tiers admit all four at 90%; under the rank-scaled
        // cutoffs 0.10 * k / 4 only the last rank (0.093 <= 0.10)
        // stays significant.
        let stats = [1.0; 4];
        let ps = [0.09, 0.091, 0.092, 0.093];
        assert_eq!(p_value_bins(&stats, &ps), vec![1, 1, 1, 1]);
        assert_eq!(fdr_bins(&stats, &ps), vec![0, 0, 0, 1]);
    }

    #[test]
    fn test_fdr_tied_ps_share_a_bin() {
        // Equal p-values take the run's last rank, so neither input
        // order decides which of the pair survives.
        let stats = [1.0, -1.0];
        let ps = [0.06, 0.06];
        assert_eq!(fdr_bins(&stats, &ps), vec![1, -1]);
        assert_eq!(fdr_bins(&[-1.0, 1.0], &ps), vec![-1, 1]);
    }

    #[test]
    fn test_fdr_growing_population_only_tightens() {
        // Appending weak entities shrinks every rank-scaled cutoff, so
        // an entity's tier can only drop, never climb.
        let stats = [2.9, 2.1, 1.8];
        let ps = [0.001, 0.02, 0.09];
        let small = fdr_bins(&stats, &ps);
        assert_eq!(small, vec![3, 2, 1]);

        let grown_stats = [2.9, 2.1, 1.8, 0.1, 0.1, 0.1];
        let grown_ps = [0.001, 0.02, 0.09, 0.9, 0.9, 0.9];
        let grown = fdr_bins(&grown_stats, &grown_ps);
        for (before, after) in small.iter().zip(&grown) {
            assert!(after.abs() <= before.abs(), "{after} vs {before}");
        }
        assert_eq!(grown[..3], [3, 1, 0]);
    }
}
