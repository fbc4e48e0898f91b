//! Statistical kernel
//!
//! - **distributions**: closed-form CDFs and the inverse-normal quantile
//! - **summary**: weighted median, z-transform, Theil's T inequality index

pub mod distributions;
pub mod summary;

pub use distributions::{chi_prob, f_prob, q_norm, t_prob, z_prob, Tail};
pub use summary::{weighted_median, z_transform, TheilsT};

/// Two-tailed pseudo p-value from a permutation sample.
///
/// Counts the draws at least as large and at most as large as the observed
/// statistic, takes the smaller count, and applies +1 smoothing so the
/// p-value can never reach zero: `(min + 1) * 2 / (P + 1)`, capped at 1.
/// The +1 terms are deliberate and must not be simplified away.
pub fn pseudo_p_value(statistic: f64, perm_statistics: &[f64]) -> f64 {
    let num_perms = perm_statistics.len() as f64;
    let num_larger = perm_statistics.iter().filter(|v| **v >= statistic).count();
    let num_smaller = perm_statistics.iter().filter(|v| **v <= statistic).count();
    let extreme = num_larger.min(num_smaller) as f64;
    (((extreme + 1.0) * 2.0) / (num_perms + 1.0)).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pseudo_p_all_extreme() {
        // Observed statistic larger than every draw: floor of 2/(P+1),
        // capped at 1 for the degenerate P=1 case.
        assert_relative_eq!(pseudo_p_value(10.0, &[1.0]), 1.0);
        assert_relative_eq!(pseudo_p_value(10.0, &[1.0, 2.0, 3.0]), 0.5);
        let perms: Vec<f64> = (0..99).map(|i| i as f64 / 100.0).collect();
        assert_relative_eq!(pseudo_p_value(10.0, &perms), 0.02);
    }

    #[test]
    fn test_pseudo_p_never_zero_and_in_unit_interval() {
        for p in [1usize, 2, 9, 99, 999] {
            let perms: Vec<f64> = (0..p).map(|i| i as f64).collect();
            let val = pseudo_p_value(1e12, &perms);
            assert!(val > 0.0 && val <= 1.0, "P={p} gave {val}");
        }
    }

    #[test]
    fn test_pseudo_p_central_statistic() {
        // A statistic in the middle of the draws is not significant.
        let perms = vec![-2.0, -1.0, 0.0, 1.0, 2.0];
        assert!(pseudo_p_value(0.0, &perms) > 0.5);
    }
}
