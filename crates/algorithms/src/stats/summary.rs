//! Summary statistics and transforms

use std::collections::HashMap;
use std::hash::Hash;

use ndarray::Array1;

/// Standardize values to zero mean and unit variance.
pub fn z_transform(values: &Array1<f64>) -> Array1<f64> {
    let n = values.len() as f64;
    let mean = values.sum() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    let std = var.sqrt();
    values.mapv(|v| (v - mean) / std)
}

/// Weighted median of univariate data.
///
/// Zero-weight observations are dropped before sorting; with no weights
/// every observation counts equally. When the half-weight point falls
/// between two observations the result interpolates by the flanking
/// cumulative weights.
pub fn weighted_median(values: &[f64], weights: Option<&[f64]>) -> f64 {
    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let ones;
    let weights = match weights {
        Some(w) if w.len() == n => w,
        _ => {
            ones = vec![1.0; n];
            &ones
        }
    };

    let mut pairs: Vec<(f64, f64)> = values
        .iter()
        .zip(weights.iter())
        .filter(|(_, w)| **w != 0.0)
        .map(|(v, w)| (*v, *w))
        .collect();
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    let num_total = pairs.len();

    let cumulative: Vec<f64> = pairs
        .iter()
        .scan(0.0, |acc, (_, w)| {
            *acc += w;
            Some(*acc)
        })
        .collect();
    let sum_w = cumulative[num_total - 1];
    let mid_w = sum_w / 2.0;
    let num_lower = cumulative.iter().filter(|c| **c <= mid_w).count();

    if num_lower == 0 {
        pairs[0].0
    } else if num_lower == num_total {
        pairs[num_total - 1].0
    } else {
        let lower_sum_w = cumulative[num_lower - 1];
        let higher_sum_w = sum_w - lower_sum_w;
        if higher_sum_w > mid_w {
            pairs[num_lower].0
        } else {
            let low_val = lower_sum_w * pairs[num_lower - 1].0;
            let high_val = higher_sum_w * pairs[num_lower].0;
            (low_val + high_val) / sum_w
        }
    }
}

/// Theil's T index of inequality with between/within decomposition.
#[derive(Debug, Clone)]
pub struct TheilsT {
    /// Theil's T for the full set of values.
    pub t: f64,
    values: Array1<f64>,
    sum: f64,
    n: usize,
}

impl TheilsT {
    /// Values must be strictly positive for the index to be defined.
    pub fn new(values: Array1<f64>) -> Self {
        let n = values.len();
        let sum = values.sum();
        let t = values
            .iter()
            .map(|v| {
                let prop = v / sum;
                prop * (n as f64 * prop).ln()
            })
            .sum();
        Self { values, sum, n, t }
    }

    /// Split T into between-group and within-group components.
    ///
    /// `partition` assigns each observation to a group; the between
    /// component measures inequality across group totals, and
    /// `within = t - between`.
    pub fn decompose<K: Eq + Hash + Clone>(&self, partition: &[K]) -> (f64, f64) {
        let mut group_n: HashMap<K, usize> = HashMap::new();
        let mut group_sum: HashMap<K, f64> = HashMap::new();
        for (key, value) in partition.iter().zip(self.values.iter()) {
            *group_n.entry(key.clone()).or_insert(0) += 1;
            *group_sum.entry(key.clone()).or_insert(0.0) += value;
        }

        let between: f64 = group_n
            .iter()
            .map(|(key, count)| {
                let n_ratio = *count as f64 / self.n as f64;
                let val_ratio = group_sum[key] / self.sum;
                n_ratio * (n_ratio / val_ratio).ln()
            })
            .sum();
        (between, self.t - between)
    }
}
