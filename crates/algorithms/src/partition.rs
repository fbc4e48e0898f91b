//! Case-field partitioning
//!
//! Splits `(entity, case, value)` records into one value vector per case
//! so each group can run a local statistic independently. An entity may
//! appear once per case; a repeat within the same case is a duplicate id
//! error from the vector builder.

use std::collections::BTreeMap;

use lisa_core::{EntityId, Result, ValueVector};

/// Group records by case key into per-case value vectors.
///
/// Cases come back in ascending key order; within a case, entities keep
/// their record order.
pub fn partition_by_case<K, I>(records: I) -> Result<Vec<(K, ValueVector)>>
where
    K: Ord,
    I: IntoIterator<Item = (EntityId, K, f64)>,
{
    let mut groups: BTreeMap<K, Vec<(EntityId, f64)>> = BTreeMap::new();
    for (id, case, value) in records {
        groups.entry(case).or_default().push((id, value));
    }

    let mut partitions = Vec::with_capacity(groups.len());
    for (case, pairs) in groups {
        partitions.push((case, ValueVector::from_pairs(pairs)?));
    }
    Ok(partitions)
}
