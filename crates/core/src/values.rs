//! Entity value vectors
//!
//! A `ValueVector` pairs stable entity ids with the numeric attribute under
//! analysis. The order of entries fixes the positional layout of every
//! result vector produced by the local statistics, so the vector is
//! immutable once built.

use std::collections::HashMap;

use ndarray::Array1;

use crate::error::{Error, Result};

/// Stable integer key identifying one analyzed entity.
///
/// Matches the 32-bit little-endian id stored in the weights matrix format.
pub type EntityId = i32;

/// Ordered `(entity id, value)` vector with O(1) id lookup.
#[derive(Debug, Clone)]
pub struct ValueVector {
    ids: Vec<EntityId>,
    values: Array1<f64>,
    order: HashMap<EntityId, usize>,
}

impl ValueVector {
    /// Build a value vector from `(id, value)` pairs, preserving order.
    ///
    /// Fails with `Error::DuplicateId` if the same id appears twice.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (EntityId, f64)>,
    {
        let pairs: Vec<(EntityId, f64)> = pairs.into_iter().collect();
        let mut ids = Vec::with_capacity(pairs.len());
        let mut vals = Vec::with_capacity(pairs.len());
        let mut order = HashMap::with_capacity(pairs.len());

        for (pos, (id, value)) in pairs.into_iter().enumerate() {
            if order.insert(id, pos).is_some() {
                return Err(Error::DuplicateId(id));
            }
            ids.push(id);
            vals.push(value);
        }

        Ok(Self {
            ids,
            values: Array1::from_vec(vals),
            order,
        })
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the vector holds no entities.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Entity ids in positional order.
    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    /// Attribute values in positional order.
    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    /// Positional index of an entity id, if it belongs to this vector.
    pub fn order_of(&self, id: EntityId) -> Option<usize> {
        self.order.get(&id).copied()
    }

    /// Whether the id belongs to this vector.
    pub fn contains(&self, id: EntityId) -> bool {
        self.order.contains_key(&id)
    }

    /// Value at a positional index.
    pub fn value(&self, order: usize) -> f64 {
        self.values[order]
    }

    /// Id at a positional index.
    pub fn id(&self, order: usize) -> EntityId {
        self.ids[order]
    }

    /// Arithmetic mean of the values.
    pub fn mean(&self) -> f64 {
        self.values.sum() / self.len() as f64
    }

    /// Population variance of the values.
    pub fn variance(&self) -> f64 {
        let n = self.len() as f64;
        let mean = self.mean();
        self.values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
    }

    /// Iterate `(id, value)` pairs in positional order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, f64)> + '_ {
        self.ids.iter().copied().zip(self.values.iter().copied())
    }
}
