//! Spatial weights matrix (SWM) binary store
//!
//! An SWM file persists a directed weighted neighbor graph: a single-line
//! text header describing how the weights were built, two little-endian
//! `i32` values (entity count, row-standardization flag), then exactly one
//! record per entity in write order:
//!
//! ```text
//! id: i32, neighbor_count: i32,
//! neighbor_ids: [i32; nn], weights, unstandardized_sum: f64
//! ```
//!
//! Variable-weight records store `[f64; nn]` weights; fixed-weight records
//! store a single `f64` shared by all neighbors. Records for entities with
//! zero neighbors carry only the id and count. The store is append-only on
//! write and strictly sequential on read; there is no seeking.

mod reader;
mod writer;

pub use reader::{Entries, SwmReader};
pub use writer::{SwmCharacteristics, SwmWriter};

use crate::values::EntityId;

/// Tag describing how the neighbor weights were conceptualized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightType {
    InverseDistance,
    FixedDistance,
    KNearest,
    ContiguityEdges,
    ContiguityEdgesCorners,
    FromTable,
    ZoneOfIndifference,
    Unknown(i32),
}

impl WeightType {
    /// Integer tag written into the store header.
    pub fn tag(self) -> i32 {
        match self {
            WeightType::InverseDistance => 0,
            WeightType::FixedDistance => 1,
            WeightType::KNearest => 2,
            WeightType::ContiguityEdges => 4,
            WeightType::ContiguityEdgesCorners => 5,
            WeightType::FromTable => 6,
            WeightType::ZoneOfIndifference => 7,
            WeightType::Unknown(tag) => tag,
        }
    }

    pub fn from_tag(tag: i32) -> Self {
        match tag {
            0 => WeightType::InverseDistance,
            1 => WeightType::FixedDistance,
            2 => WeightType::KNearest,
            4 => WeightType::ContiguityEdges,
            5 => WeightType::ContiguityEdgesCorners,
            6 => WeightType::FromTable,
            7 => WeightType::ZoneOfIndifference,
            other => WeightType::Unknown(other),
        }
    }

    /// Weight types whose per-record weights are a single shared value.
    pub fn default_fixed(self) -> bool {
        matches!(
            self,
            WeightType::FixedDistance
                | WeightType::KNearest
                | WeightType::ContiguityEdges
                | WeightType::ContiguityEdgesCorners
        )
    }
}

/// Store-level metadata written ahead of the entity records.
#[derive(Debug, Clone)]
pub struct SwmHeader {
    /// Format version string.
    pub version: String,
    /// Name of the unique id field the record ids come from.
    pub unique_id_field: String,
    /// Descriptive name of the spatial reference of the source dataset.
    pub spatial_ref: String,
    /// Descriptive name of the source dataset itself.
    pub input_dataset: String,
    /// How the weights were conceptualized.
    pub weight_type: WeightType,
    /// Distance metric used during construction (e.g. EUCLIDEAN).
    pub distance_method: String,
    /// Distance-decay exponent, when applicable.
    pub exponent: Option<f64>,
    /// Distance threshold, when applicable.
    pub threshold: Option<f64>,
    /// Neighbor count, for k-nearest weights.
    pub num_neighs: Option<usize>,
    /// Whether every record stores one shared weight value.
    pub fixed_weights: bool,
    /// Whether weights were row-standardized at write time.
    pub row_standard: bool,
    /// Declared number of entity records.
    pub entity_count: usize,
}

impl SwmHeader {
    /// Minimal header for a freshly built store.
    pub fn new(
        unique_id_field: &str,
        weight_type: WeightType,
        entity_count: usize,
        row_standard: bool,
    ) -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            unique_id_field: unique_id_field.to_uppercase(),
            spatial_ref: String::new(),
            input_dataset: String::new(),
            weight_type,
            distance_method: "EUCLIDEAN".to_string(),
            exponent: None,
            threshold: None,
            num_neighs: None,
            fixed_weights: weight_type.default_fixed(),
            row_standard,
            entity_count,
        }
    }
}

/// Current header version string.
pub const FORMAT_VERSION: &str = "1.0";

/// Placeholder for header fields with no value.
pub(crate) const NO_VALUE: &str = "#";

/// One decoded entity record.
#[derive(Debug, Clone, PartialEq)]
pub struct SwmEntry {
    pub id: EntityId,
    pub neighbor_ids: Vec<EntityId>,
    /// Weights as stored: row-standardized when the header flag is set.
    pub weights: Vec<f64>,
    /// Sum of the weights before any row standardization.
    ///
    /// Zero for entities with no neighbors.
    pub unstandardized_sum: f64,
}

impl SwmEntry {
    pub fn neighbor_count(&self) -> usize {
        self.neighbor_ids.len()
    }
}
