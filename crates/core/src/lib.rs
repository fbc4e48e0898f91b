//! # Lisa Core
//!
//! Core types and I/O for the Lisa local spatial statistics library.
//!
//! This crate provides:
//! - `ValueVector`: an ordered entity id / attribute value vector
//! - `SwmReader` / `SwmWriter`: sequential binary spatial weights matrix I/O
//! - The shared error taxonomy for all Lisa crates

pub mod error;
pub mod swm;
pub mod values;

pub use error::{Error, Result};
pub use swm::{SwmEntry, SwmHeader, SwmReader, SwmWriter, WeightType};
pub use values::{EntityId, ValueVector};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::swm::{SwmEntry, SwmHeader, SwmReader, SwmWriter, WeightType};
    pub use crate::values::{EntityId, ValueVector};
}
