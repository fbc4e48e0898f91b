//! Neighborhood structure and diagnostics
//!
//! - **info**: per-run tracking of isolated entities and oversized
//!   neighborhoods
//! - **kdtree**: 2D spatial index for radius queries
//! - **distance_band**: on-the-fly neighbor search as a weights source

mod distance_band;
mod info;
pub mod kdtree;

pub use distance_band::{DistanceBand, DistanceWeight, Site};
pub use info::{NeighborDiagnostics, NeighborInfo, DEFAULT_WARN_NEIGHBORS, REPORT_ID_CAP};
pub use kdtree::KdTree;
