//! # Lisa Algorithms
//!
//! Local spatial association statistics over entity value vectors and
//! spatial weights:
//!
//! - **stats**: probability kernel (normal, t, chi-square, F) and
//!   permutation pseudo p-values
//! - **neighbors**: neighbor diagnostics tracking and distance-band
//!   neighbor search
//! - **local**: streaming Getis-Ord Gi* and local Moran's I accumulators
//! - **bins**: confidence-tier and FDR significance classification
//! - **partition**: case-field grouping into independent analysis runs

pub mod bins;
pub mod local;
pub mod neighbors;
pub mod partition;
pub mod stats;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::bins::{fdr_bins, p_value_bins};
    pub use crate::local::{
        local_g, local_moran, ClusterLabel, GiParams, GiResult, LocalMoranParams,
        LocalMoranResult, ResampleMode, SwmSource, WeightsSource,
    };
    pub use crate::neighbors::{
        DistanceBand, DistanceWeight, NeighborDiagnostics, NeighborInfo, Site,
    };
    pub use crate::stats::{pseudo_p_value, z_prob, Tail};
    pub use lisa_core::prelude::*;
}
