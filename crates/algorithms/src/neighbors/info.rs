//! Neighbor diagnostics tracking
//!
//! One `NeighborInfo` instance accompanies each streaming pass. It filters
//! nothing itself beyond the configured truncation cap; its job is to
//! notice entities with zero neighbors, entities with suspiciously many,
//! and to turn those observations into warnings or a hard failure once the
//! pass completes.

use lisa_core::{EntityId, Error, Result};

/// Default neighbor count past which a warning is emitted.
pub const DEFAULT_WARN_NEIGHBORS: usize = 1000;

/// At most this many offending ids appear in any report.
pub const REPORT_ID_CAP: usize = 30;

/// Tracks neighbor-count anomalies across one streaming pass.
#[derive(Debug)]
pub struct NeighborInfo {
    warn_threshold: usize,
    max_neighbors: Option<usize>,
    num_obs: usize,
    total_neighbors: usize,
    max_seen: usize,
    ids_warn: Vec<EntityId>,
    ids_truncated: Vec<EntityId>,
    ids_no_neighbors: Vec<EntityId>,
    warn_emitted: bool,
    truncate_emitted: bool,
}

/// Post-run summary handed back to callers alongside the result vectors.
#[derive(Debug, Clone)]
pub struct NeighborDiagnostics {
    /// Entities processed.
    pub num_obs: usize,
    /// How many entities had zero neighbors.
    pub no_neighbor_count: usize,
    /// Up to [`REPORT_ID_CAP`] of their ids, sorted ascending.
    pub no_neighbor_ids: Vec<EntityId>,
    /// Whether `no_neighbor_ids` was truncated to the cap.
    pub truncated: bool,
    /// Largest neighbor count observed.
    pub max_neighbors: usize,
    /// Mean neighbor count across processed entities.
    pub avg_neighbors: f64,
}

impl NeighborInfo {
    pub fn new(warn_threshold: usize, max_neighbors: Option<usize>) -> Self {
        Self {
            warn_threshold,
            max_neighbors,
            num_obs: 0,
            total_neighbors: 0,
            max_seen: 0,
            ids_warn: Vec::new(),
            ids_truncated: Vec::new(),
            ids_no_neighbors: Vec::new(),
            warn_emitted: false,
            truncate_emitted: false,
        }
    }

    /// Record one entity's filtered neighborhood, truncating to the hard
    /// cap when one is configured.
    ///
    /// Returns the surviving neighbor count; zero means the caller must
    /// skip the statistic and apply the sentinel policy for this entity.
    pub fn process_info(
        &mut self,
        id: EntityId,
        neighbor_ids: &mut Vec<EntityId>,
        neighbor_values: &mut Vec<f64>,
        weights: &mut Vec<f64>,
    ) -> usize {
        self.num_obs += 1;
        let mut nn = neighbor_ids.len();

        if nn == 0 {
            self.ids_no_neighbors.push(id);
            return 0;
        }

        if nn > self.warn_threshold {
            self.ids_warn.push(id);
            if !self.warn_emitted {
                self.warn_emitted = true;
                tracing::warn!(
                    threshold = self.warn_threshold,
                    "at least one entity has an unusually large neighborhood"
                );
            }
        }

        if let Some(cap) = self.max_neighbors {
            if nn > cap {
                self.ids_truncated.push(id);
                if !self.truncate_emitted {
                    self.truncate_emitted = true;
                    tracing::warn!(cap, "truncating oversized neighborhoods");
                }
                neighbor_ids.truncate(cap);
                neighbor_values.truncate(cap);
                weights.truncate(cap);
                nn = cap;
            }
        }

        self.total_neighbors += nn;
        self.max_seen = self.max_seen.max(nn);
        nn
    }

    /// Ids recorded with zero neighbors, in processing order.
    pub fn no_neighbor_ids(&self) -> &[EntityId] {
        &self.ids_no_neighbors
    }

    /// Fail or warn about isolated entities once the pass is complete.
    ///
    /// Every entity isolated is a hard `AllIsolated` failure when
    /// `fail_if_all` is set; otherwise (and for partial isolation) a
    /// warning lists up to [`REPORT_ID_CAP`] sorted ids.
    pub fn report_no_neighbors(&mut self, fail_if_all: bool) -> Result<()> {
        if self.num_obs > 0 && self.ids_no_neighbors.len() == self.num_obs {
            if fail_if_all {
                return Err(Error::AllIsolated);
            }
            tracing::warn!("every entity in the analysis has zero neighbors");
        }

        if !self.ids_no_neighbors.is_empty() {
            self.ids_no_neighbors.sort_unstable();
            let shown = &self.ids_no_neighbors[..REPORT_ID_CAP.min(self.ids_no_neighbors.len())];
            tracing::warn!(
                count = self.ids_no_neighbors.len(),
                ids = ?shown,
                "entities with no neighbors receive null statistic values"
            );
        }
        Ok(())
    }

    /// Warn about entities past the large-neighborhood threshold.
    pub fn report_warnings(&mut self) {
        if !self.ids_warn.is_empty() {
            self.ids_warn.sort_unstable();
            let shown = &self.ids_warn[..REPORT_ID_CAP.min(self.ids_warn.len())];
            tracing::warn!(
                threshold = self.warn_threshold,
                ids = ?shown,
                "entities with unusually many neighbors"
            );
        }
    }

    /// Warn about entities whose neighborhoods were truncated to the cap.
    pub fn report_maximums(&mut self) {
        if !self.ids_truncated.is_empty() {
            self.ids_truncated.sort_unstable();
            let shown = &self.ids_truncated[..REPORT_ID_CAP.min(self.ids_truncated.len())];
            tracing::warn!(ids = ?shown, "entities truncated to the neighbor cap");
        }
    }

    /// Summary for the caller; sorts the no-neighbor list first.
    pub fn summary(&mut self) -> NeighborDiagnostics {
        self.ids_no_neighbors.sort_unstable();
        let truncated = self.ids_no_neighbors.len() > REPORT_ID_CAP;
        NeighborDiagnostics {
            num_obs: self.num_obs,
            no_neighbor_count: self.ids_no_neighbors.len(),
            no_neighbor_ids: self.ids_no_neighbors
                [..REPORT_ID_CAP.min(self.ids_no_neighbors.len())]
                .to_vec(),
            truncated,
            max_neighbors: self.max_seen,
            avg_neighbors: if self.num_obs == 0 {
                0.0
            } else {
                self.total_neighbors as f64 / self.num_obs as f64
            },
        }
    }
}

impl Default for NeighborInfo {
    fn default() -> Self {
        Self::new(DEFAULT_WARN_NEIGHBORS, None)
    }
}
