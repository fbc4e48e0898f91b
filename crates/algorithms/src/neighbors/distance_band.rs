//! On-the-fly distance-band neighbor search
//!
//! A `DistanceBand` plays the role of a materialized weights store when no
//! SWM file exists: every entity within the threshold distance of an
//! entity is its neighbor, weighted either uniformly or by inverse
//! distance. The statistic accumulators consume it through the same
//! `WeightsSource` contract as a file-backed store, keeping geometry out
//! of the statistic core.

use lisa_core::{EntityId, Error, Result};

use crate::local::{RawRow, WeightsSource};
use crate::neighbors::kdtree::KdTree;

/// One located entity for neighbor searching.
#[derive(Debug, Clone, Copy)]
pub struct Site {
    pub id: EntityId,
    pub x: f64,
    pub y: f64,
}

impl Site {
    pub fn new(id: EntityId, x: f64, y: f64) -> Self {
        Self { id, x, y }
    }
}

/// How distance maps to a neighbor weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceWeight {
    /// Every neighbor inside the band weighs 1.
    Binary,
    /// Inverse distance decay `1 / d^exponent`.
    ///
    /// Distances at or below one map to a weight of 1 so near-coincident
    /// entities cannot dominate the row.
    InverseDistance { exponent: f64 },
}

impl DistanceWeight {
    fn weight(self, distance: f64) -> f64 {
        match self {
            DistanceWeight::Binary => 1.0,
            DistanceWeight::InverseDistance { exponent } => {
                if distance <= 1.0 {
                    1.0
                } else {
                    1.0 / distance.powf(exponent)
                }
            }
        }
    }
}

/// Streaming neighbor source over a fixed distance band.
pub struct DistanceBand {
    sites: Vec<Site>,
    tree: KdTree,
    threshold: f64,
    weighting: DistanceWeight,
    row_standard: bool,
    cursor: usize,
}

impl DistanceBand {
    /// Index `sites` for neighbor queries at the given threshold.
    ///
    /// With `row_standard` set, each emitted row is normalized to sum to
    /// one while the raw sum is still reported alongside.
    pub fn new(
        sites: Vec<Site>,
        threshold: f64,
        weighting: DistanceWeight,
        row_standard: bool,
    ) -> Result<Self> {
        if !(threshold > 0.0) {
            return Err(Error::InvalidParameter {
                name: "threshold",
                value: threshold.to_string(),
                reason: "distance band must be positive".to_string(),
            });
        }
        let coords: Vec<(f64, f64)> = sites.iter().map(|s| (s.x, s.y)).collect();
        let tree = KdTree::build(&coords);
        Ok(Self {
            sites,
            tree,
            threshold,
            weighting,
            row_standard,
            cursor: 0,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Restart the stream from the first site.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

impl WeightsSource for DistanceBand {
    fn entity_count(&self) -> usize {
        self.sites.len()
    }

    fn row_standard(&self) -> bool {
        self.row_standard
    }

    fn next_row(&mut self) -> Result<Option<RawRow>> {
        if self.cursor >= self.sites.len() {
            return Ok(None);
        }

        let site = self.sites[self.cursor];
        let mut hits = self.tree.within_radius(site.x, site.y, self.threshold);
        // Stable neighbor order regardless of tree layout.
        hits.sort_unstable_by_key(|(idx, _)| *idx);

        let mut neighbor_ids = Vec::with_capacity(hits.len());
        let mut weights = Vec::with_capacity(hits.len());
        for (idx, distance) in hits {
            if idx == self.cursor {
                continue; // the entity is not its own band neighbor
            }
            neighbor_ids.push(self.sites[idx].id);
            weights.push(self.weighting.weight(distance));
        }

        let unstandardized_sum: f64 = weights.iter().sum();
        if self.row_standard && unstandardized_sum > 0.0 {
            for w in &mut weights {
                *w /= unstandardized_sum;
            }
        }

        self.cursor += 1;
        Ok(Some(RawRow {
            id: site.id,
            neighbor_ids,
            weights,
            unstandardized_sum,
        }))
    }
}
