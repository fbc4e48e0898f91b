//! Streaming local association statistics
//!
//! - **gi**: Getis-Ord Gi* hot spot statistic
//! - **moran**: Anselin local Moran's I cluster and outlier statistic
//!
//! Both accumulators pull neighbor rows one at a time through the
//! [`WeightsSource`] trait, so a file-backed weights store and an
//! in-memory distance band feed the same code path. Rows for entities
//! outside the analysis set are skipped; neighbors outside the set are
//! dropped from the row before any weight math runs.

mod gi;
mod moran;

pub use gi::{local_g, GiParams, GiResult};
pub use moran::{local_moran, ClusterLabel, LocalMoranParams, LocalMoranResult};

use std::path::Path;

use rand::rngs::StdRng;
use rand::Rng;

use lisa_core::EntityId;
use lisa_core::{Error, Result, SwmHeader, SwmReader, ValueVector};

/// How permutation draws resample the value vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleMode {
    /// Draw neighbor values with replacement.
    Bootstrap,
    /// Draw neighbor values without replacement.
    Permutation,
}

/// One entity's neighbor row as it comes off a weights source.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub id: EntityId,
    pub neighbor_ids: Vec<EntityId>,
    pub weights: Vec<f64>,
    /// Sum of the weights before any row standardization.
    pub unstandardized_sum: f64,
}

/// A forward-only stream of neighbor rows.
///
/// `next_row` returns `Ok(None)` once every declared entity has been
/// emitted. Implementations report whether the weights they emit are
/// row-standardized so consumers can recover raw weights when a row
/// has to be refiltered or extended.
pub trait WeightsSource {
    /// Number of entities the source will emit rows for.
    fn entity_count(&self) -> usize;

    /// Whether emitted weights sum to one per row.
    fn row_standard(&self) -> bool;

    /// Pull the next neighbor row.
    fn next_row(&mut self) -> Result<Option<RawRow>>;
}

/// A weights source backed by an SWM store on disk.
pub struct SwmSource {
    reader: SwmReader,
}

impl SwmSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            reader: SwmReader::open(path)?,
        })
    }

    pub fn header(&self) -> &SwmHeader {
        self.reader.header()
    }
}

impl WeightsSource for SwmSource {
    fn entity_count(&self) -> usize {
        self.reader.entity_count()
    }

    fn row_standard(&self) -> bool {
        self.reader.row_standard()
    }

    fn next_row(&mut self) -> Result<Option<RawRow>> {
        if self.reader.entries_read() >= self.reader.entity_count() {
            return Ok(None);
        }
        let entry = self.reader.read_entry()?;
        Ok(Some(RawRow {
            id: entry.id,
            neighbor_ids: entry.neighbor_ids,
            weights: entry.weights,
            unstandardized_sum: entry.unstandardized_sum,
        }))
    }
}

/// A neighbor row restricted to the analysis set, with raw weights.
pub(crate) struct RestrictedRow {
    /// Neighbor positions in the value vector's order.
    pub positions: Vec<usize>,
    /// Unstandardized weights, one per position.
    pub weights: Vec<f64>,
}

/// Drop neighbors outside the analysis set and undo row standardization.
///
/// When the source is row-standardized, each stored weight is the raw
/// weight divided by the row's unstandardized sum; multiplying back
/// recovers raw weights so the caller can restandardize over whatever
/// final neighbor set it assembles.
pub(crate) fn restrict_row(row: &RawRow, values: &ValueVector, row_standard: bool) -> RestrictedRow {
    let mut positions = Vec::with_capacity(row.neighbor_ids.len());
    let mut weights = Vec::with_capacity(row.neighbor_ids.len());
    for (nid, w) in row.neighbor_ids.iter().zip(&row.weights) {
        if let Some(pos) = values.order_of(*nid) {
            positions.push(pos);
            let raw = if row_standard { w * row.unstandardized_sum } else { *w };
            weights.push(raw);
        }
    }
    RestrictedRow { positions, weights }
}

/// Guard that the store can cover every analysis entity.
///
/// A store with fewer records than the analysis has entities can never
/// supply a row for each of them, so the run fails before any decoding.
pub(crate) fn check_coverage(values: &ValueVector, source: &dyn WeightsSource) -> Result<()> {
    if values.len() > source.entity_count() {
        return Err(Error::IncompleteWeights {
            num_obs: values.len(),
            store_obs: source.entity_count(),
        });
    }
    Ok(())
}

/// Build the resampled neighbor index draws for one entity.
///
/// Each draw holds `nn` positions into the full value vector, the
/// entity's own position included. Permutation mode samples without
/// replacement; bootstrap draws with replacement. Draws are generated
/// sequentially so a seeded generator reproduces the same matrix
/// regardless of how the lag computation is later parallelized.
pub(crate) fn resample_indices(
    rng: &mut StdRng,
    mode: ResampleMode,
    num_obs: usize,
    nn: usize,
    permutations: usize,
) -> Result<Vec<Vec<usize>>> {
    if mode == ResampleMode::Permutation && nn > num_obs {
        return Err(Error::Algorithm(format!(
            "entity has {nn} neighbors but only {num_obs} resampling candidates"
        )));
    }
    let mut draws = Vec::with_capacity(permutations);
    for _ in 0..permutations {
        let draw: Vec<usize> = match mode {
            ResampleMode::Permutation => {
                rand::seq::index::sample(rng, num_obs, nn).into_vec()
            }
            ResampleMode::Bootstrap => {
                (0..nn).map(|_| rng.gen_range(0..num_obs)).collect()
            }
        };
        draws.push(draw);
    }
    Ok(draws)
}
