//! Append-only writer for spatial weights stores

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::swm::{SwmHeader, NO_VALUE};
use crate::values::EntityId;

/// Writes exactly one record per entity, in the caller's order.
///
/// When the header requests row standardization, weights are normalized to
/// sum to one before being persisted; the pre-normalization sum is stored
/// alongside them either way so readers can recover raw totals.
pub struct SwmWriter {
    sink: BufWriter<File>,
    header: SwmHeader,
    records_written: usize,
    num_non_zero: usize,
    min_neighbors: usize,
    max_neighbors: usize,
    no_neighbor_ids: Vec<EntityId>,
}

/// Connectivity summary accumulated while writing a store.
#[derive(Debug, Clone)]
pub struct SwmCharacteristics {
    pub entity_count: usize,
    pub num_non_zero: usize,
    pub min_neighbors: usize,
    pub max_neighbors: usize,
    pub no_neighbor_ids: Vec<EntityId>,
}

impl SwmCharacteristics {
    /// Percentage of the full N x N matrix that is non-zero.
    pub fn percent_non_zero(&self) -> f64 {
        let n = self.entity_count as f64;
        self.num_non_zero as f64 / (n * n) * 100.0
    }

    /// Average neighbor count per entity.
    pub fn avg_neighbors(&self) -> f64 {
        self.num_non_zero as f64 / self.entity_count as f64
    }
}

impl SwmWriter {
    /// Create a store at `path` and persist the header.
    pub fn create<P: AsRef<Path>>(path: P, header: SwmHeader) -> Result<Self> {
        if header.entity_count == 0 {
            return Err(Error::InvalidParameter {
                name: "entity_count",
                value: "0".to_string(),
                reason: "a weights store must declare at least one entity".to_string(),
            });
        }

        let file = File::create(path.as_ref())?;
        let mut sink = BufWriter::new(file);

        sink.write_all(header_line(&header).as_bytes())?;
        sink.write_all(&(header.entity_count as i32).to_le_bytes())?;
        sink.write_all(&(header.row_standard as i32).to_le_bytes())?;

        Ok(Self {
            sink,
            header,
            records_written: 0,
            num_non_zero: 0,
            min_neighbors: usize::MAX,
            max_neighbors: 0,
            no_neighbor_ids: Vec::new(),
        })
    }

    /// Append one entity record; returns the neighbor count written.
    ///
    /// `neighbor_ids` and `weights` must be equal length. Entities with no
    /// neighbors are written as a bare `(id, 0)` record.
    pub fn write_entry(
        &mut self,
        id: EntityId,
        neighbor_ids: &[EntityId],
        weights: &[f64],
    ) -> Result<usize> {
        if neighbor_ids.len() != weights.len() {
            return Err(Error::InvalidParameter {
                name: "weights",
                value: format!("{} weights for {} neighbors", weights.len(), neighbor_ids.len()),
                reason: "neighbor id and weight arrays must be parallel".to_string(),
            });
        }
        if self.records_written >= self.header.entity_count {
            return Err(Error::CorruptStore(format!(
                "attempted to write record {} of a store declaring {} entities",
                self.records_written + 1,
                self.header.entity_count
            )));
        }

        let nn = neighbor_ids.len();
        self.sink.write_all(&id.to_le_bytes())?;
        self.sink.write_all(&(nn as i32).to_le_bytes())?;

        if nn != 0 {
            for nh in neighbor_ids {
                self.sink.write_all(&nh.to_le_bytes())?;
            }

            let unstandardized_sum: f64 = weights.iter().sum();
            if self.header.fixed_weights {
                // All neighbors share one value; persist only the first.
                let mut w = weights[0];
                if self.header.row_standard {
                    w /= unstandardized_sum;
                }
                self.sink.write_all(&w.to_le_bytes())?;
            } else if self.header.row_standard {
                for w in weights {
                    self.sink.write_all(&(w / unstandardized_sum).to_le_bytes())?;
                }
            } else {
                for w in weights {
                    self.sink.write_all(&w.to_le_bytes())?;
                }
            }
            self.sink.write_all(&unstandardized_sum.to_le_bytes())?;
        } else {
            self.no_neighbor_ids.push(id);
        }

        self.records_written += 1;
        self.num_non_zero += nn;
        self.min_neighbors = self.min_neighbors.min(nn);
        self.max_neighbors = self.max_neighbors.max(nn);
        Ok(nn)
    }

    /// Flush, close the store and return its connectivity summary.
    ///
    /// Fails if fewer records were written than the header declared; a
    /// short store would be reported as corrupt by every reader.
    pub fn finish(mut self) -> Result<SwmCharacteristics> {
        if self.records_written != self.header.entity_count {
            return Err(Error::CorruptStore(format!(
                "wrote {} of {} declared entity records",
                self.records_written, self.header.entity_count
            )));
        }
        self.sink.flush()?;
        Ok(SwmCharacteristics {
            entity_count: self.header.entity_count,
            num_non_zero: self.num_non_zero,
            min_neighbors: if self.min_neighbors == usize::MAX {
                0
            } else {
                self.min_neighbors
            },
            max_neighbors: self.max_neighbors,
            no_neighbor_ids: std::mem::take(&mut self.no_neighbor_ids),
        })
    }
}

fn format_optional(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v}"),
        None => NO_VALUE.to_string(),
    }
}

fn header_line(header: &SwmHeader) -> String {
    let fields = [
        format!("VERSION@{}", header.version),
        format!("UNIQUEID@{}", header.unique_id_field),
        format!("SPATIALREFNAME@{}", header.spatial_ref),
        format!("INPUTFC@{}", header.input_dataset),
        format!("WTYPE@{}", header.weight_type.tag()),
        format!("DISTANCEMETHOD@{}", header.distance_method),
        format!("EXPONENT@{}", format_optional(header.exponent)),
        format!("THRESHOLD@{}", format_optional(header.threshold)),
        format!(
            "NUMNEIGHS@{}",
            match header.num_neighs {
                Some(k) => k.to_string(),
                None => NO_VALUE.to_string(),
            }
        ),
        format!("FIXEDWEIGHTS@{}", header.fixed_weights),
    ];
    let mut line = fields.join(";");
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swm::{SwmReader, WeightType};
    use approx::assert_relative_eq;

    #[test]
    fn test_roundtrip_variable_weights() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("var.swm");
        let header = SwmHeader::new("OID", WeightType::InverseDistance, 3, false);
        let mut writer = SwmWriter::create(&path, header).unwrap();
        writer.write_entry(10, &[20, 30], &[0.5, 0.25]).unwrap();
        writer.write_entry(20, &[10], &[2.0]).unwrap();
        writer.write_entry(30, &[], &[]).unwrap();
        let chars = writer.finish().unwrap();
        assert_eq!(chars.num_non_zero, 3);
        assert_eq!(chars.max_neighbors, 2);
        assert_eq!(chars.no_neighbor_ids, vec![30]);

        let mut reader = SwmReader::open(&path).unwrap();
        assert_eq!(reader.entity_count(), 3);
        assert!(!reader.row_standard());

        let e = reader.read_entry().unwrap();
        assert_eq!(e.id, 10);
        assert_eq!(e.neighbor_ids, vec![20, 30]);
        assert_eq!(e.weights, vec![0.5, 0.25]);
        assert_relative_eq!(e.unstandardized_sum, 0.75);

        let e = reader.read_entry().unwrap();
        assert_eq!(e.id, 20);
        assert_eq!(e.weights, vec![2.0]);

        let e = reader.read_entry().unwrap();
        assert_eq!(e.id, 30);
        assert_eq!(e.neighbor_count(), 0);
        assert_relative_eq!(e.unstandardized_sum, 0.0);

        // Reading past the declared count is framing corruption.
        assert!(matches!(reader.read_entry(), Err(Error::CorruptStore(_))));
    }

    #[test]
    fn test_roundtrip_row_standardized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("std.swm");
        let header = SwmHeader::new("OID", WeightType::InverseDistance, 1, true);
        let mut writer = SwmWriter::create(&path, header).unwrap();
        writer.write_entry(1, &[2, 3, 4], &[2.0, 1.0, 1.0]).unwrap();
        writer.finish().unwrap();

        let mut reader = SwmReader::open(&path).unwrap();
        assert!(reader.row_standard());
        let e = reader.read_entry().unwrap();
        assert_relative_eq!(e.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(e.weights[0], 0.5);
        assert_relative_eq!(e.unstandardized_sum, 4.0);
    }

    #[test]
    fn test_roundtrip_fixed_weights() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixed.swm");
        let header = SwmHeader::new("OID", WeightType::FixedDistance, 1, false);
        let mut writer = SwmWriter::create(&path, header).unwrap();
        writer.write_entry(1, &[2, 3], &[1.0, 1.0]).unwrap();
        writer.finish().unwrap();

        let mut reader = SwmReader::open(&path).unwrap();
        assert!(reader.header().fixed_weights);
        let e = reader.read_entry().unwrap();
        assert_eq!(e.weights, vec![1.0, 1.0]);
        assert_relative_eq!(e.unstandardized_sum, 2.0);
    }

    #[test]
    fn test_truncated_store_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trunc.swm");
        let header = SwmHeader::new("OID", WeightType::InverseDistance, 2, false);
        let mut writer = SwmWriter::create(&path, header).unwrap();
        writer.write_entry(1, &[2], &[1.0]).unwrap();
        // Dropping without the second record leaves a short store.
        assert!(matches!(writer.finish(), Err(Error::CorruptStore(_))));
    }

    #[test]
    fn test_short_stream_detected_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.swm");
        {
            let header = SwmHeader::new("OID", WeightType::InverseDistance, 2, false);
            let mut writer = SwmWriter::create(&path, header).unwrap();
            writer.write_entry(1, &[2], &[1.0]).unwrap();
            // Abandon the writer so only one record lands on disk.
        }
        let mut reader = SwmReader::open(&path).unwrap();
        reader.read_entry().unwrap();
        assert!(matches!(reader.read_entry(), Err(Error::CorruptStore(_))));
    }

    #[test]
    fn test_mismatched_arrays_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.swm");
        let header = SwmHeader::new("OID", WeightType::InverseDistance, 1, false);
        let mut writer = SwmWriter::create(&path, header).unwrap();
        assert!(writer.write_entry(1, &[2, 3], &[1.0]).is_err());
    }
}
