//! Sequential reader over a spatial weights store

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::{Error, Result};
use crate::swm::{SwmEntry, SwmHeader, WeightType, NO_VALUE};
use crate::values::EntityId;

/// Forward-only reader over the entity records of an SWM file.
///
/// Records come back in the exact order they were written; callers needing
/// a subset of entities must read every record and filter by id membership.
/// The underlying file handle is released when the reader is dropped,
/// including on error paths.
pub struct SwmReader {
    source: BufReader<File>,
    header: SwmHeader,
    entries_read: usize,
}

impl SwmReader {
    /// Open a store and decode its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut source = BufReader::new(file);

        let mut line = String::new();
        source.read_line(&mut line).map_err(|_| {
            Error::CorruptStore("header line is not valid text".to_string())
        })?;
        let mut header = parse_header_line(line.trim_end())?;

        header.entity_count = read_i32(&mut source)? as usize;
        header.row_standard = read_i32(&mut source)? != 0;

        Ok(Self {
            source,
            header,
            entries_read: 0,
        })
    }

    /// Store-level metadata.
    pub fn header(&self) -> &SwmHeader {
        &self.header
    }

    /// Declared number of entity records.
    pub fn entity_count(&self) -> usize {
        self.header.entity_count
    }

    /// Whether the stored weights are row-standardized.
    pub fn row_standard(&self) -> bool {
        self.header.row_standard
    }

    /// Number of records decoded so far.
    pub fn entries_read(&self) -> usize {
        self.entries_read
    }

    /// Decode the next entity record.
    ///
    /// Fails with `Error::CorruptStore` if the stream ends mid-record, if a
    /// record declares a negative neighbor count, or if the caller reads
    /// past the declared entity count. No recovery by byte-skipping is
    /// attempted.
    pub fn read_entry(&mut self) -> Result<SwmEntry> {
        if self.entries_read >= self.header.entity_count {
            return Err(Error::CorruptStore(format!(
                "attempted to read record {} of a store declaring {} entities",
                self.entries_read + 1,
                self.header.entity_count
            )));
        }

        let id = read_i32(&mut self.source)? as EntityId;
        let nn = read_i32(&mut self.source)?;
        if nn < 0 {
            return Err(Error::CorruptStore(format!(
                "entity {id} declares a negative neighbor count ({nn})"
            )));
        }
        let nn = nn as usize;

        let entry = if nn == 0 {
            SwmEntry {
                id,
                neighbor_ids: Vec::new(),
                weights: Vec::new(),
                unstandardized_sum: 0.0,
            }
        } else {
            let mut neighbor_ids = Vec::with_capacity(nn);
            for _ in 0..nn {
                neighbor_ids.push(read_i32(&mut self.source)? as EntityId);
            }
            let weights = if self.header.fixed_weights {
                // One shared weight, broadcast to every neighbor.
                let w = read_f64(&mut self.source)?;
                vec![w; nn]
            } else {
                let mut weights = Vec::with_capacity(nn);
                for _ in 0..nn {
                    weights.push(read_f64(&mut self.source)?);
                }
                weights
            };
            let unstandardized_sum = read_f64(&mut self.source)?;
            SwmEntry {
                id,
                neighbor_ids,
                weights,
                unstandardized_sum,
            }
        };

        self.entries_read += 1;
        Ok(entry)
    }

    /// Iterate over the remaining records.
    pub fn entries(&mut self) -> Entries<'_> {
        Entries { reader: self }
    }
}

/// Iterator over the remaining records of an `SwmReader`.
pub struct Entries<'a> {
    reader: &'a mut SwmReader,
}

impl Iterator for Entries<'_> {
    type Item = Result<SwmEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.reader.entries_read >= self.reader.header.entity_count {
            return None;
        }
        Some(self.reader.read_entry())
    }
}

fn read_i32<R: Read>(source: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    read_exact_framed(source, &mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_f64<R: Read>(source: &mut R) -> Result<f64> {
    let mut buf = [0u8; 8];
    read_exact_framed(source, &mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn read_exact_framed<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<()> {
    source.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::CorruptStore("stream ended before the declared records were read".to_string())
        } else {
            Error::Io(e)
        }
    })
}

/// Parse the `KEY@VALUE;KEY@VALUE;...` header line.
///
/// Unknown keys are ignored so stores written by newer versions stay
/// readable; missing keys fall back to placeholder values.
fn parse_header_line(line: &str) -> Result<SwmHeader> {
    let mut header = SwmHeader {
        version: String::new(),
        unique_id_field: String::new(),
        spatial_ref: NO_VALUE.to_string(),
        input_dataset: NO_VALUE.to_string(),
        weight_type: WeightType::Unknown(-1),
        distance_method: NO_VALUE.to_string(),
        exponent: None,
        threshold: None,
        num_neighs: None,
        fixed_weights: false,
        row_standard: false,
        entity_count: 0,
    };

    let mut saw_version = false;
    for field in line.split(';') {
        let Some((key, value)) = field.split_once('@') else {
            return Err(Error::CorruptStore(format!(
                "malformed header field: {field:?}"
            )));
        };
        match key {
            "VERSION" => {
                header.version = value.to_string();
                saw_version = true;
            }
            "UNIQUEID" => header.unique_id_field = value.to_string(),
            "SPATIALREFNAME" => header.spatial_ref = value.to_string(),
            "INPUTFC" => header.input_dataset = value.to_string(),
            "WTYPE" => {
                let tag: i32 = value.parse().map_err(|_| {
                    Error::CorruptStore(format!("non-numeric weight type tag: {value:?}"))
                })?;
                header.weight_type = WeightType::from_tag(tag);
            }
            "DISTANCEMETHOD" => header.distance_method = value.to_string(),
            "EXPONENT" => header.exponent = parse_optional(value),
            "THRESHOLD" => header.threshold = parse_optional(value),
            "NUMNEIGHS" => {
                header.num_neighs = parse_optional::<f64>(value).map(|v| v as usize)
            }
            "FIXEDWEIGHTS" => header.fixed_weights = value.eq_ignore_ascii_case("true"),
            _ => {}
        }
    }

    if !saw_version {
        return Err(Error::CorruptStore(
            "header line has no VERSION field".to_string(),
        ));
    }
    Ok(header)
}

fn parse_optional<T: std::str::FromStr>(value: &str) -> Option<T> {
    if value == NO_VALUE {
        None
    } else {
        value.parse().ok()
    }
}
