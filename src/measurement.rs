//! Loader for generic acoustic-measurement documents, the interchange shape
//! the heavier research formats (SOFA and friends) boil down to once their
//! container is stripped away: a `SourcePosition` array of `[M, >=2]`
//! directions, a `Data.IR` array of `[M, R>=2, N]` impulse responses, and a
//! `Data.SamplingRate` scalar. Documents are consumed as JSON value trees;
//! the compact binary in [`crate::hrir_compact`] is the format that actually
//! ships on device.

use crate::geo::normalize_signed_180;
use crate::hrir::{HrirDatabase, HrirEntry};
use serde_json::Value;
use std::{fmt, fs, path::Path};

/// Upper bound on the decoded impulse-response payload. Bounds the memory a
/// hostile or corrupt document can make us stage.
pub const MAX_IR_PAYLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug)]
pub enum MeasurementError {
    Io(std::io::Error),
    Json(serde_json::Error),
    MissingField(&'static str),
    /// A field whose nesting does not match the expected shape.
    BadShape(&'static str),
    /// The impulse-response payload would exceed [`MAX_IR_PAYLOAD_BYTES`].
    PayloadTooLarge { estimated: usize },
    /// A value inside a numeric array was not a number.
    NonNumeric(&'static str),
}

impl fmt::Display for MeasurementError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use MeasurementError as E;
        match self {
            E::Io(error) => write!(f, "io error: {}", error),
            E::Json(error) => write!(f, "json error: {}", error),
            E::MissingField(name) => write!(f, "missing field {}", name),
            E::BadShape(name) => write!(f, "unexpected shape for {}", name),
            E::PayloadTooLarge { estimated } => {
                write!(f, "impulse response payload too large ({} bytes)", estimated)
            }
            E::NonNumeric(name) => write!(f, "non-numeric value inside {}", name),
        }
    }
}

impl std::error::Error for MeasurementError {}

impl From<std::io::Error> for MeasurementError {
    fn from(error: std::io::Error) -> Self {
        MeasurementError::Io(error)
    }
}

impl From<serde_json::Error> for MeasurementError {
    fn from(error: serde_json::Error) -> Self {
        MeasurementError::Json(error)
    }
}

/// Reads and validates a measurement document from disk.
pub fn load_measurement_document(
    path: impl AsRef<Path>,
) -> Result<HrirDatabase, MeasurementError> {
    let bytes = fs::read(path)?;
    let doc: Value = serde_json::from_slice(&bytes)?;
    database_from_document(&doc)
}

/// Builds an [`HrirDatabase`] from an already-parsed document.
pub fn database_from_document(doc: &Value) -> Result<HrirDatabase, MeasurementError> {
    let positions = doc
        .get("SourcePosition")
        .ok_or(MeasurementError::MissingField("SourcePosition"))?
        .as_array()
        .ok_or(MeasurementError::BadShape("SourcePosition"))?;
    let ir = doc
        .get("Data.IR")
        .ok_or(MeasurementError::MissingField("Data.IR"))?
        .as_array()
        .ok_or(MeasurementError::BadShape("Data.IR"))?;
    let rate_value = doc
        .get("Data.SamplingRate")
        .ok_or(MeasurementError::MissingField("Data.SamplingRate"))?;

    let sample_rate = first_number(rate_value)
        .ok_or(MeasurementError::NonNumeric("Data.SamplingRate"))? as u32;
    if sample_rate == 0 {
        return Err(MeasurementError::BadShape("Data.SamplingRate"));
    }

    if positions.len() != ir.len() || ir.is_empty() {
        return Err(MeasurementError::BadShape("Data.IR"));
    }

    // Shape inspection before any flattening, so the payload cap applies to
    // the declared size rather than what we managed to stage.
    let receivers = ir[0]
        .as_array()
        .ok_or(MeasurementError::BadShape("Data.IR"))?
        .len();
    if receivers < 2 {
        return Err(MeasurementError::BadShape("Data.IR"));
    }
    let taps = ir[0].as_array().unwrap()[0]
        .as_array()
        .ok_or(MeasurementError::BadShape("Data.IR"))?
        .len();
    if taps == 0 {
        return Err(MeasurementError::BadShape("Data.IR"));
    }

    let estimated = ir.len() * receivers * taps * std::mem::size_of::<f32>();
    if estimated > MAX_IR_PAYLOAD_BYTES {
        return Err(MeasurementError::PayloadTooLarge { estimated });
    }

    let mut entries = Vec::with_capacity(ir.len());
    for (position, measurement) in positions.iter().zip(ir) {
        let position = position
            .as_array()
            .ok_or(MeasurementError::BadShape("SourcePosition"))?;
        if position.len() < 2 {
            return Err(MeasurementError::BadShape("SourcePosition"));
        }
        let azimuth = first_number(&position[0])
            .ok_or(MeasurementError::NonNumeric("SourcePosition"))? as f32;
        let elevation = first_number(&position[1])
            .ok_or(MeasurementError::NonNumeric("SourcePosition"))? as f32;

        // Flatten the whole measurement, then slice the first two receivers.
        let mut flat = Vec::with_capacity(receivers * taps);
        flatten_numbers(measurement, &mut flat)?;
        if flat.len() < 2 * taps {
            return Err(MeasurementError::BadShape("Data.IR"));
        }

        entries.push(HrirEntry {
            azimuth_deg: azimuth,
            elevation_deg: elevation,
            left: flat[..taps].to_vec(),
            right: flat[taps..2 * taps].to_vec(),
        });
    }

    Ok(HrirDatabase::new(sample_rate, taps, entries))
}

/// Collapses measurements that land in the same azimuth/elevation bin,
/// keeping the first one seen. Used when converting a dense measurement set
/// into the compact on-device database.
pub fn collapse_direction_bins(
    entries: Vec<HrirEntry>,
    az_step_deg: f32,
    el_step_deg: f32,
) -> Vec<HrirEntry> {
    let mut seen: Vec<(i32, i32)> = Vec::new();
    let mut kept = Vec::new();
    for entry in entries {
        let key = (
            (normalize_signed_180(entry.azimuth_deg) / az_step_deg).round() as i32,
            (entry.elevation_deg / el_step_deg).round() as i32,
        );
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        kept.push(entry);
    }
    kept
}

fn flatten_numbers(value: &Value, out: &mut Vec<f32>) -> Result<(), MeasurementError> {
    match value {
        Value::Number(n) => {
            out.push(n.as_f64().ok_or(MeasurementError::NonNumeric("Data.IR"))? as f32);
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                flatten_numbers(item, out)?;
            }
            Ok(())
        }
        _ => Err(MeasurementError::NonNumeric("Data.IR")),
    }
}

fn first_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Array(items) => items.iter().find_map(first_number),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_entry_doc() -> Value {
        json!({
            "SourcePosition": [[0.0, 0.0, 1.2], [90.0, 15.0, 1.2]],
            "Data.IR": [
                [[0.5, 0.25], [0.1, 0.05]],
                [[0.0, 1.0], [1.0, 0.0]]
            ],
            "Data.SamplingRate": [48000.0]
        })
    }

    #[test]
    fn loads_a_well_formed_document() {
        let db = database_from_document(&two_entry_doc()).unwrap();
        assert_eq!(db.sample_rate_hz, 48000);
        assert_eq!(db.ir_length, 2);
        assert_eq!(db.entries.len(), 2);
        assert_eq!(db.entries[0].left, vec![0.5, 0.25]);
        assert_eq!(db.entries[0].right, vec![0.1, 0.05]);
        assert_eq!(db.entries[1].azimuth_deg, 90.0);
        assert_eq!(db.entries[1].elevation_deg, 15.0);
    }

    #[test]
    fn rejects_single_receiver_measurements() {
        let doc = json!({
            "SourcePosition": [[0.0, 0.0]],
            "Data.IR": [[[0.5, 0.25]]],
            "Data.SamplingRate": 48000
        });
        assert!(matches!(
            database_from_document(&doc),
            Err(MeasurementError::BadShape("Data.IR"))
        ));
    }

    #[test]
    fn rejects_mismatched_position_and_ir_counts() {
        let doc = json!({
            "SourcePosition": [[0.0, 0.0]],
            "Data.IR": [
                [[0.5], [0.1]],
                [[0.2], [0.3]]
            ],
            "Data.SamplingRate": 48000
        });
        assert!(database_from_document(&doc).is_err());
    }

    #[test]
    fn rejects_short_position_rows() {
        let doc = json!({
            "SourcePosition": [[0.0]],
            "Data.IR": [[[0.5], [0.1]]],
            "Data.SamplingRate": 48000
        });
        assert!(matches!(
            database_from_document(&doc),
            Err(MeasurementError::BadShape("SourcePosition"))
        ));
    }

    #[test]
    fn rejects_non_numeric_taps() {
        let doc = json!({
            "SourcePosition": [[0.0, 0.0]],
            "Data.IR": [[["x", 0.25], [0.1, 0.05]]],
            "Data.SamplingRate": 48000
        });
        assert!(matches!(
            database_from_document(&doc),
            Err(MeasurementError::NonNumeric(_))
        ));
    }

    #[test]
    fn sampling_rate_unwraps_nested_scalars() {
        let mut doc = two_entry_doc();
        doc["Data.SamplingRate"] = json!([[24000.0]]);
        let db = database_from_document(&doc).unwrap();
        assert_eq!(db.sample_rate_hz, 24000);
    }

    #[test]
    fn direction_bins_keep_first_measurement() {
        let entries = vec![
            HrirEntry {
                azimuth_deg: 0.0,
                elevation_deg: 0.0,
                left: vec![1.0],
                right: vec![1.0],
            },
            HrirEntry {
                azimuth_deg: 0.4,
                elevation_deg: 0.4,
                left: vec![2.0],
                right: vec![2.0],
            },
            HrirEntry {
                azimuth_deg: 10.0,
                elevation_deg: 0.0,
                left: vec![3.0],
                right: vec![3.0],
            },
        ];
        let kept = collapse_direction_bins(entries, 3.0, 3.0);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].left, vec![1.0]);
        assert_eq!(kept[1].left, vec![3.0]);
    }
}
