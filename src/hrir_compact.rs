//! Reader and writer for the compact HRIR binary, the on-device format the
//! pipeline actually ships. The layout is little-endian throughout:
//!
//! ```text
//! magic[8]        = "HRIRBIN1"
//! version: i32    = 1
//! sample_rate: i32
//! tap_count: i32
//! entry_count: i32
//! then entry_count records of:
//!   azimuth: f32
//!   elevation: f32
//!   left[tap_count]:  i16   (dequantized by 1/32768)
//!   right[tap_count]: i16
//! ```
//!
//! Any malformed input becomes a [`CompactHrirError`] the caller is expected
//! to downgrade to "no database"; the engine then falls back to stereo
//! panning.

use crate::hrir::{HrirDatabase, HrirEntry};
use nom::{
    multi::count,
    number::complete::{le_f32, le_i16, le_i32},
    sequence::pair,
    IResult,
};
use std::{fmt, fs, io::Write, path::Path};

const MAGIC: &[u8; 8] = b"HRIRBIN1";
const VERSION: i32 = 1;
const HEADER_LEN: usize = 24;

const QUANT_SCALE: f32 = 32768.0;

/// Everything that can go wrong loading or writing a compact database.
#[derive(Debug)]
pub enum CompactHrirError {
    /// File could not be read or written.
    Io(std::io::Error),
    /// The first eight bytes were not the expected magic.
    BadMagic,
    /// A version this reader does not understand.
    UnsupportedVersion(i32),
    /// A header field that must be positive was not.
    NonPositiveField(&'static str, i32),
    /// The file is shorter than the header claims.
    Truncated { expected: usize, actual: usize },
    /// The tap sequences fed to the encoder did not match the header length.
    TapLengthMismatch,
    /// Leftover parse failure inside the entry records.
    Parse,
}

impl fmt::Display for CompactHrirError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use CompactHrirError as E;
        match self {
            E::Io(error) => write!(f, "io error: {}", error),
            E::BadMagic => write!(f, "not a compact HRIR file (bad magic)"),
            E::UnsupportedVersion(v) => write!(f, "unsupported compact HRIR version {}", v),
            E::NonPositiveField(name, v) => {
                write!(f, "header field {} must be positive, got {}", name, v)
            }
            E::Truncated { expected, actual } => {
                write!(f, "file truncated: need {} bytes, have {}", expected, actual)
            }
            E::TapLengthMismatch => write!(f, "entry tap sequences disagree with tap count"),
            E::Parse => write!(f, "malformed entry records"),
        }
    }
}

impl std::error::Error for CompactHrirError {}

impl From<std::io::Error> for CompactHrirError {
    fn from(error: std::io::Error) -> Self {
        CompactHrirError::Io(error)
    }
}

/// Loads a compact database from disk.
pub fn load_compact_hrir(path: impl AsRef<Path>) -> Result<HrirDatabase, CompactHrirError> {
    let bytes = fs::read(path)?;
    decode_compact_hrir(&bytes)
}

/// Decodes a compact database from an in-memory buffer.
pub fn decode_compact_hrir(bytes: &[u8]) -> Result<HrirDatabase, CompactHrirError> {
    if bytes.len() < HEADER_LEN || &bytes[..8] != MAGIC {
        return Err(CompactHrirError::BadMagic);
    }

    let (rest, (version, sample_rate, tap_count, entry_count)) =
        parse_header_fields(&bytes[8..]).map_err(|_: nom::Err<nom::error::Error<&[u8]>>| {
            CompactHrirError::Parse
        })?;

    if version != VERSION {
        return Err(CompactHrirError::UnsupportedVersion(version));
    }
    for (name, value) in [
        ("sample_rate", sample_rate),
        ("tap_count", tap_count),
        ("entry_count", entry_count),
    ] {
        if value <= 0 {
            return Err(CompactHrirError::NonPositiveField(name, value));
        }
    }

    let taps = tap_count as usize;
    let entries = entry_count as usize;
    let expected = HEADER_LEN + entries * (8 + taps * 2 * 2);
    if bytes.len() < expected {
        return Err(CompactHrirError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }

    let (_, parsed) = count(entry_parser(taps), entries)(rest)
        .map_err(|_: nom::Err<nom::error::Error<&[u8]>>| CompactHrirError::Parse)?;

    Ok(HrirDatabase::new(sample_rate as u32, taps, parsed))
}

fn parse_header_fields(input: &[u8]) -> IResult<&[u8], (i32, i32, i32, i32)> {
    let (input, version) = le_i32(input)?;
    let (input, sample_rate) = le_i32(input)?;
    let (input, tap_count) = le_i32(input)?;
    let (input, entry_count) = le_i32(input)?;
    Ok((input, (version, sample_rate, tap_count, entry_count)))
}

fn entry_parser(taps: usize) -> impl Fn(&[u8]) -> IResult<&[u8], HrirEntry> {
    move |input| {
        let (input, (azimuth_deg, elevation_deg)) = pair(le_f32, le_f32)(input)?;
        let (input, left_taps) = count(le_i16, taps)(input)?;
        let (input, right_taps) = count(le_i16, taps)(input)?;
        Ok((
            input,
            HrirEntry {
                azimuth_deg,
                elevation_deg,
                left: left_taps.iter().map(|&t| t as f32 / QUANT_SCALE).collect(),
                right: right_taps.iter().map(|&t| t as f32 / QUANT_SCALE).collect(),
            },
        ))
    }
}

/// Encodes a database into the compact binary layout. Every entry must carry
/// exactly `db.ir_length` taps per ear.
pub fn encode_compact_hrir(db: &HrirDatabase) -> Result<Vec<u8>, CompactHrirError> {
    if db
        .entries
        .iter()
        .any(|e| e.left.len() != db.ir_length || e.right.len() != db.ir_length)
    {
        return Err(CompactHrirError::TapLengthMismatch);
    }

    let mut out = Vec::with_capacity(HEADER_LEN + db.entries.len() * (8 + db.ir_length * 4));
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(db.sample_rate_hz as i32).to_le_bytes());
    out.extend_from_slice(&(db.ir_length as i32).to_le_bytes());
    out.extend_from_slice(&(db.entries.len() as i32).to_le_bytes());

    for entry in &db.entries {
        out.extend_from_slice(&entry.azimuth_deg.to_le_bytes());
        out.extend_from_slice(&entry.elevation_deg.to_le_bytes());
        for &tap in &entry.left {
            out.extend_from_slice(&quantize(tap).to_le_bytes());
        }
        for &tap in &entry.right {
            out.extend_from_slice(&quantize(tap).to_le_bytes());
        }
    }

    Ok(out)
}

/// Writes the compact encoding of `db` to `path`.
pub fn write_compact_hrir(
    db: &HrirDatabase,
    path: impl AsRef<Path>,
) -> Result<(), CompactHrirError> {
    let bytes = encode_compact_hrir(db)?;
    let mut file = fs::File::create(path)?;
    file.write_all(&bytes)?;
    Ok(())
}

fn quantize(sample: f32) -> i16 {
    let scaled = (sample.clamp(-1.0, 1.0) * QUANT_SCALE).round();
    scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_db() -> HrirDatabase {
        HrirDatabase::new(
            24000,
            4,
            vec![
                HrirEntry {
                    azimuth_deg: -30.0,
                    elevation_deg: 0.0,
                    left: vec![0.5, 0.25, -0.125, 0.0],
                    right: vec![0.1, 0.05, -0.025, 0.0],
                },
                HrirEntry {
                    azimuth_deg: 90.0,
                    elevation_deg: 15.0,
                    left: vec![1.0, -1.0, 0.75, -0.75],
                    right: vec![0.0, 0.5, -0.5, 0.25],
                },
            ],
        )
    }

    #[test]
    fn round_trip_preserves_directions_and_taps() {
        let db = sample_db();
        let bytes = encode_compact_hrir(&db).unwrap();
        let reloaded = decode_compact_hrir(&bytes).unwrap();

        assert_eq!(reloaded.sample_rate_hz, db.sample_rate_hz);
        assert_eq!(reloaded.ir_length, db.ir_length);
        assert_eq!(reloaded.entries.len(), db.entries.len());
        for (original, loaded) in db.entries.iter().zip(&reloaded.entries) {
            assert_eq!(original.azimuth_deg, loaded.azimuth_deg);
            assert_eq!(original.elevation_deg, loaded.elevation_deg);
            let tolerance = 1.0 / 32768.0;
            for (a, b) in original.left.iter().zip(&loaded.left) {
                assert!((a - b).abs() <= tolerance, "left tap {} vs {}", a, b);
            }
            for (a, b) in original.right.iter().zip(&loaded.right) {
                assert!((a - b).abs() <= tolerance, "right tap {} vs {}", a, b);
            }
        }
    }

    #[test]
    fn round_trip_through_a_file() {
        let db = sample_db();
        let file = tempfile::NamedTempFile::new().unwrap();
        write_compact_hrir(&db, file.path()).unwrap();
        let reloaded = load_compact_hrir(file.path()).unwrap();
        assert_eq!(reloaded.entries.len(), 2);
        assert_eq!(reloaded.entries[1].azimuth_deg, 90.0);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = encode_compact_hrir(&sample_db()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            decode_compact_hrir(&bytes),
            Err(CompactHrirError::BadMagic)
        ));
    }

    #[test]
    fn rejects_wrong_version() {
        let mut bytes = encode_compact_hrir(&sample_db()).unwrap();
        bytes[8] = 2;
        assert!(matches!(
            decode_compact_hrir(&bytes),
            Err(CompactHrirError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn rejects_truncated_entries() {
        let bytes = encode_compact_hrir(&sample_db()).unwrap();
        let cut = &bytes[..bytes.len() - 3];
        assert!(matches!(
            decode_compact_hrir(cut),
            Err(CompactHrirError::Truncated { .. })
        ));
    }

    #[test]
    fn rejects_non_positive_header_fields() {
        let mut bytes = encode_compact_hrir(&sample_db()).unwrap();
        // Zero out the tap count.
        bytes[16..20].copy_from_slice(&0i32.to_le_bytes());
        assert!(matches!(
            decode_compact_hrir(&bytes),
            Err(CompactHrirError::NonPositiveField("tap_count", 0))
        ));
    }

    #[test]
    fn quantization_clamps_out_of_range_taps() {
        let db = HrirDatabase::new(
            8000,
            1,
            vec![HrirEntry {
                azimuth_deg: 0.0,
                elevation_deg: 0.0,
                left: vec![2.0],
                right: vec![-2.0],
            }],
        );
        let reloaded = decode_compact_hrir(&encode_compact_hrir(&db).unwrap()).unwrap();
        assert!(reloaded.entries[0].left[0] <= 1.0);
        assert!(reloaded.entries[0].right[0] >= -1.0);
    }
}
