//! Embedded metadata timestamps.
//!
//! A [`MetadataExtractor`] turns a file into a flat map of field names to
//! [`MetadataValue`]s. The organizer only cares about one thing in that map:
//! the original capture time, looked up by [`capture_time`].
//!
//! [`ExifSession`] is the extractor used by the binary. It is created once per
//! run, handed to the placement policy by reference and dropped when the run
//! ends.

use chrono::NaiveDateTime;
use exif::{In, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Field names that may carry the capture time, most preferred first.
pub const CAPTURE_TIME_FIELDS: [&str; 5] = [
    "DateTimeOriginal",
    "CreateDate",
    "DateTimeDigitized",
    "ModifyDate",
    "DateTime",
];

/// Layout of EXIF date strings, e.g. `2023:06:15 10:42:07`.
const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Length of an EXIF date string without sub-seconds or offset.
const EXIF_DATE_LEN: usize = 19;

/// Errors raised while reading metadata from a file.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no readable EXIF data in {}: {source}", path.display())]
    Exif {
        path: PathBuf,
        #[source]
        source: exif::Error,
    },
    #[error("{} is not an image with embedded metadata", path.display())]
    Unsupported { path: PathBuf },
    #[error("no capture date field found")]
    NoDateField,
    #[error("cannot parse capture date '{0}'")]
    UnparsableDate(String),
}

/// A single metadata field value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl fmt::Display for MetadataValue {
    /// Text is written verbatim, integers in base 10 and floats as the
    /// shortest decimal that round-trips, without an exponent.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Text(text) => f.write_str(text),
            MetadataValue::Integer(value) => write!(f, "{}", value),
            MetadataValue::Float(value) => write!(f, "{}", value),
        }
    }
}

/// Field name to value mapping produced by an extractor.
pub type MetadataFields = BTreeMap<String, MetadataValue>;

/// Source of embedded metadata for a file.
pub trait MetadataExtractor {
    fn extract(&mut self, path: &Path) -> Result<MetadataFields, MetadataError>;
}

/// Picks the capture time out of extracted fields.
///
/// Fields are tried in [`CAPTURE_TIME_FIELDS`] order. Only the first 19
/// characters of the value are parsed, which drops sub-seconds and offsets.
///
/// # Examples
///
/// ```
/// use datetidy::metadata::{capture_time, MetadataFields, MetadataValue};
///
/// let mut fields = MetadataFields::new();
/// fields.insert(
///     "DateTimeOriginal".to_string(),
///     MetadataValue::Text("2023:06:15 10:42:07+02:00".to_string()),
/// );
/// let taken = capture_time(&fields).unwrap();
/// assert_eq!(taken.to_string(), "2023-06-15 10:42:07");
/// ```
pub fn capture_time(fields: &MetadataFields) -> Result<NaiveDateTime, MetadataError> {
    let value = CAPTURE_TIME_FIELDS
        .iter()
        .find_map(|name| fields.get(*name))
        .ok_or(MetadataError::NoDateField)?;

    let text = value.to_string();
    let trimmed = match text.char_indices().nth(EXIF_DATE_LEN) {
        Some((end, _)) => &text[..end],
        None => text.as_str(),
    };

    NaiveDateTime::parse_from_str(trimmed, EXIF_DATE_FORMAT)
        .map_err(|_| MetadataError::UnparsableDate(text.clone()))
}

/// EXIF reader kept open for the length of a run.
pub struct ExifSession {
    reader: exif::Reader,
}

impl ExifSession {
    pub fn new() -> Self {
        Self {
            reader: exif::Reader::new(),
        }
    }

    /// Rejects files whose content does not sniff as an image.
    fn ensure_image(path: &Path) -> Result<(), MetadataError> {
        let kind = infer::get_from_path(path).map_err(|source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match kind {
            Some(kind) if kind.matcher_type() == infer::MatcherType::Image => Ok(()),
            _ => Err(MetadataError::Unsupported {
                path: path.to_path_buf(),
            }),
        }
    }
}

impl Default for ExifSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataExtractor for ExifSession {
    fn extract(&mut self, path: &Path) -> Result<MetadataFields, MetadataError> {
        Self::ensure_image(path)?;

        let file = File::open(path).map_err(|source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        let exif = self
            .reader
            .read_from_container(&mut reader)
            .map_err(|source| MetadataError::Exif {
                path: path.to_path_buf(),
                source,
            })?;

        let fields: MetadataFields = exif
            .fields()
            .filter(|field| field.ifd_num == In::PRIMARY)
            .filter_map(|field| {
                convert_value(&field.value).map(|value| (field.tag.to_string(), value))
            })
            .collect();
        debug!(path = %path.display(), fields = fields.len(), "extracted EXIF fields");

        Ok(fields)
    }
}

/// Converts the first component of an EXIF value into a [`MetadataValue`].
fn convert_value(value: &Value) -> Option<MetadataValue> {
    match value {
        Value::Ascii(parts) => parts
            .first()
            .map(|bytes| MetadataValue::Text(String::from_utf8_lossy(bytes).trim().to_string())),
        Value::Byte(v) => v.first().map(|x| MetadataValue::Integer(i64::from(*x))),
        Value::Short(v) => v.first().map(|x| MetadataValue::Integer(i64::from(*x))),
        Value::Long(v) => v.first().map(|x| MetadataValue::Integer(i64::from(*x))),
        Value::SByte(v) => v.first().map(|x| MetadataValue::Integer(i64::from(*x))),
        Value::SShort(v) => v.first().map(|x| MetadataValue::Integer(i64::from(*x))),
        Value::SLong(v) => v.first().map(|x| MetadataValue::Integer(i64::from(*x))),
        Value::Rational(v) => v.first().map(|x| MetadataValue::Float(x.to_f64())),
        Value::SRational(v) => v.first().map(|x| MetadataValue::Float(x.to_f64())),
        Value::Float(v) => v.first().map(|x| MetadataValue::Float(f64::from(*x))),
        Value::Double(v) => v.first().map(|x| MetadataValue::Float(*x)),
        _ => None,
    }
}
