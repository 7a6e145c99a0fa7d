//! Picture evidence for weighing tickets.
//!
//! Photographs are addressed purely by where they live on disk:
//!
//! ```text
//! {root}/{TYPE}/{YYYY-MM-DD}/{ticket_number}-CMR{camera}_{sequence}{.ext}
//! ```
//!
//! There is no index. Every query re-reads the directory tree through a
//! [`backend::PictureBackend`], decodes filenames with [`naming`] and filters
//! in memory (see [`store::EvidenceStore`]).

pub mod backend;
pub mod layout;
pub mod naming;
pub mod store;

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Canonical external date format, also the date directory name.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Route prefix of the exact-path viewing endpoint, used to build `image_url`.
pub const VIEW_URL_PREFIX: &str = "/picture/view";

// ---------------------------------------------------------------------------
// Picture type
// ---------------------------------------------------------------------------

/// Ticket category a picture belongs to. The code doubles as the top-level
/// directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PictureType {
    #[serde(rename = "NK")]
    Import,
    #[serde(rename = "CT")]
    RentalWeighing,
    #[serde(rename = "NT")]
    ShipImport,
    #[serde(rename = "XK")]
    Export,
}

impl PictureType {
    /// All types in enumeration order.
    pub const ALL: [PictureType; 4] = [
        PictureType::Import,
        PictureType::RentalWeighing,
        PictureType::ShipImport,
        PictureType::Export,
    ];

    /// Directory / wire code.
    pub fn code(self) -> &'static str {
        match self {
            Self::Import => "NK",
            Self::RentalWeighing => "CT",
            Self::ShipImport => "NT",
            Self::Export => "XK",
        }
    }

    /// Name used by the weighing station software.
    pub fn full_name(self) -> &'static str {
        match self {
            Self::Import => "NhapKho",
            Self::RentalWeighing => "CanThue",
            Self::ShipImport => "NhapTau",
            Self::Export => "XuatKho",
        }
    }

    /// Parse from the exact, case-sensitive code.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    fn allowed_codes() -> String {
        Self::ALL.map(PictureType::code).join(", ")
    }
}

impl fmt::Display for PictureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for PictureType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| {
            CoreError::Validation(format!(
                "Invalid picture type '{s}'. Allowed: {}",
                Self::allowed_codes()
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Keys and records
// ---------------------------------------------------------------------------

/// The business key encoded in a picture's basename.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PictureKey {
    pub ticket_number: String,
    pub camera_number: u32,
    pub sequence: u32,
}

impl PictureKey {
    pub fn new(ticket_number: impl Into<String>, camera_number: u32, sequence: u32) -> Self {
        Self {
            ticket_number: ticket_number.into(),
            camera_number,
            sequence,
        }
    }
}

/// A stored picture, reconstructed from the directory tree on every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidenceRecord {
    pub filename: String,
    pub file_path: String,
    pub image_url: String,
    pub ticket_number: String,
    pub picture_type: PictureType,
    pub camera_number: u32,
    pub sequence: u32,
    pub date: NaiveDate,
    pub file_size: u64,
    pub created_time: Timestamp,
}

/// URL of the exact-path viewing endpoint for a stored picture.
pub fn image_url(picture_type: PictureType, date: NaiveDate, filename: &str) -> String {
    format!(
        "{VIEW_URL_PREFIX}/{}/{}/{filename}",
        picture_type.code(),
        format_date(date)
    )
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Format a date the way it appears in directory names and on the wire.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a strict `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate, CoreError> {
    let invalid =
        || CoreError::Validation(format!("Invalid date '{value}'. Use YYYY-MM-DD"));
    if !layout::is_date_directory_name(value) {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| invalid())
}

/// Validate a camera number or sequence and narrow it to `u32`.
pub fn validate_positive(field: &str, value: i64) -> Result<u32, CoreError> {
    if value < 1 {
        return Err(CoreError::Validation(format!("{field} must be >= 1")));
    }
    u32::try_from(value)
        .map_err(|_| CoreError::Validation(format!("{field} is too large (got {value})")))
}

/// A ticket number ends up inside a filename, so it must be non-empty and
/// must not contain path separators or NUL.
pub fn validate_ticket_number(ticket_number: &str) -> Result<(), CoreError> {
    if ticket_number.is_empty() {
        return Err(CoreError::Validation(
            "ticket_number must not be empty".to_string(),
        ));
    }
    if ticket_number.contains(['/', '\\', '\0']) {
        return Err(CoreError::Validation(format!(
            "ticket_number '{ticket_number}' contains a path separator"
        )));
    }
    Ok(())
}

/// An upload extension is either empty or `.`-prefixed, with no separators.
pub fn validate_extension(extension: &str) -> Result<(), CoreError> {
    if extension.is_empty() {
        return Ok(());
    }
    if !extension.starts_with('.') {
        return Err(CoreError::Validation(format!(
            "Invalid file extension '{extension}'"
        )));
    }
    if extension.contains(['/', '\\', '\0']) || extension[1..].contains('.') {
        return Err(CoreError::Validation(format!(
            "Invalid file extension '{extension}'"
        )));
    }
    Ok(())
}

/// A plain basename: no separators, not `.` or `..`.
pub fn validate_filename(filename: &str) -> Result<(), CoreError> {
    if filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains(['/', '\\', '\0'])
    {
        return Err(CoreError::Validation(format!(
            "Invalid filename '{filename}'"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
