//! Query parameter parsing shared by the picture handlers.
//!
//! Front ends send unset fields as empty strings (`?date=`), so every query
//! field is taken as an optional string and an empty value means absent.
//! Parse failures are validation errors, reported as 400 `VALIDATION_ERROR`.

use chrono::NaiveDate;
use weighbridge_core::error::CoreError;
use weighbridge_core::picture::{self, PictureType};

/// `None` for a missing or empty (after trimming) value.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A required text parameter, kept verbatim.
pub fn required_text(field: &str, value: Option<&str>) -> Result<String, CoreError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
        _ => Err(CoreError::Validation(format!("{field} is required"))),
    }
}

/// An optional text filter, kept verbatim when present.
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).map(str::to_string)
}

/// An optional integer that must be `>= 1`.
pub fn optional_positive(field: &str, value: Option<&str>) -> Result<Option<u32>, CoreError> {
    non_empty(value)
        .map(|raw| {
            let parsed: i64 = raw.parse().map_err(|_| {
                CoreError::Validation(format!("{field} must be an integer, got '{raw}'"))
            })?;
            picture::validate_positive(field, parsed)
        })
        .transpose()
}

/// A required integer that must be `>= 1`.
pub fn required_positive(field: &str, value: Option<&str>) -> Result<u32, CoreError> {
    optional_positive(field, value)?
        .ok_or_else(|| CoreError::Validation(format!("{field} is required")))
}

/// An optional `YYYY-MM-DD` date.
pub fn optional_date(value: Option<&str>) -> Result<Option<NaiveDate>, CoreError> {
    non_empty(value).map(picture::parse_date).transpose()
}

/// An optional picture type code.
pub fn optional_picture_type(value: Option<&str>) -> Result<Option<PictureType>, CoreError> {
    non_empty(value).map(str::parse::<PictureType>).transpose()
}

/// A required picture type code.
pub fn required_picture_type(value: Option<&str>) -> Result<PictureType, CoreError> {
    optional_picture_type(value)?
        .ok_or_else(|| CoreError::Validation("picture_type is required".into()))
}
