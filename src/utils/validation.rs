use crate::utils::error::{Result, ShipError};
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::path::{Component, Path};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn rejected(field: &str, value: impl Display, reason: impl Into<String>) -> ShipError {
    ShipError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Carrier base URL: http(s) with a host. Endpoint names are appended to it,
/// so a query string or fragment would end up in the middle of every request.
pub fn validate_api_url(field: &str, raw: &str) -> Result<()> {
    let url = Url::parse(raw.trim()).map_err(|e| rejected(field, raw, format!("Invalid URL: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(rejected(field, raw, format!("Unsupported URL scheme: {}", url.scheme())));
    }
    if !url.has_host() {
        return Err(rejected(field, raw, "URL has no host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(rejected(field, raw, "Base URL cannot carry a query or fragment"));
    }
    Ok(())
}

/// Directory for state files. Absolute or relative to the working directory.
pub fn validate_data_dir(field: &str, dir: &str) -> Result<()> {
    if dir.trim().is_empty() || dir.contains('\0') {
        return Err(rejected(field, dir, "Directory must be a non-empty path"));
    }
    Ok(())
}

/// A file kept under the data directory; it may not point outside of it.
pub fn validate_data_file(field: &str, name: &str) -> Result<()> {
    validate_data_dir(field, name)?;

    let stays_inside = Path::new(name)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !stays_inside {
        return Err(rejected(field, name, "Must be a relative path inside storage.data_dir"));
    }
    Ok(())
}

/// 金額（lei）：有限且不可為負
pub fn validate_amount(field: &str, lei: f64) -> Result<()> {
    if !lei.is_finite() || lei < 0.0 {
        return Err(rejected(field, lei, "Amount must be a finite, non-negative number of lei"));
    }
    Ok(())
}

pub fn validate_bounded<T: PartialOrd + Display + Copy>(
    field: &str,
    value: T,
    allowed: RangeInclusive<T>,
) -> Result<()> {
    if !allowed.contains(&value) {
        return Err(rejected(
            field,
            value,
            format!("Must be between {} and {}", allowed.start(), allowed.end()),
        ));
    }
    Ok(())
}

/// Settings that are optional in the file but needed by a particular operation.
pub fn require_setting<'a, T>(field: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| ShipError::MissingConfigError {
        field: field.to_string(),
    })
}
