//! Name and flag validation. Pure functions, no I/O.

use crate::errors::{ConfigurationError, ProvisionError};
use regex::Regex;
use std::sync::LazyLock;

/// Repository path of a container image reference, e.g. `team/web`.
#[allow(clippy::expect_used)]
pub static IMAGE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*(?:/[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*)*$")
        .expect("valid regex")
});

/// Tag part of a container image reference.
#[allow(clippy::expect_used)]
pub static IMAGE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").expect("valid regex")
});

/// DNS-1123 label, used for releases and namespaces.
#[allow(clippy::expect_used)]
pub static DNS_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid regex")
});

/// Helm refuses release names longer than this.
pub const MAX_RELEASE_NAME: usize = 53;
/// Kubernetes namespace length limit.
pub const MAX_NAMESPACE: usize = 63;

fn invalid(field: &str, message: String, hint: &str) -> ProvisionError {
    ConfigurationError::new(message)
        .with_field(field)
        .with_fix_hint(hint)
        .into()
}

/// Requires a non-blank value.
pub fn require(field: &str, value: &str) -> Result<(), ProvisionError> {
    if value.trim().is_empty() {
        return Err(invalid(
            field,
            format!("{field} is required"),
            "Pass a non-empty value.",
        ));
    }
    Ok(())
}

pub fn image_name(field: &str, value: &str) -> Result<(), ProvisionError> {
    require(field, value)?;
    if !IMAGE_NAME_RE.is_match(value) {
        return Err(invalid(
            field,
            format!("'{value}' is not a valid image name"),
            "Use lowercase letters, digits, '.', '_', '-' and '/'.",
        ));
    }
    Ok(())
}

pub fn image_tag(field: &str, value: &str) -> Result<(), ProvisionError> {
    if !IMAGE_TAG_RE.is_match(value) {
        return Err(invalid(
            field,
            format!("'{value}' is not a valid image tag"),
            "Tags are up to 128 letters, digits, '_', '.' or '-', not starting with '.' or '-'.",
        ));
    }
    Ok(())
}

/// Validates a DNS-1123 label of at most `max` characters.
pub fn dns_label(field: &str, value: &str, max: usize) -> Result<(), ProvisionError> {
    require(field, value)?;
    if value.len() > max || !DNS_LABEL_RE.is_match(value) {
        return Err(invalid(
            field,
            format!("'{value}' is not a valid {field}"),
            &format!("Use at most {max} lowercase letters, digits and '-', starting and ending alphanumeric."),
        ));
    }
    Ok(())
}

/// Splits `KEY=VALUE`. The key must be non-empty; the value may be empty.
pub fn key_value(field: &str, raw: &str) -> Result<(String, String), ProvisionError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(invalid(
            field,
            format!("'{raw}' is not a KEY=VALUE pair"),
            &format!("Pass {field} as KEY=VALUE."),
        )),
    }
}

/// Parses every entry with [`key_value`].
pub fn key_values(field: &str, raw: &[String]) -> Result<Vec<(String, String)>, ProvisionError> {
    raw.iter().map(|entry| key_value(field, entry)).collect()
}
