//! Immutable cache contract for the worker script
//!
//! The canonical script must be served with
//! `Cache-Control: public, max-age=31536000, immutable` so every
//! intermediary keeps the exact bytes the version was computed from.

use crate::error::{StickyError, StickyResult};
use crate::net::Response;
use std::fmt;
use tracing::warn;

/// Required `max-age` in seconds (one year)
pub const IMMUTABLE_MAX_AGE: u64 = 31_536_000;

/// One way a `Cache-Control` header falls short
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    NotPublic,
    NotImmutable,
    MaxAge(Option<String>),
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPublic => write!(f, "missing 'public'"),
            Self::NotImmutable => write!(f, "missing 'immutable'"),
            Self::MaxAge(None) => write!(f, "missing 'max-age={}'", IMMUTABLE_MAX_AGE),
            Self::MaxAge(Some(found)) => {
                write!(f, "max-age is {} instead of {}", found, IMMUTABLE_MAX_AGE)
            }
        }
    }
}

/// Compare a `Cache-Control` value against the contract
pub fn check_cache_control(value: Option<&str>) -> Vec<ContractViolation> {
    let directives: Vec<String> = value
        .unwrap_or_default()
        .split(',')
        .map(|d| d.trim().to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .collect();

    let mut violations = Vec::new();
    if !directives.iter().any(|d| d == "public") {
        violations.push(ContractViolation::NotPublic);
    }

    let max_age = directives
        .iter()
        .find_map(|d| d.strip_prefix("max-age="))
        .map(|v| v.trim().trim_matches('"').to_string());
    match max_age {
        Some(age) if age.parse::<u64>().ok() == Some(IMMUTABLE_MAX_AGE) => {}
        other => violations.push(ContractViolation::MaxAge(other)),
    }

    if !directives.iter().any(|d| d == "immutable") {
        violations.push(ContractViolation::NotImmutable);
    }
    violations
}

/// Check a script response; strict mode turns violations into an error
pub fn enforce(url: &str, response: &Response, strict: bool) -> StickyResult<Vec<ContractViolation>> {
    let violations = check_cache_control(response.header("cache-control"));
    if violations.is_empty() {
        return Ok(violations);
    }

    if strict {
        let reason = violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(StickyError::RegistrationContractViolation {
            url: url.to_string(),
            reason,
        });
    }

    for violation in &violations {
        warn!("Worker script {} cache-control: {}", url, violation);
    }
    Ok(violations)
}
