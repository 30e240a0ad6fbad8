//! Unit conversion between user-facing magnitudes and API representation

use crate::error::ValidationError;
use std::time::Duration;

/// One megabyte as the platform counts it
pub const MEGABYTE: u64 = 1024 * 1024;

/// Memory allocation granularity of the platform, in megabytes
pub const MEMORY_GRANULARITY_MB: u64 = 128;

/// Convert megabytes to bytes. Exact; never rounds.
pub fn megabytes_to_bytes(megabytes: u64) -> Result<u64, ValidationError> {
    megabytes
        .checked_mul(MEGABYTE)
        .ok_or(ValidationError::MemoryOverflow(megabytes))
}

/// Convert bytes back to megabytes
pub fn bytes_to_megabytes(bytes: u64) -> u64 {
    if bytes % MEGABYTE != 0 {
        tracing::warn!(bytes, "Memory is not a whole number of megabytes");
    }
    bytes / MEGABYTE
}

/// Whether the platform will accept this memory size
pub fn is_aligned_memory(megabytes: u64) -> bool {
    megabytes > 0 && megabytes % MEMORY_GRANULARITY_MB == 0
}

/// Parse a strictly positive duration such as `"30s"`, `"5m"` or `"1m 30s"`
pub fn parse_positive_duration(value: &str) -> Result<Duration, ValidationError> {
    let duration =
        humantime::parse_duration(value.trim()).map_err(|e| ValidationError::InvalidDuration {
            value: value.to_string(),
            reason: e.to_string(),
        })?;

    if duration.is_zero() {
        return Err(ValidationError::InvalidDuration {
            value: value.to_string(),
            reason: "duration must be positive".to_string(),
        });
    }
    Ok(duration)
}

/// Format a duration in the same notation `parse_positive_duration` accepts
pub fn format_duration(duration: Duration) -> String {
    humantime::format_duration(duration).to_string()
}

/// Compare two duration strings by value; falls back to text when either
/// side does not parse.
pub fn same_duration(a: &str, b: &str) -> bool {
    match (parse_positive_duration(a), parse_positive_duration(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
