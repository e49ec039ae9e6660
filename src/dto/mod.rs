use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::error::ServiceError;

pub mod health;
pub mod lifecycle;
pub mod points;
pub mod sse;
pub mod trending;
pub mod validation;
pub mod vote;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Parse an RFC 3339 timestamp supplied by a client for `field`.
pub(crate) fn parse_timestamp(field: &str, value: &str) -> Result<SystemTime, ServiceError> {
    OffsetDateTime::parse(value, &Rfc3339)
        .map(SystemTime::from)
        .map_err(|err| ServiceError::InvalidInput(format!("`{field}` is not RFC 3339: {err}")))
}
