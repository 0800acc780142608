//! Database helper functions for safe type conversions.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use std::str::FromStr;

/// Parse a UUID string from database, returning a rusqlite error on failure.
pub fn parse_uuid(s: &str) -> rusqlite::Result<uuid::Uuid> {
    uuid::Uuid::parse_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
    })
}

/// Parse an RFC3339 datetime string from database, returning a rusqlite error on failure.
pub fn parse_datetime(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

/// Parse an optional RFC3339 datetime column.
pub fn parse_optional_datetime(s: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_datetime).transpose()
}

/// Parse a TEXT column into one of the model enums.
pub fn parse_text<T>(s: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    s.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::from(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskKind;

    #[test]
    fn test_parse_text_rejects_unknown_values() {
        assert_eq!(parse_text::<TaskKind>("Break").unwrap(), TaskKind::Break);
        assert!(parse_text::<TaskKind>("Lunch").is_err());
    }

    #[test]
    fn test_parse_optional_datetime() {
        assert!(parse_optional_datetime(None).unwrap().is_none());
        let parsed = parse_optional_datetime(Some("2024-01-01T10:00:00+00:00".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-01T10:00:00+00:00");
        assert!(parse_datetime("yesterday").is_err());
    }
}
