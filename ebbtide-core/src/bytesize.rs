//! Byte-size and duration parsing for rule configuration values.
//!
//! Rule thresholds are written as human-readable strings ("10 MB", "500 KiB")
//! and stored as raw byte counts. Decimal units scale by powers of 1000,
//! binary units by powers of 1024.

use serde::{Deserialize, Deserializer};

/// Errors that can occur while parsing byte-size strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ByteSizeError {
    #[error("empty byte-size string")]
    Empty,

    #[error("invalid numeric value in byte size: {value}")]
    InvalidNumber { value: String },

    #[error("unknown byte-size unit: {unit}")]
    UnknownUnit { unit: String },
}

/// Parses a human-readable byte-size string into a byte count.
///
/// Accepts an optional unit suffix separated from the number by optional
/// whitespace. A bare number is taken as bytes. Fractional values are
/// rounded down after scaling.
///
/// # Errors
/// - `ByteSizeError::Empty` - Input is blank
/// - `ByteSizeError::InvalidNumber` - Numeric prefix does not parse
/// - `ByteSizeError::UnknownUnit` - Suffix is not a recognized unit
pub fn parse_byte_size(input: &str) -> Result<u64, ByteSizeError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ByteSizeError::Empty);
    }

    let split = trimmed
        .find(|c: char| !c.is_ascii_digit() && c != '.' && c != '-')
        .unwrap_or(trimmed.len());
    let (number_part, unit_part) = trimmed.split_at(split);

    let value: f64 = number_part
        .trim()
        .parse()
        .map_err(|_| ByteSizeError::InvalidNumber {
            value: number_part.trim().to_string(),
        })?;
    if value < 0.0 {
        return Err(ByteSizeError::InvalidNumber {
            value: number_part.trim().to_string(),
        });
    }

    let scale = unit_scale(unit_part.trim())?;
    Ok((value * scale as f64) as u64)
}

/// Converts a fractional hour count into whole seconds, rounding down.
pub fn hours_to_seconds(hours: f64) -> u64 {
    if hours <= 0.0 {
        return 0;
    }
    (hours * 3600.0) as u64
}

/// Deserializes an optional byte-size string field into a byte count.
///
/// Accepts `null`, a missing field (with `#[serde(default)]`), or a string
/// such as `"10 MB"`. An empty string is treated as unset.
pub fn deserialize_opt_byte_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(text) if text.trim().is_empty() => Ok(None),
        Some(text) => parse_byte_size(&text)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn unit_scale(unit: &str) -> Result<u64, ByteSizeError> {
    match unit.to_ascii_lowercase().as_str() {
        "" | "b" => Ok(1),
        "kb" => Ok(1000),
        "mb" => Ok(1000u64.pow(2)),
        "gb" => Ok(1000u64.pow(3)),
        "tb" => Ok(1000u64.pow(4)),
        "kib" => Ok(1024),
        "mib" => Ok(1024u64.pow(2)),
        "gib" => Ok(1024u64.pow(3)),
        "tib" => Ok(1024u64.pow(4)),
        other => Err(ByteSizeError::UnknownUnit {
            unit: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_bytes() {
        assert_eq!(parse_byte_size("512"), Ok(512));
        assert_eq!(parse_byte_size("512 B"), Ok(512));
    }

    #[test]
    fn test_parse_decimal_units() {
        assert_eq!(parse_byte_size("10 MB"), Ok(10_000_000));
        assert_eq!(parse_byte_size("500 KB"), Ok(500_000));
        assert_eq!(parse_byte_size("2 GB"), Ok(2_000_000_000));
        assert_eq!(parse_byte_size("1 TB"), Ok(1_000_000_000_000));
    }

    #[test]
    fn test_parse_binary_units() {
        assert_eq!(parse_byte_size("1 KiB"), Ok(1024));
        assert_eq!(parse_byte_size("4 MiB"), Ok(4 * 1024 * 1024));
    }

    #[test]
    fn test_parse_is_case_insensitive_and_space_optional() {
        assert_eq!(parse_byte_size("10mb"), Ok(10_000_000));
        assert_eq!(parse_byte_size("10  Mb"), Ok(10_000_000));
    }

    #[test]
    fn test_parse_fractional_value() {
        assert_eq!(parse_byte_size("1.5 KB"), Ok(1500));
        assert_eq!(parse_byte_size("0.5 MiB"), Ok(512 * 1024));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_byte_size(""), Err(ByteSizeError::Empty));
        assert_eq!(parse_byte_size("   "), Err(ByteSizeError::Empty));
        assert!(matches!(
            parse_byte_size("ten MB"),
            Err(ByteSizeError::InvalidNumber { .. })
        ));
        assert!(matches!(
            parse_byte_size("10 parsecs"),
            Err(ByteSizeError::UnknownUnit { .. })
        ));
        assert!(matches!(
            parse_byte_size("-3 MB"),
            Err(ByteSizeError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_hours_to_seconds() {
        assert_eq!(hours_to_seconds(1.0), 3600);
        assert_eq!(hours_to_seconds(0.5), 1800);
        assert_eq!(hours_to_seconds(0.0), 0);
        assert_eq!(hours_to_seconds(-2.0), 0);
    }

    #[test]
    fn test_deserialize_opt_byte_size() {
        #[derive(serde::Deserialize)]
        struct Holder {
            #[serde(default, deserialize_with = "deserialize_opt_byte_size")]
            threshold: Option<u64>,
        }

        let set: Holder = serde_json::from_str(r#"{"threshold": "10 MB"}"#).unwrap();
        assert_eq!(set.threshold, Some(10_000_000));

        let null: Holder = serde_json::from_str(r#"{"threshold": null}"#).unwrap();
        assert_eq!(null.threshold, None);

        let missing: Holder = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.threshold, None);

        let empty: Holder = serde_json::from_str(r#"{"threshold": ""}"#).unwrap();
        assert_eq!(empty.threshold, None);

        assert!(serde_json::from_str::<Holder>(r#"{"threshold": "much"}"#).is_err());
    }
}
