//! Durations written by humans ("5m", "200ms", "1h30m")

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid duration '{input}': {reason}")]
pub struct DurationError {
    pub input: String,
    pub reason: String,
}

/// A duration that remembers the text it was parsed from
///
/// Serializes back to exactly the original text so persisted files
/// round-trip byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HumanDuration {
    raw: String,
    value: Duration,
}

impl HumanDuration {
    pub const ZERO_TEXT: &'static str = "0s";

    /// The zero duration, written as "0s"
    pub fn zero() -> Self {
        Self {
            raw: Self::ZERO_TEXT.to_string(),
            value: Duration::ZERO,
        }
    }

    /// Build from a std duration, formatted the humantime way
    pub fn from_duration(value: Duration) -> Self {
        if value.is_zero() {
            return Self::zero();
        }
        Self {
            raw: humantime::format_duration(value).to_string().replace(' ', ""),
            value,
        }
    }

    pub fn as_duration(&self) -> Duration {
        self.value
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }
}

impl Default for HumanDuration {
    fn default() -> Self {
        Self::zero()
    }
}

impl FromStr for HumanDuration {
    type Err = DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == "0" {
            return Ok(Self {
                raw: s.to_string(),
                value: Duration::ZERO,
            });
        }

        let value = humantime::parse_duration(trimmed).map_err(|e| DurationError {
            input: s.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            raw: s.to_string(),
            value,
        })
    }
}

impl From<Duration> for HumanDuration {
    fn from(value: Duration) -> Self {
        Self::from_duration(value)
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for HumanDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_common_forms() {
        let d: HumanDuration = "5m".parse().unwrap();
        assert_eq!(d.as_duration(), Duration::from_secs(300));

        let d: HumanDuration = "200ms".parse().unwrap();
        assert_eq!(d.as_duration(), Duration::from_millis(200));

        let d: HumanDuration = "1h30m".parse().unwrap();
        assert_eq!(d.as_duration(), Duration::from_secs(5400));
    }

    #[test]
    fn test_zero_forms() {
        assert!("0s".parse::<HumanDuration>().unwrap().is_zero());
        assert!("0".parse::<HumanDuration>().unwrap().is_zero());
        assert!("".parse::<HumanDuration>().unwrap().is_zero());
        assert!(HumanDuration::default().is_zero());
    }

    #[test]
    fn test_not_a_duration() {
        assert!("c7d352bb-23f4-468c-b476-f76599c09a0d".parse::<HumanDuration>().is_err());
        assert!("soon".parse::<HumanDuration>().is_err());
    }

    #[test]
    fn test_serializes_original_text() {
        let d: HumanDuration = "1h30m".parse().unwrap();
        assert_eq!(serde_json::to_string(&d).unwrap(), r#""1h30m""#);

        let back: HumanDuration = serde_json::from_str(r#""1h30m""#).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_from_duration() {
        let d = HumanDuration::from(Duration::from_millis(200));
        assert_eq!(d.as_str(), "200ms");
        assert_eq!(HumanDuration::from(Duration::ZERO).as_str(), "0s");
    }
}
