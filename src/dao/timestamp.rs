//! RFC 3339 timestamps as stored by the persistence gateway.

use std::{fmt, time::Duration};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _, ser::Error as _};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// UTC instant serialized as an RFC 3339 string (`2024-05-01T10:00:00Z`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Wrap an existing date-time.
    pub fn from_datetime(value: OffsetDateTime) -> Self {
        Self(value)
    }

    /// Underlying date-time value.
    pub fn datetime(&self) -> OffsetDateTime {
        self.0
    }

    /// Shift the timestamp backwards by `duration`.
    pub fn minus(&self, duration: Duration) -> Self {
        Self(self.0 - duration)
    }

    /// Shift the timestamp forwards by `duration`.
    pub fn plus(&self, duration: Duration) -> Self {
        Self(self.0 + duration)
    }

    /// Time elapsed between `earlier` and `self`, saturating at zero.
    pub fn saturating_since(&self, earlier: Timestamp) -> Duration {
        Duration::try_from(self.0 - earlier.0).unwrap_or(Duration::ZERO)
    }

    /// Format as RFC 3339, falling back to a sentinel string on failure.
    pub fn to_rfc3339(&self) -> String {
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| "invalid-timestamp".into())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let formatted = self.0.format(&Rfc3339).map_err(S::Error::custom)?;
        serializer.serialize_str(&formatted)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&raw, &Rfc3339)
            .map(Self)
            .map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json_as_rfc3339() {
        let parsed: Timestamp = serde_json::from_str("\"2024-05-01T10:00:00Z\"").unwrap();
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            "\"2024-05-01T10:00:00Z\""
        );
    }

    #[test]
    fn saturating_since_never_goes_negative() {
        let now = Timestamp::now();
        let later = Timestamp::from_datetime(now.datetime() + Duration::from_secs(5));
        assert_eq!(now.saturating_since(later), Duration::ZERO);
        assert_eq!(later.saturating_since(now), Duration::from_secs(5));
    }
}
