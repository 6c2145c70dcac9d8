//! Check status enumeration (spec §3).

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok = 0,
    Warning = 1,
    Severe = 2,
    Unknown = 3,
    Timeout = 4,
    Error = -1,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Ok,
        Status::Warning,
        Status::Severe,
        Status::Unknown,
        Status::Timeout,
        Status::Error,
    ];

    pub fn from_i64(value: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_i64() == value)
    }

    /// Reverse lookup: status value → enumeration name (the source's
    /// `Check.get_status` helper). Used in log lines.
    pub fn name(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Severe => "SEVERE",
            Status::Unknown => "UNKNOWN",
            Status::Timeout => "TIMEOUT",
            Status::Error => "ERROR",
        }
    }

    /// Name → value, case-insensitive (child-process contract, spec §6).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }

    pub fn as_i64(self) -> i64 {
        self as i64
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Unknown
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = i64::deserialize(deserializer)?;
        Status::from_i64(value).ok_or_else(|| DeError::custom(format!("invalid status value: {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_member() {
        for status in Status::ALL {
            let value = status.as_i64();
            assert_eq!(Status::from_i64(value), Some(status));
            assert_eq!(Status::from_name(status.name()), Some(status));
        }
    }

    #[test]
    fn unknown_value_and_name_reject() {
        assert_eq!(Status::from_i64(42), None);
        assert_eq!(Status::from_name("BOGUS"), None);
    }

    #[test]
    fn name_lookup_is_case_insensitive() {
        assert_eq!(Status::from_name("ok"), Some(Status::Ok));
        assert_eq!(Status::from_name("Warning"), Some(Status::Warning));
    }
}
