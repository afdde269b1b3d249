//! Identifier types for the policy generator
//!
//! Rule identifiers are issued sequentially by the generation context so that
//! a seeded run always produces the same identifiers. User identifiers come
//! verbatim from the configured user list.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Unique identifier for a generated rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub u64);

impl RuleId {
    /// Numeric value of the identifier
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RULE_{:06}", self.0)
    }
}

impl Serialize for RuleId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RuleId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("RULE_").unwrap_or(&s);
        digits.parse::<u64>().map(RuleId).map_err(serde::de::Error::custom)
    }
}

/// Identifier of a configured user (the `userid` column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_id_display() {
        assert_eq!(RuleId(1).to_string(), "RULE_000001");
        assert_eq!(RuleId(1234567).to_string(), "RULE_1234567");
    }

    #[test]
    fn test_rule_id_ordering() {
        assert!(RuleId(2) < RuleId(10));
    }

    #[test]
    fn test_rule_id_serialization() {
        let json = serde_json::to_string(&RuleId(42)).unwrap();
        assert_eq!(json, "\"RULE_000042\"");

        let back: RuleId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RuleId(42));

        // Raw numbers are accepted too
        let raw: RuleId = serde_json::from_str("\"7\"").unwrap();
        assert_eq!(raw, RuleId(7));
    }

    #[test]
    fn test_user_id_is_transparent() {
        let json = serde_json::to_string(&UserId(3)).unwrap();
        assert_eq!(json, "3");
        let back: UserId = serde_json::from_str("3").unwrap();
        assert_eq!(back, UserId(3));
    }
}
