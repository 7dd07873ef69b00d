use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

/// Key under which a policy node stores its rules.
///
/// Reserved: it can never be used as a path segment.
pub(crate) const RULES_KEY: &str = "rules";

/// A validated, dotted policy identifier such as `users.create`.
///
/// Policies are addressed by path. Parsing happens once, when routes are
/// wired up, so a typo in a path is reported as a [`ConfigError`] during
/// setup rather than surfacing later as a missing policy.
///
/// A path is one or more non-empty segments separated by `.`. Segments
/// contain only ASCII letters, digits, `_` and `-`, and may not be the
/// reserved word `rules`.
///
/// # Examples
///
/// ```
/// use policy_gate::PolicyPath;
///
/// let path: PolicyPath = "users.create".parse().unwrap();
/// assert_eq!(path.segments().collect::<Vec<_>>(), ["users", "create"]);
///
/// assert!(PolicyPath::parse("users..create").is_err());
/// assert!(PolicyPath::parse("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicyPath {
    raw: String,
}

impl PolicyPath {
    /// Parses a dotted path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPath`] if the path is empty or any
    /// segment is empty, contains a disallowed character, or is `rules`.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, ConfigError> {
        let raw = raw.as_ref();
        if raw.is_empty() {
            return Err(invalid(raw, "path is empty"));
        }
        for segment in raw.split('.') {
            check_segment(segment).map_err(|reason| invalid(raw, reason))?;
        }
        Ok(Self {
            raw: raw.to_string(),
        })
    }

    /// Returns the path as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Iterates over the dot-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.raw.split('.')
    }

    /// Returns the number of segments.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Appends a segment, producing a deeper path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPath`] if `segment` is not a valid
    /// single segment.
    pub fn join(&self, segment: &str) -> Result<Self, ConfigError> {
        let joined = format!("{}.{}", self.raw, segment);
        check_segment(segment).map_err(|reason| invalid(&joined, reason))?;
        Ok(Self { raw: joined })
    }

    /// Builds a path from segments already known to be valid.
    pub(crate) fn from_checked(raw: String) -> Self {
        Self { raw }
    }
}

/// Validates a single path segment.
pub(crate) fn check_segment(segment: &str) -> Result<(), &'static str> {
    if segment.is_empty() {
        return Err("path contains an empty segment");
    }
    if segment == RULES_KEY {
        return Err("'rules' is reserved and cannot be a path segment");
    }
    if !segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err("segments may only contain ASCII letters, digits, '_' and '-'");
    }
    Ok(())
}

fn invalid(raw: &str, reason: &'static str) -> ConfigError {
    ConfigError::InvalidPath {
        path: raw.to_string(),
        reason,
    }
}

impl fmt::Display for PolicyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for PolicyPath {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for PolicyPath {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl AsRef<str> for PolicyPath {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl Serialize for PolicyPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for PolicyPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_and_nested_paths() {
        assert_eq!(PolicyPath::parse("users").unwrap().depth(), 1);

        let path = PolicyPath::parse("test.deep.index").unwrap();
        assert_eq!(path.depth(), 3);
        assert_eq!(path.as_str(), "test.deep.index");
        assert_eq!(path.to_string(), "test.deep.index");
    }

    #[test]
    fn rejects_empty_path() {
        let err = PolicyPath::parse("").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPath { reason: "path is empty", .. }));
    }

    #[test]
    fn rejects_empty_segments() {
        for raw in [".users", "users.", "users..create", "."] {
            assert!(PolicyPath::parse(raw).is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn rejects_reserved_and_odd_characters() {
        assert!(PolicyPath::parse("users.rules").is_err());
        assert!(PolicyPath::parse("users/create").is_err());
        assert!(PolicyPath::parse("users create").is_err());
        assert!(PolicyPath::parse("users.créer").is_err());
    }

    #[test]
    fn accepts_dashes_and_underscores() {
        assert!(PolicyPath::parse("user-accounts.bulk_create").is_ok());
    }

    #[test]
    fn join_validates_the_new_segment() {
        let base = PolicyPath::parse("users").unwrap();
        assert_eq!(base.join("create").unwrap().as_str(), "users.create");
        assert!(base.join("").is_err());
        assert!(base.join("a.b").is_err());
    }

    #[test]
    fn serde_round_trips_through_a_string() {
        let path = PolicyPath::parse("users.update").unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"users.update\"");

        let back: PolicyPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
        assert!(serde_json::from_str::<PolicyPath>("\"bad..path\"").is_err());
    }

    mod proptests {
        use super::*;
        use crate::test_utils::arb_policy_path;
        use proptest::prelude::*;

        proptest! {
            /// Property: every generated path re-parses to itself
            #[test]
            fn proptest_display_reparses(path in arb_policy_path()) {
                let reparsed = PolicyPath::parse(path.to_string()).expect("valid path");
                prop_assert_eq!(reparsed, path);
            }
        }
    }
}
