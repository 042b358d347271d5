//! Conversion rules: single `from -> to` edges between CRD versions

use serde::{Deserialize, Serialize};
use std::fmt;

use super::version::trim_group;

/// Separator between versions in an encoded rule
pub const RULE_SEPARATOR: &str = "->";

/// A conversion from one CRD version to another
///
/// Encoded as `"<from>-><to>"`. Versions may carry a group prefix
/// (`stable.example.com/v1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRule {
    pub from_version: String,
    pub to_version: String,
}

impl ConversionRule {
    pub fn new(from_version: impl Into<String>, to_version: impl Into<String>) -> Self {
        Self {
            from_version: from_version.into(),
            to_version: to_version.into(),
        }
    }

    /// Decode a rule by splitting on the first `->`
    ///
    /// A string without a separator becomes a rule with an empty `to_version`.
    pub fn from_id(id: &str) -> Self {
        match id.split_once(RULE_SEPARATOR) {
            Some((from, to)) => Self::new(from, to),
            None => Self::new(id, ""),
        }
    }

    /// The rule identifier, same as `to_string()`
    pub fn id(&self) -> String {
        self.to_string()
    }

    pub fn short_from_version(&self) -> &str {
        trim_group(&self.from_version)
    }

    pub fn short_to_version(&self) -> &str {
        trim_group(&self.to_version)
    }
}

impl fmt::Display for ConversionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.from_version, RULE_SEPARATOR, self.to_version)
    }
}

impl From<&str> for ConversionRule {
    fn from(id: &str) -> Self {
        Self::from_id(id)
    }
}

#[cfg(test)]
#[path = "rule_test.rs"]
mod tests;
