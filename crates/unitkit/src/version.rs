//! Semantic version parsing and ordering.

use crate::error::{Error, Result, VersionErrorReason};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Wildcard segments normalize to this sentinel so a version like `1.2.*`
/// compares above any concrete `1.2.x` and behaves as a maximum bound.
const WILDCARD_SENTINEL: u64 = 999_999_999;

/// A dotted numeric version with an optional prerelease tag.
///
/// The prerelease tag is whatever follows the first `-`. Wildcard segments
/// (`*`) are expanded before parsing, and the string form uses the expanded
/// value, not the original literal:
///
/// ```
/// use unitkit::SemanticVersion;
///
/// let max: SemanticVersion = "1.2.*".parse().unwrap();
/// assert_eq!(max.to_string(), "1.2.999999999");
/// assert!(max > "1.2.999999998".parse().unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct SemanticVersion {
    segments: Vec<u64>,
    prerelease: Option<String>,
}

impl SemanticVersion {
    /// Parse a version string.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidVersion {
                text: text.to_string(),
                reason: VersionErrorReason::Empty,
            });
        }

        let (release, prerelease) = match text.split_once('-') {
            Some((release, tag)) => (release, Some(tag.to_string())),
            None => (text, None),
        };

        let mut segments = Vec::new();
        for segment in release.split('.') {
            if segment == "*" {
                segments.push(WILDCARD_SENTINEL);
            } else {
                let number = segment.parse::<u64>().map_err(|_| Error::InvalidVersion {
                    text: text.to_string(),
                    reason: VersionErrorReason::BadSegment(segment.to_string()),
                })?;
                segments.push(number);
            }
        }

        Ok(Self {
            segments,
            prerelease,
        })
    }

    /// Whether a prerelease tag is present.
    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// The prerelease tag, if any.
    pub fn prerelease(&self) -> Option<&str> {
        self.prerelease.as_deref()
    }

    /// Numeric segment at `index`, treating missing segments as zero.
    fn segment(&self, index: usize) -> u64 {
        self.segments.get(index).copied().unwrap_or(0)
    }
}

impl FromStr for SemanticVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let release = self
            .segments
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        match &self.prerelease {
            Some(tag) => write!(f, "{release}-{tag}"),
            None => write!(f, "{release}"),
        }
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let width = self.segments.len().max(other.segments.len());
        for i in 0..width {
            match self.segment(i).cmp(&other.segment(i)) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }

        // Same release number: a release build outranks any prerelease,
        // prerelease tags order lexicographically.
        match (&self.prerelease, &other.prerelease) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl Serialize for SemanticVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SemanticVersion {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(text: &str) -> SemanticVersion {
        SemanticVersion::parse(text).unwrap()
    }

    #[test]
    fn ordering_is_numeric() {
        assert!(v("1.2") < v("1.10"));
        assert!(v("2.0") > v("1.9.9"));
        assert!(v("1.0") == v("1.0.0"));
    }

    #[test]
    fn wildcard_expands_to_sentinel() {
        let max = v("1.2.*");
        assert!(max > v("1.2.999999998"));
        assert!(max < v("1.3.0"));
        assert_eq!(max.to_string(), "1.2.999999999");
    }

    #[test]
    fn prerelease_detection() {
        assert!(v("1.0.0-beta.1").is_prerelease());
        assert!(!v("1.0.0").is_prerelease());
        assert_eq!(v("1.0.0-beta.1").prerelease(), Some("beta.1"));
    }

    #[test]
    fn prerelease_orders_below_release() {
        assert!(v("1.0.0-rc.1") < v("1.0.0"));
        assert!(v("1.0.0-alpha") < v("1.0.0-beta"));
        assert!(v("1.0.1-alpha") > v("1.0.0"));
    }

    #[test]
    fn prerelease_round_trips() {
        assert_eq!(v("2.1.0-preview").to_string(), "2.1.0-preview");
    }

    #[test]
    fn rejects_garbage() {
        assert!(SemanticVersion::parse("").is_err());
        assert!(SemanticVersion::parse("1.two.3").is_err());
        assert!(SemanticVersion::parse("  ").is_err());
    }

    #[test]
    fn prerelease_split_is_on_first_dash() {
        let version = v("1.0.0-beta-hotfix");
        assert_eq!(version.prerelease(), Some("beta-hotfix"));
    }
}
