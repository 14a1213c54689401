//! Slugs - the short keys documents are addressed by

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Minimum slug length in characters
pub const MIN_SLUG_LENGTH: usize = 3;

/// Maximum slug length in characters
pub const MAX_SLUG_LENGTH: usize = 40;

/// Words taken by the routing layer in front of the store
pub const RESERVED_SLUGS: &[&str] = &["raw", "documents", "api", "edit", "stats", "static", "v"];

/// Document slug - ASCII `[a-zA-Z0-9_-]`, 3 to 40 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Create a slug, validating the format
    pub fn parse(candidate: impl Into<String>) -> Result<Self> {
        let candidate = candidate.into();

        match Self::validate(&candidate) {
            Some(message) => Err(Error::InvalidSlug(message)),
            None => Ok(Self(candidate)),
        }
    }

    /// Check a candidate slug, returning a message describing the first problem
    pub fn validate(candidate: &str) -> Option<String> {
        let len = candidate.chars().count();
        if len < MIN_SLUG_LENGTH {
            return Some(format!(
                "The URL has to be at least {} characters long",
                MIN_SLUG_LENGTH
            ));
        }

        if len > MAX_SLUG_LENGTH {
            return Some(format!(
                "The URL cannot be longer than {} characters",
                MAX_SLUG_LENGTH
            ));
        }

        if !candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Some("The URL may only contain letters, digits, '-' and '_'".into());
        }

        if RESERVED_SLUGS
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(candidate))
        {
            return Some(format!("The URL '{}' is reserved", candidate));
        }

        None
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Slug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Slug {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Slug::parse(value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_valid() {
        assert!(Slug::parse("mylink").is_ok());
        assert!(Slug::parse("my-link_2").is_ok());
        assert!(Slug::parse("abc").is_ok());
        assert!(Slug::parse("a".repeat(MAX_SLUG_LENGTH)).is_ok());
    }

    #[test]
    fn test_slug_invalid() {
        assert!(Slug::parse("").is_err());
        assert!(Slug::parse("ab").is_err()); // too short
        assert!(Slug::parse("a".repeat(MAX_SLUG_LENGTH + 1)).is_err());
        assert!(Slug::parse("my link").is_err()); // whitespace
        assert!(Slug::parse("a/b/c").is_err());
        assert!(Slug::parse("héllo").is_err());
    }

    #[test]
    fn test_reserved_words_ignore_case() {
        assert!(Slug::parse("raw").is_err());
        assert!(Slug::parse("Documents").is_err());
        assert!(Slug::parse("rawr").is_ok());
    }

    #[test]
    fn test_validate_message() {
        let message = Slug::validate("x").unwrap();
        assert!(message.contains("at least 3"));
        assert!(Slug::validate("fine").is_none());
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let ok: Slug = serde_json::from_str("\"mylink\"").unwrap();
        assert_eq!(ok.as_str(), "mylink");
        assert!(serde_json::from_str::<Slug>("\"no way\"").is_err());
    }
}
