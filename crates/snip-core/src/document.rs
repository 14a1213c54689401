//! Document types

use crate::slug::Slug;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Identity of a document owner
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A caller identity, either from a session or an API credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Administrators may edit any document
    #[serde(default)]
    pub admin: bool,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            admin: false,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            admin: true,
        }
    }
}

/// What a document's content is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// A short link; content is the target URL
    Url,
    /// Plain text
    Paste,
}

impl DocumentKind {
    pub fn from_is_url(is_url: bool) -> Self {
        if is_url {
            DocumentKind::Url
        } else {
            DocumentKind::Paste
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Url => "url",
            DocumentKind::Paste => "paste",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "url" => Some(DocumentKind::Url),
            "paste" => Some(DocumentKind::Paste),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored paste or short link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub slug: Slug,
    pub owner: UserId,
    /// Always stored trimmed
    pub content: String,
    pub kind: DocumentKind,
    /// Edit counter, 0 for a freshly created document
    pub version: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Document {
    /// Create a new document at version 0
    pub fn new(slug: Slug, owner: UserId, content: &str, kind: DocumentKind) -> Self {
        let now = now_millis();

        Self {
            slug,
            owner,
            content: content.trim().to_string(),
            kind,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the content, bumping the version by exactly one
    pub fn edit(&mut self, content: &str, kind: DocumentKind) {
        self.content = content.trim().to_string();
        self.kind = kind;
        self.version += 1;
        self.updated_at = now_millis();
    }

    pub fn is_url(&self) -> bool {
        self.kind == DocumentKind::Url
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
