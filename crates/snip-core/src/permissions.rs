//! Caller permissions and edit authorization

use crate::document::{Document, User};
use crate::events::{Event, Notifier, RequestContext};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// An API key and the rights it grants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCredential {
    pub key: String,
    pub user: User,
    pub can_create_documents: bool,
    pub can_update_documents: bool,
}

/// What the caller of a single request may do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerPermissions {
    pub user: User,
    pub can_create_documents: bool,
    pub can_update_documents: bool,
}

impl CallerPermissions {
    /// Session users get full default rights
    pub fn session(user: User) -> Self {
        Self {
            user,
            can_create_documents: true,
            can_update_documents: true,
        }
    }
}

impl From<ApiCredential> for CallerPermissions {
    fn from(credential: ApiCredential) -> Self {
        Self {
            user: credential.user,
            can_create_documents: credential.can_create_documents,
            can_update_documents: credential.can_update_documents,
        }
    }
}

/// Looks up API credentials by key
pub trait CredentialLookup: Send + Sync {
    fn lookup(&self, key: &str) -> Option<ApiCredential>;
}

/// In-memory API key table
#[derive(Debug, Default)]
pub struct ApiKeyRegistry {
    keys: RwLock<HashMap<String, ApiCredential>>,
}

impl ApiKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a credential, replacing any previous one with the same key
    pub fn insert(&self, credential: ApiCredential) {
        self.keys.write().insert(credential.key.clone(), credential);
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

impl FromIterator<ApiCredential> for ApiKeyRegistry {
    fn from_iter<I: IntoIterator<Item = ApiCredential>>(iter: I) -> Self {
        let registry = Self::new();
        for credential in iter {
            registry.insert(credential);
        }
        registry
    }
}

impl CredentialLookup for ApiKeyRegistry {
    fn lookup(&self, key: &str) -> Option<ApiCredential> {
        self.keys.read().get(key).cloned()
    }
}

/// Turns request credentials into one concrete [`CallerPermissions`]
pub struct PermissionResolver {
    credentials: Arc<dyn CredentialLookup>,
    notifier: Arc<dyn Notifier>,
}

impl PermissionResolver {
    pub fn new(credentials: Arc<dyn CredentialLookup>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            credentials,
            notifier,
        }
    }

    /// Resolve the caller's permissions
    ///
    /// Frontend requests never consult API keys. Otherwise a known key wins
    /// and is reported as an API key use; anything else falls back to the
    /// session user with default rights.
    pub fn resolve(
        &self,
        frontend: bool,
        api_key: Option<&str>,
        session_user: User,
        ctx: &RequestContext,
    ) -> CallerPermissions {
        let credential = match api_key {
            Some(key) if !frontend => self.credentials.lookup(key),
            _ => None,
        };

        match credential {
            Some(credential) => {
                debug!(user = %credential.user.id, "Using API credential");
                self.notifier.report_event(Event::ApiKeyUse, ctx);
                credential.into()
            }
            None => CallerPermissions::session(session_user),
        }
    }
}

/// Decides whether a user may edit a specific document
pub trait EditPolicy: Send + Sync {
    fn user_can_edit(&self, document: &Document, user: &User) -> bool;
}

/// Owners edit their own documents, administrators edit everything
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerOrAdmin;

impl EditPolicy for OwnerOrAdmin {
    fn user_can_edit(&self, document: &Document, user: &User) -> bool {
        user.admin || document.owner == user.id
    }
}
