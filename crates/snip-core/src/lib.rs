//! snip Core - documents and the create-or-update resolver
//!
//! This crate provides the core functionality for snip:
//! - Document model with validated slugs
//! - Slug generation and content classification
//! - Caller permission resolution
//! - The Document Resolver, which decides create / update / reject
//!   inside a single store transaction

pub mod classify;
pub mod document;
pub mod error;
pub mod events;
pub mod generator;
pub mod permissions;
pub mod reader;
pub mod resolver;
pub mod slug;
pub mod store;

pub use classify::is_url;
pub use document::{Document, DocumentKind, User, UserId};
pub use error::{Error, Result, StorageError};
pub use events::{Event, Notifier, NullNotifier, RequestContext};
pub use generator::{PhoneticGenerator, RandomGenerator, SlugGenerator};
pub use permissions::{
    ApiCredential, ApiKeyRegistry, CallerPermissions, CredentialLookup, EditPolicy, OwnerOrAdmin,
    PermissionResolver,
};
pub use reader::DocumentReader;
pub use resolver::{CreateOrUpdateRequest, DocumentResolver, Outcome, Rejection, ResolverConfig};
pub use slug::Slug;
pub use store::{transactional, DocumentStore, Transaction};
