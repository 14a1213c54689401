//! Document Resolver - decides whether a request creates, edits or is rejected
//!
//! Validation runs before the store is touched. The existence check, the
//! permission and ownership checks, and the write then run inside a single
//! store transaction, so two requests racing for the same unused slug cannot
//! both create it: the loser's transaction is re-run and sees the winner's
//! document. Outcome events are reported once, after the transaction.

use crate::classify::is_url;
use crate::document::{Document, DocumentKind};
use crate::error::{Error, Result};
use crate::events::{Event, Notifier, RequestContext};
use crate::generator::SlugGenerator;
use crate::permissions::{CallerPermissions, EditPolicy, OwnerOrAdmin};
use crate::slug::Slug;
use crate::store::{transactional, DocumentStore, Transaction, DEFAULT_MAX_RETRIES};
use std::sync::Arc;
use tracing::{debug, info};

/// Default number of generated candidates tried before giving up
pub const DEFAULT_MAX_GENERATION_ATTEMPTS: u32 = 16;

/// A create-or-update request, already parsed by the transport layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOrUpdateRequest {
    pub content: String,
    pub requested_slug: Option<String>,
    /// Set for the first-party frontend, which never uses API keys
    pub is_frontend_origin: bool,
}

impl CreateOrUpdateRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.requested_slug = Some(slug.into());
        self
    }

    pub fn from_frontend(mut self) -> Self {
        self.is_frontend_origin = true;
        self
    }

    /// The requested slug, if one was given and is not blank
    fn requested_slug(&self) -> Option<&str> {
        self.requested_slug
            .as_deref()
            .filter(|slug| !slug.trim().is_empty())
    }

    /// Check the request on its own, without any store access
    ///
    /// Returns the parsed requested slug, or the rejection for empty content
    /// or a malformed slug. Hosts run this before resolving the caller, so a
    /// request turned down here never counts as an API key use.
    pub fn validate(&self) -> std::result::Result<Option<Slug>, Rejection> {
        if self.content.trim().is_empty() {
            return Err(Rejection::ContentEmpty);
        }

        match self.requested_slug() {
            Some(candidate) => match Slug::parse(candidate) {
                Ok(slug) => Ok(Some(slug)),
                Err(Error::InvalidSlug(message)) => Err(Rejection::InvalidSlug(message)),
                Err(e) => Err(Rejection::InvalidSlug(e.to_string())),
            },
            None => Ok(None),
        }
    }
}

/// Why a request was turned down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    ContentEmpty,
    InvalidSlug(String),
    ForbiddenCreate,
    ForbiddenEdit,
    /// The slug belongs to a document the caller may not edit
    SlugConflict,
}

impl Rejection {
    /// Stable machine-readable reason
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::ContentEmpty => "content-empty",
            Rejection::InvalidSlug(_) => "invalid-slug",
            Rejection::ForbiddenCreate => "forbidden-create",
            Rejection::ForbiddenEdit => "forbidden-edit",
            Rejection::SlugConflict => "slug-conflict",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::ContentEmpty => f.write_str("Paste content cannot be empty"),
            Rejection::InvalidSlug(message) => f.write_str(message),
            Rejection::ForbiddenCreate => {
                f.write_str("You do not have the permission to create documents")
            }
            Rejection::ForbiddenEdit => {
                f.write_str("You do not have the permission to edit documents")
            }
            Rejection::SlugConflict => {
                f.write_str("This URL is already in use, please choose a different one")
            }
        }
    }
}

/// Result of resolving a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created { slug: Slug, is_url: bool },
    Updated { slug: Slug, is_url: bool, version: u64 },
    Rejected(Rejection),
}

impl Outcome {
    pub fn slug(&self) -> Option<&Slug> {
        match self {
            Outcome::Created { slug, .. } | Outcome::Updated { slug, .. } => Some(slug),
            Outcome::Rejected(_) => None,
        }
    }

    pub fn is_url(&self) -> Option<bool> {
        match self {
            Outcome::Created { is_url, .. } | Outcome::Updated { is_url, .. } => Some(*is_url),
            Outcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Outcome::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }

    /// The event this outcome reports, if any
    fn event(&self) -> Option<Event> {
        match self {
            Outcome::Created { is_url, .. } => Some(Event::create(*is_url)),
            Outcome::Updated { .. } => Some(Event::DocEdit),
            Outcome::Rejected(_) => None,
        }
    }
}

impl From<Rejection> for Outcome {
    fn from(rejection: Rejection) -> Self {
        Outcome::Rejected(rejection)
    }
}

/// Resolver tuning
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// How often a conflicting transaction is re-run
    pub max_retries: u32,
    /// How many generated slugs are tried per transaction
    pub max_generation_attempts: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            max_generation_attempts: DEFAULT_MAX_GENERATION_ATTEMPTS,
        }
    }
}

/// Creates and edits documents
pub struct DocumentResolver {
    store: Arc<dyn DocumentStore>,
    generator: Arc<dyn SlugGenerator>,
    notifier: Arc<dyn Notifier>,
    edit_policy: Arc<dyn EditPolicy>,
    config: ResolverConfig,
}

impl DocumentResolver {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        generator: Arc<dyn SlugGenerator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            generator,
            notifier,
            edit_policy: Arc::new(OwnerOrAdmin),
            config: ResolverConfig::default(),
        }
    }

    /// Replace the per-document edit check
    pub fn with_edit_policy(mut self, edit_policy: Arc<dyn EditPolicy>) -> Self {
        self.edit_policy = edit_policy;
        self
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve a request into a created, updated or rejected document
    ///
    /// `Err` is only returned when the store itself fails; everything the
    /// caller did wrong comes back as [`Outcome::Rejected`].
    ///
    /// The outcome event is reported once, after the transaction has
    /// committed. Rejections, store failures and re-run attempts report
    /// nothing.
    pub fn resolve(
        &self,
        request: &CreateOrUpdateRequest,
        caller: &CallerPermissions,
        ctx: &RequestContext,
    ) -> Result<Outcome> {
        let requested = match request.validate() {
            Ok(requested) => requested,
            Err(rejection) => return Ok(rejection.into()),
        };

        let outcome = transactional(self.store.as_ref(), self.config.max_retries, |txn| {
            self.decide(txn, request, requested.as_ref(), caller)
        })?;

        if let Some(event) = outcome.event() {
            self.notifier.report_event(event, ctx);
        }

        Ok(outcome)
    }

    /// The decision table, run inside the transaction
    fn decide(
        &self,
        txn: &mut dyn Transaction,
        request: &CreateOrUpdateRequest,
        requested: Option<&Slug>,
        caller: &CallerPermissions,
    ) -> Result<Outcome> {
        let existing = match requested {
            Some(slug) => txn.find(slug)?,
            None => None,
        };

        let Some(mut document) = existing else {
            if !caller.can_create_documents {
                debug!(user = %caller.user.id, "Create forbidden");
                return Ok(Rejection::ForbiddenCreate.into());
            }

            let is_url = is_url(&request.content);
            let slug = match requested {
                Some(slug) => slug.clone(),
                None => self.fresh_slug(txn, is_url)?,
            };

            let document = Document::new(
                slug,
                caller.user.id.clone(),
                &request.content,
                DocumentKind::from_is_url(is_url),
            );
            txn.insert(&document)?;

            info!(slug = %document.slug, user = %caller.user.id, kind = %document.kind, "Document created");
            return Ok(Outcome::Created {
                slug: document.slug,
                is_url,
            });
        };

        if !caller.can_update_documents {
            debug!(slug = %document.slug, user = %caller.user.id, "Edit forbidden");
            return Ok(Rejection::ForbiddenEdit.into());
        }

        if !self.edit_policy.user_can_edit(&document, &caller.user) {
            debug!(slug = %document.slug, user = %caller.user.id, "Slug taken by another owner");
            return Ok(Rejection::SlugConflict.into());
        }

        let is_url = is_url(&request.content);
        document.edit(&request.content, DocumentKind::from_is_url(is_url));
        txn.update(&document)?;

        info!(slug = %document.slug, user = %caller.user.id, version = document.version, "Document updated");
        Ok(Outcome::Updated {
            slug: document.slug,
            is_url,
            version: document.version,
        })
    }

    /// Draw generated slugs until one is free in this transaction
    fn fresh_slug(&self, txn: &mut dyn Transaction, is_url: bool) -> Result<Slug> {
        for _ in 0..self.config.max_generation_attempts {
            let Ok(slug) = Slug::parse(self.generator.generate(is_url)) else {
                continue;
            };

            if txn.find(&slug)?.is_none() {
                return Ok(slug);
            }
            debug!(slug = %slug, "Generated slug already taken");
        }

        Err(Error::SlugSpaceExhausted {
            attempts: self.config.max_generation_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{User, UserId};
    use crate::error::StorageError;
    use crate::events::testing::RecordingNotifier;
    use crate::store::testing::TestStore;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::Ordering;

    /// Hands out a fixed sequence of keys, then repeats the last one
    struct ScriptedGenerator(Mutex<VecDeque<String>>);

    impl ScriptedGenerator {
        fn new(keys: &[&str]) -> Self {
            Self(Mutex::new(keys.iter().map(|k| k.to_string()).collect()))
        }
    }

    impl SlugGenerator for ScriptedGenerator {
        fn generate(&self, _is_url: bool) -> String {
            let mut keys = self.0.lock();
            if keys.len() > 1 {
                keys.pop_front().unwrap_or_default()
            } else {
                keys.front().cloned().unwrap_or_default()
            }
        }
    }

    struct Fixture {
        store: Arc<TestStore>,
        notifier: Arc<RecordingNotifier>,
        resolver: DocumentResolver,
    }

    fn fixture(existing: Vec<Document>, keys: &[&str]) -> Fixture {
        let store = Arc::new(TestStore::with(existing));
        let notifier = Arc::new(RecordingNotifier::default());
        let resolver = DocumentResolver::new(
            store.clone(),
            Arc::new(ScriptedGenerator::new(keys)),
            notifier.clone(),
        );
        Fixture {
            store,
            notifier,
            resolver,
        }
    }

    fn owned_by(slug: &str, owner: &str, content: &str) -> Document {
        Document::new(
            Slug::parse(slug).unwrap(),
            UserId::new(owner),
            content,
            DocumentKind::Paste,
        )
    }

    fn alice() -> CallerPermissions {
        CallerPermissions::session(User::new("alice"))
    }

    fn restricted(create: bool, update: bool) -> CallerPermissions {
        CallerPermissions {
            user: User::new("alice"),
            can_create_documents: create,
            can_update_documents: update,
        }
    }

    fn resolve(f: &Fixture, request: CreateOrUpdateRequest, caller: &CallerPermissions) -> Outcome {
        f.resolver
            .resolve(&request, caller, &RequestContext::new())
            .unwrap()
    }

    #[test]
    fn test_blank_content_rejected_first() {
        let f = fixture(vec![owned_by("taken", "bob", "x")], &["generated"]);

        for content in ["", "   ", "\n\t "] {
            for caller in [alice(), restricted(false, false)] {
                let outcome = resolve(&f, CreateOrUpdateRequest::new(content).with_slug("no way"), &caller);
                assert_eq!(outcome, Outcome::Rejected(Rejection::ContentEmpty));
            }
        }
        assert_eq!(f.store.commits.load(Ordering::SeqCst), 0);
        assert!(f.notifier.events().is_empty());
    }

    #[test]
    fn test_invalid_slug_rejected_before_store_access() {
        let f = fixture(vec![], &["generated"]);

        let outcome = resolve(&f, CreateOrUpdateRequest::new("hello").with_slug("a b"), &alice());

        match outcome {
            Outcome::Rejected(rejection @ Rejection::InvalidSlug(_)) => {
                assert_eq!(rejection.reason(), "invalid-slug");
                assert!(rejection.to_string().contains("letters"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(f.store.commits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_blank_slug_means_generated() {
        let f = fixture(vec![], &["generated"]);

        let outcome = resolve(&f, CreateOrUpdateRequest::new("hello").with_slug("   "), &alice());

        assert_eq!(outcome.slug().map(Slug::as_str), Some("generated"));
    }

    #[test]
    fn test_create_forbidden_without_slug() {
        let f = fixture(vec![], &["generated"]);

        let outcome = resolve(&f, CreateOrUpdateRequest::new("hello"), &restricted(false, true));

        assert_eq!(outcome, Outcome::Rejected(Rejection::ForbiddenCreate));
        assert_eq!(f.store.count().unwrap(), 0);
        assert!(f.notifier.events().is_empty());
    }

    #[test]
    fn test_create_with_generated_slug() {
        let f = fixture(vec![], &["generated"]);

        let outcome = resolve(&f, CreateOrUpdateRequest::new("  hello  "), &alice());

        assert_eq!(
            outcome,
            Outcome::Created {
                slug: Slug::parse("generated").unwrap(),
                is_url: false
            }
        );
        let doc = f.store.doc("generated").unwrap();
        assert_eq!(doc.content, "hello");
        assert_eq!(doc.owner.as_str(), "alice");
        assert_eq!(doc.kind, DocumentKind::Paste);
        assert_eq!(doc.version, 0);
        assert_eq!(f.notifier.events(), vec![Event::PasteCreate]);
    }

    #[test]
    fn test_generation_skips_taken_and_invalid_keys() {
        let f = fixture(vec![owned_by("taken", "bob", "x")], &["taken", "no", "fresh"]);

        let outcome = resolve(&f, CreateOrUpdateRequest::new("hello"), &alice());

        assert_eq!(outcome.slug().map(Slug::as_str), Some("fresh"));
        assert_eq!(f.store.doc("taken").unwrap().content, "x");
    }

    #[test]
    fn test_generation_exhausted_is_an_error() {
        let f = fixture(vec![owned_by("taken", "bob", "x")], &["taken"]);

        let err = f
            .resolver
            .resolve(&CreateOrUpdateRequest::new("hello"), &alice(), &RequestContext::new())
            .unwrap_err();

        assert!(matches!(
            err,
            Error::SlugSpaceExhausted {
                attempts: DEFAULT_MAX_GENERATION_ATTEMPTS
            }
        ));
        assert!(f.notifier.events().is_empty());
    }

    #[test]
    fn test_create_with_requested_slug() {
        let f = fixture(vec![], &["generated"]);

        let outcome = resolve(&f, CreateOrUpdateRequest::new("http://x.test").with_slug("mylink"), &alice());

        assert_eq!(
            outcome,
            Outcome::Created {
                slug: Slug::parse("mylink").unwrap(),
                is_url: true
            }
        );
        assert_eq!(f.store.doc("mylink").unwrap().kind, DocumentKind::Url);
        assert!(f.store.doc("generated").is_none());
        assert_eq!(f.notifier.events(), vec![Event::UrlCreate]);
    }

    #[test]
    fn test_create_with_requested_slug_forbidden() {
        let f = fixture(vec![], &["generated"]);

        let outcome = resolve(&f, CreateOrUpdateRequest::new("hello").with_slug("mylink"), &restricted(false, true));

        assert_eq!(outcome, Outcome::Rejected(Rejection::ForbiddenCreate));
        assert!(f.store.doc("mylink").is_none());
    }

    #[test]
    fn test_owner_updates_document() {
        let f = fixture(vec![owned_by("mylink", "alice", "http://x.test")], &["generated"]);

        let outcome = resolve(&f, CreateOrUpdateRequest::new("updated").with_slug("mylink"), &alice());

        assert_eq!(
            outcome,
            Outcome::Updated {
                slug: Slug::parse("mylink").unwrap(),
                is_url: false,
                version: 1
            }
        );
        let doc = f.store.doc("mylink").unwrap();
        assert_eq!(doc.content, "updated");
        assert_eq!(doc.kind, DocumentKind::Paste);
        assert_eq!(doc.version, 1);
        assert_eq!(f.notifier.events(), vec![Event::DocEdit]);
    }

    #[test]
    fn test_repeated_edit_bumps_version_each_time() {
        let f = fixture(vec![owned_by("mylink", "alice", "old")], &["generated"]);
        let request = CreateOrUpdateRequest::new("same").with_slug("mylink");

        resolve(&f, request.clone(), &alice());
        resolve(&f, request, &alice());

        assert_eq!(f.store.doc("mylink").unwrap().version, 2);
        assert_eq!(f.notifier.events(), vec![Event::DocEdit, Event::DocEdit]);
    }

    #[test]
    fn test_edit_forbidden_without_update_right() {
        let f = fixture(vec![owned_by("mylink", "alice", "old")], &["generated"]);

        let outcome = resolve(&f, CreateOrUpdateRequest::new("new").with_slug("mylink"), &restricted(true, false));

        assert_eq!(outcome, Outcome::Rejected(Rejection::ForbiddenEdit));
        assert_eq!(f.store.doc("mylink").unwrap().content, "old");
    }

    #[test]
    fn test_missing_update_right_wins_over_ownership() {
        let f = fixture(vec![owned_by("mylink", "bob", "old")], &["generated"]);

        let outcome = resolve(&f, CreateOrUpdateRequest::new("new").with_slug("mylink"), &restricted(true, false));

        assert_eq!(outcome, Outcome::Rejected(Rejection::ForbiddenEdit));
        assert_eq!(outcome.rejection().map(Rejection::reason), Some("forbidden-edit"));
        assert_eq!(f.store.doc("mylink").unwrap().content, "old");
        assert!(f.notifier.events().is_empty());
    }

    #[test]
    fn test_validate_without_store() {
        assert_eq!(
            CreateOrUpdateRequest::new("  ").with_slug("mylink").validate(),
            Err(Rejection::ContentEmpty)
        );
        assert!(matches!(
            CreateOrUpdateRequest::new("hello").with_slug("a/b").validate(),
            Err(Rejection::InvalidSlug(_))
        ));
        assert_eq!(CreateOrUpdateRequest::new("hello").with_slug(" ").validate(), Ok(None));
        assert_eq!(
            CreateOrUpdateRequest::new("hello").with_slug("mylink").validate(),
            Ok(Some(Slug::parse("mylink").unwrap()))
        );
    }

    #[test]
    fn test_foreign_document_is_a_slug_conflict() {
        let f = fixture(vec![owned_by("mylink", "bob", "old")], &["generated"]);

        let outcome = resolve(&f, CreateOrUpdateRequest::new("new").with_slug("mylink"), &alice());

        assert_eq!(outcome, Outcome::Rejected(Rejection::SlugConflict));
        assert_eq!(outcome.rejection().map(Rejection::reason), Some("slug-conflict"));
        let doc = f.store.doc("mylink").unwrap();
        assert_eq!(doc.content, "old");
        assert_eq!(doc.version, 0);
        assert!(f.notifier.events().is_empty());
    }

    #[test]
    fn test_admin_may_edit_foreign_document() {
        let f = fixture(vec![owned_by("mylink", "bob", "old")], &["generated"]);

        let outcome = resolve(
            &f,
            CreateOrUpdateRequest::new("new").with_slug("mylink"),
            &CallerPermissions::session(User::admin("root")),
        );

        assert!(matches!(outcome, Outcome::Updated { version: 1, .. }));
        assert_eq!(f.store.doc("mylink").unwrap().owner.as_str(), "bob");
    }

    #[test]
    fn test_conflicting_commit_reruns_and_reports_once() {
        let f = fixture(vec![], &["generated"]);
        f.store.fail_commits.store(2, Ordering::SeqCst);

        let outcome = resolve(&f, CreateOrUpdateRequest::new("hello"), &alice());

        assert!(matches!(outcome, Outcome::Created { .. }));
        assert_eq!(f.store.count().unwrap(), 1);
        assert_eq!(f.notifier.events(), vec![Event::PasteCreate]);
    }

    #[test]
    fn test_store_errors_surface() {
        let f = fixture(vec![], &["generated"]);
        f.store.fail_commits.store(100, Ordering::SeqCst);

        let err = f
            .resolver
            .resolve(&CreateOrUpdateRequest::new("hello"), &alice(), &RequestContext::new())
            .unwrap_err();

        assert!(matches!(err, Error::Storage(StorageError::RetriesExhausted(_))));
        assert!(f.notifier.events().is_empty());
    }

    #[test]
    fn test_end_to_end_walkthrough() {
        let f = fixture(vec![], &["generated"]);

        let first = resolve(&f, CreateOrUpdateRequest::new("hello"), &alice());
        assert_eq!(first.is_url(), Some(false));

        let second = resolve(&f, CreateOrUpdateRequest::new("http://x.test").with_slug("mylink"), &alice());
        assert_eq!(second.slug().map(Slug::as_str), Some("mylink"));
        assert_eq!(second.is_url(), Some(true));

        let third = resolve(&f, CreateOrUpdateRequest::new("updated").with_slug("mylink"), &alice());
        assert_eq!(
            third,
            Outcome::Updated {
                slug: Slug::parse("mylink").unwrap(),
                is_url: false,
                version: 1
            }
        );
    }
}
