//! Read path - serving raw documents

use crate::document::Document;
use crate::error::Result;
use crate::events::{Notifier, RequestContext};
use crate::slug::Slug;
use crate::store::DocumentStore;
use std::sync::Arc;
use tracing::debug;

/// Serves stored documents and counts impressions
pub struct DocumentReader {
    store: Arc<dyn DocumentStore>,
    notifier: Arc<dyn Notifier>,
}

impl DocumentReader {
    pub fn new(store: Arc<dyn DocumentStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Fetch a document by slug, reporting an impression when it exists
    pub fn raw(&self, slug: &Slug, ctx: &RequestContext) -> Result<Option<Document>> {
        let document = self.store.get(slug)?;

        match &document {
            Some(_) => self.notifier.report_impression(slug, false, ctx),
            None => debug!(slug = %slug, "No document found"),
        }

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentKind, UserId};
    use crate::events::testing::RecordingNotifier;
    use crate::store::testing::TestStore;

    #[test]
    fn test_raw_reports_impressions() {
        let slug = Slug::parse("hello").unwrap();
        let store = Arc::new(TestStore::with([Document::new(
            slug.clone(),
            UserId::new("alice"),
            "hi there",
            DocumentKind::Paste,
        )]));
        let notifier = Arc::new(RecordingNotifier::default());
        let reader = DocumentReader::new(store, notifier.clone());

        let doc = reader.raw(&slug, &RequestContext::new()).unwrap().unwrap();
        assert_eq!(doc.content, "hi there");
        assert_eq!(notifier.impressions(), vec![(slug, false)]);
    }

    #[test]
    fn test_missing_document_reports_nothing() {
        let notifier = Arc::new(RecordingNotifier::default());
        let reader = DocumentReader::new(Arc::new(TestStore::default()), notifier.clone());

        let missing = Slug::parse("missing").unwrap();
        assert!(reader.raw(&missing, &RequestContext::new()).unwrap().is_none());
        assert!(notifier.impressions().is_empty());
    }
}
