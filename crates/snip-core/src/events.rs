//! Outcome events and the notifier seam
//!
//! Reports are telemetry. A [`Notifier`] must return immediately and must
//! never fail; whatever it does with a report happens off the request path.

use crate::slug::Slug;

/// Something worth counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    PasteCreate,
    UrlCreate,
    DocEdit,
    ApiKeyUse,
}

impl Event {
    /// Creation event for freshly classified content
    pub fn create(is_url: bool) -> Self {
        if is_url {
            Event::UrlCreate
        } else {
            Event::PasteCreate
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Event::PasteCreate => "paste_create",
            Event::UrlCreate => "url_create",
            Event::DocEdit => "doc_edit",
            Event::ApiKeyUse => "api_key_use",
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a request came from, as far as statistics care
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub user_agent: Option<String>,
    pub remote: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }
}

/// Fire-and-forget sink for statistics
pub trait Notifier: Send + Sync {
    fn report_event(&self, event: Event, ctx: &RequestContext);

    fn report_impression(&self, slug: &Slug, cached: bool, ctx: &RequestContext);
}

/// Notifier that drops every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn report_event(&self, _event: Event, _ctx: &RequestContext) {}

    fn report_impression(&self, _slug: &Slug, _cached: bool, _ctx: &RequestContext) {}
}
