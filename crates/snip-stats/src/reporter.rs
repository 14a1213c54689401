//! Background statistics reporting

use crate::metrics::Metrics;
use snip_core::{Event, Notifier, RequestContext, Slug};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// One report on its way to the background task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Event {
        event: Event,
        ctx: RequestContext,
    },
    Impression {
        slug: Slug,
        cached: bool,
        ctx: RequestContext,
    },
}

/// Create a connected notifier / reporter pair
///
/// The host spawns [`Reporter::run`] and owns its lifetime; the task ends
/// once every [`ChannelNotifier`] clone has been dropped.
pub fn channel(metrics: Arc<Metrics>) -> (ChannelNotifier, Reporter) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (ChannelNotifier { sender }, Reporter { receiver, metrics })
}

/// Notifier that hands reports to a [`Reporter`] without waiting
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Report>,
}

impl ChannelNotifier {
    fn send(&self, report: Report) {
        // The reporter going away must never affect a request
        if let Err(e) = self.sender.send(report) {
            debug!(report = ?e.0, "Statistics reporter gone, dropping report");
        }
    }
}

impl Notifier for ChannelNotifier {
    fn report_event(&self, event: Event, ctx: &RequestContext) {
        self.send(Report::Event {
            event,
            ctx: ctx.clone(),
        });
    }

    fn report_impression(&self, slug: &Slug, cached: bool, ctx: &RequestContext) {
        self.send(Report::Impression {
            slug: slug.clone(),
            cached,
            ctx: ctx.clone(),
        });
    }
}

/// Drains reports into [`Metrics`]
pub struct Reporter {
    receiver: mpsc::UnboundedReceiver<Report>,
    metrics: Arc<Metrics>,
}

impl Reporter {
    /// Process reports until every sender is dropped
    pub async fn run(mut self) {
        let mut processed = 0u64;

        while let Some(report) = self.receiver.recv().await {
            self.record(&report);
            processed += 1;
        }

        info!(processed = processed, "Statistics reporter stopped");
    }

    fn record(&self, report: &Report) {
        match report {
            Report::Event { event, ctx } => {
                debug!(
                    event = %event,
                    user_agent = ctx.user_agent.as_deref().unwrap_or("-"),
                    remote = ctx.remote.as_deref().unwrap_or("-"),
                    "Event"
                );
                self.metrics.record_event(*event);
            }
            Report::Impression { slug, cached, ctx } => {
                debug!(
                    slug = %slug,
                    cached = cached,
                    user_agent = ctx.user_agent.as_deref().unwrap_or("-"),
                    "Impression"
                );
                self.metrics.record_impression(*cached);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snip_core::{
        CallerPermissions, CreateOrUpdateRequest, Document, DocumentResolver, DocumentStore,
        PhoneticGenerator, StorageError, Transaction, User,
    };

    /// A store that has nothing and accepts every write
    struct SinkStore;

    struct SinkTxn;

    impl Transaction for SinkTxn {
        fn find(&mut self, _slug: &Slug) -> Result<Option<Document>, StorageError> {
            Ok(None)
        }

        fn insert(&mut self, _document: &Document) -> Result<(), StorageError> {
            Ok(())
        }

        fn update(&mut self, _document: &Document) -> Result<(), StorageError> {
            Ok(())
        }

        fn commit(self: Box<Self>) -> Result<(), StorageError> {
            Ok(())
        }
    }

    impl DocumentStore for SinkStore {
        fn begin(&self) -> Result<Box<dyn Transaction + '_>, StorageError> {
            Ok(Box::new(SinkTxn))
        }

        fn get(&self, _slug: &Slug) -> Result<Option<Document>, StorageError> {
            Ok(None)
        }

        fn count(&self) -> Result<usize, StorageError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_reports_reach_metrics() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let (notifier, reporter) = channel(metrics.clone());
        let task = tokio::spawn(reporter.run());

        let ctx = RequestContext::new().with_user_agent("test");
        notifier.report_event(Event::UrlCreate, &ctx);
        notifier.report_event(Event::ApiKeyUse, &ctx);
        notifier.report_impression(&Slug::parse("abc").unwrap(), false, &ctx);

        drop(notifier);
        task.await.unwrap();

        assert_eq!(metrics.event_count(Event::UrlCreate), 1);
        assert_eq!(metrics.event_count(Event::ApiKeyUse), 1);
        assert_eq!(metrics.impression_count(), 1);
    }

    #[tokio::test]
    async fn test_send_after_reporter_stopped_is_swallowed() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let (notifier, reporter) = channel(metrics.clone());
        drop(reporter);

        notifier.report_event(Event::PasteCreate, &RequestContext::new());
        assert_eq!(metrics.event_count(Event::PasteCreate), 0);
    }

    #[tokio::test]
    async fn test_resolver_does_not_wait_for_reporter() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let (notifier, reporter) = channel(metrics.clone());
        let resolver = DocumentResolver::new(
            Arc::new(SinkStore),
            Arc::new(PhoneticGenerator::new()),
            Arc::new(notifier),
        );
        let caller = CallerPermissions::session(User::new("alice"));

        // Nothing drains the channel yet; resolving must still complete
        for _ in 0..3 {
            resolver
                .resolve(&CreateOrUpdateRequest::new("hello"), &caller, &RequestContext::new())
                .unwrap();
        }
        assert_eq!(metrics.event_count(Event::PasteCreate), 0);

        drop(resolver);
        reporter.run().await;
        assert_eq!(metrics.event_count(Event::PasteCreate), 3);
    }
}
