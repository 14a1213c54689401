//! Basic snip Example
//!
//! Walks through creating, editing and reading documents with the embedded
//! core, with statistics collected in the background.
//!
//! Run with: cargo run --example basic

use std::sync::Arc;

use snip_core::{
    CallerPermissions, CreateOrUpdateRequest, DocumentReader, DocumentResolver, Outcome,
    PhoneticGenerator, RequestContext, User,
};
use snip_stats::Metrics;
use snip_storage::MemoryStorage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("snip Basic Example\n");

    let store = Arc::new(MemoryStorage::new());
    let metrics = Arc::new(Metrics::new()?);
    let (notifier, reporter) = snip_stats::channel(metrics.clone());
    let reporter = tokio::spawn(reporter.run());
    let notifier = Arc::new(notifier);

    let resolver = DocumentResolver::new(
        store.clone(),
        Arc::new(PhoneticGenerator::new()),
        notifier.clone(),
    );
    let reader = DocumentReader::new(store, notifier.clone());

    let alice = CallerPermissions::session(User::new("alice"));
    let bob = CallerPermissions::session(User::new("bob"));
    let ctx = RequestContext::new().with_user_agent("basic-example");

    // A paste with a generated slug
    let outcome = resolver.resolve(&CreateOrUpdateRequest::new("hello"), &alice, &ctx)?;
    println!("paste:        {:?}", outcome);

    // A short link at a chosen slug
    let request = CreateOrUpdateRequest::new("http://x.test").with_slug("mylink");
    println!("short link:   {:?}", resolver.resolve(&request, &alice, &ctx)?);

    // Someone else cannot take it over
    let request = CreateOrUpdateRequest::new("mine now").with_slug("mylink");
    println!("bob's edit:   {:?}", resolver.resolve(&request, &bob, &ctx)?);

    // The owner can
    let request = CreateOrUpdateRequest::new("updated").with_slug("mylink");
    let outcome = resolver.resolve(&request, &alice, &ctx)?;
    println!("alice's edit: {:?}", outcome);

    if let Outcome::Updated { slug, .. } = &outcome {
        if let Some(doc) = reader.raw(slug, &ctx)? {
            println!("raw {}:   {} (v{})", doc.slug, doc.content, doc.version);
        }
    }

    // Dropping every notifier lets the reporter finish
    drop(resolver);
    drop(reader);
    drop(notifier);
    reporter.await?;

    println!("\n{}", metrics.export()?);
    Ok(())
}
