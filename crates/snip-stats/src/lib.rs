//! snip Statistics
//!
//! Outcome events travel from the request path to a background task over an
//! unbounded channel:
//! - [`ChannelNotifier`]: the [`snip_core::Notifier`] handed to resolvers
//! - [`Reporter`]: drains the channel into [`Metrics`]
//! - [`Metrics`]: Prometheus counters, exported in text format

pub mod metrics;
pub mod reporter;

pub use metrics::{Metrics, StatsError};
pub use reporter::{channel, ChannelNotifier, Report, Reporter};
