//! snip - pastes and short links
//!
//! Umbrella crate re-exporting the workspace members:
//! - [`core`]: documents, slugs, permissions and the create-or-update resolver
//! - [`storage`]: memory and SQLite document stores
//! - [`stats`]: background statistics reporting

pub use snip_core as core;
pub use snip_stats as stats;
pub use snip_storage as storage;
