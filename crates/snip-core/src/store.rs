//! Document store seam
//!
//! Backends live in the `snip-storage` crate. Every read-decide-write
//! sequence runs inside one [`Transaction`]; [`transactional`] owns the
//! commit and re-runs the closure when the store reports a write conflict.

use crate::document::Document;
use crate::error::{Result, StorageError};
use crate::slug::Slug;
use tracing::warn;

/// Default number of times a conflicting transaction is re-run
pub const DEFAULT_MAX_RETRIES: u32 = 8;

/// A unit of atomic work against the store
///
/// Reads observe one consistent snapshot. Writes become visible only on
/// [`commit`](Transaction::commit); dropping the transaction discards them.
pub trait Transaction {
    /// Look up a document by slug
    fn find(&mut self, slug: &Slug) -> std::result::Result<Option<Document>, StorageError>;

    /// Insert a new document; the slug must not exist at commit time
    fn insert(&mut self, document: &Document) -> std::result::Result<(), StorageError>;

    /// Write an edited document; the stored version must still be
    /// `document.version - 1` at commit time
    fn update(&mut self, document: &Document) -> std::result::Result<(), StorageError>;

    /// Make all writes visible atomically
    ///
    /// Fails with [`StorageError::Conflict`] if a concurrent transaction
    /// invalidated anything this one read or wrote.
    fn commit(self: Box<Self>) -> std::result::Result<(), StorageError>;
}

/// Keyed, versioned document storage
pub trait DocumentStore: Send + Sync {
    /// Start a transaction
    fn begin(&self) -> std::result::Result<Box<dyn Transaction + '_>, StorageError>;

    /// Read a document outside of any transaction
    fn get(&self, slug: &Slug) -> std::result::Result<Option<Document>, StorageError>;

    /// Number of stored documents
    fn count(&self) -> std::result::Result<usize, StorageError>;
}

/// Run `f` atomically, retrying from scratch on write conflicts
///
/// `f` may run several times, so it must not have side effects outside the
/// transaction it is handed.
pub fn transactional<T, F>(store: &dyn DocumentStore, max_retries: u32, mut f: F) -> Result<T>
where
    F: FnMut(&mut dyn Transaction) -> Result<T>,
{
    let mut attempt = 0;

    loop {
        match run_once(store, &mut f) {
            Err(e) if e.is_retryable() => {
                if attempt >= max_retries {
                    return Err(StorageError::RetriesExhausted(max_retries).into());
                }
                attempt += 1;
                warn!(attempt = attempt, error = %e, "Transaction conflict, retrying");
            }
            other => return other,
        }
    }
}

fn run_once<T, F>(store: &dyn DocumentStore, f: &mut F) -> Result<T>
where
    F: FnMut(&mut dyn Transaction) -> Result<T>,
{
    let mut txn = store.begin()?;
    let value = f(txn.as_mut())?;
    txn.commit()?;
    Ok(value)
}
