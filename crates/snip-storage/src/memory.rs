//! In-memory storage backend

use parking_lot::RwLock;
use snip_core::{Document, DocumentStore, Slug, StorageError, Transaction};
use std::collections::HashMap;
use tracing::debug;

/// In-memory storage backend
///
/// Fast, volatile storage suitable for development and tests. Data is lost
/// when the process exits.
///
/// Transactions are optimistic: reads go straight to the shared map and are
/// remembered together with the version they saw. Commit takes the write
/// lock, checks that nothing read or written has changed since, and only
/// then applies the staged writes.
#[derive(Default)]
pub struct MemoryStorage {
    documents: RwLock<HashMap<Slug, Document>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

/// What a transaction observed for one slug: `None` if absent, else the version
type Observed = Option<u64>;

enum Write {
    Insert(Document),
    Update(Document),
}

impl Write {
    fn document(&self) -> &Document {
        match self {
            Write::Insert(doc) | Write::Update(doc) => doc,
        }
    }
}

struct MemoryTransaction<'a> {
    storage: &'a MemoryStorage,
    reads: HashMap<Slug, Observed>,
    writes: Vec<Write>,
}

impl MemoryTransaction<'_> {
    fn staged(&self, slug: &Slug) -> Option<&Document> {
        self.writes
            .iter()
            .rev()
            .map(Write::document)
            .find(|doc| &doc.slug == slug)
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn find(&mut self, slug: &Slug) -> Result<Option<Document>, StorageError> {
        if let Some(doc) = self.staged(slug) {
            return Ok(Some(doc.clone()));
        }

        let found = self.storage.documents.read().get(slug).cloned();
        self.reads
            .entry(slug.clone())
            .or_insert_with(|| found.as_ref().map(|doc| doc.version));

        Ok(found)
    }

    fn insert(&mut self, document: &Document) -> Result<(), StorageError> {
        if self.staged(&document.slug).is_some() {
            return Err(StorageError::Conflict(document.slug.to_string()));
        }
        self.writes.push(Write::Insert(document.clone()));
        Ok(())
    }

    fn update(&mut self, document: &Document) -> Result<(), StorageError> {
        self.writes.push(Write::Update(document.clone()));
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let MemoryTransaction {
            storage,
            reads,
            writes,
        } = *self;

        let mut documents = storage.documents.write();
        let current = |slug: &Slug| documents.get(slug).map(|doc| doc.version);

        for (slug, observed) in &reads {
            if current(slug) != *observed {
                debug!(slug = %slug, "Read set changed before commit");
                return Err(StorageError::Conflict(slug.to_string()));
            }
        }

        for write in &writes {
            let valid = match write {
                Write::Insert(doc) => current(&doc.slug).is_none(),
                Write::Update(doc) => current(&doc.slug) == doc.version.checked_sub(1),
            };
            if !valid {
                return Err(StorageError::Conflict(write.document().slug.to_string()));
            }
        }

        for write in writes {
            let doc = match write {
                Write::Insert(doc) | Write::Update(doc) => doc,
            };
            documents.insert(doc.slug.clone(), doc);
        }

        Ok(())
    }
}

impl DocumentStore for MemoryStorage {
    fn begin(&self) -> Result<Box<dyn Transaction + '_>, StorageError> {
        Ok(Box::new(MemoryTransaction {
            storage: self,
            reads: HashMap::new(),
            writes: Vec::new(),
        }))
    }

    fn get(&self, slug: &Slug) -> Result<Option<Document>, StorageError> {
        Ok(self.documents.read().get(slug).cloned())
    }

    fn count(&self) -> Result<usize, StorageError> {
        Ok(self.documents.read().len())
    }
}
