use chrono::{DateTime, Utc};

use crate::error::{MirrorError, StoreError};

/// A resource as the service sees it: raw bytes plus bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResource {
    pub id: i64,
    pub name: String,
    pub content: Vec<u8>,
    pub content_type: String,
    pub blake3_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values written by an insert or update. `at` becomes `created_at` on insert
/// and `updated_at` on both.
pub struct Draft<'a> {
    pub name: &'a str,
    pub content: &'a [u8],
    pub content_type: &'a str,
    pub at: DateTime<Utc>,
}

impl Draft<'_> {
    #[must_use]
    pub fn hash(&self) -> String {
        blake3::hash(self.content).to_string()
    }
}

/// Relational side of a resource. Every call is atomic at the row level.
pub trait Storage: Send + Sync {
    fn new_database(&self) -> Result<(), StoreError>;

    fn insert(&self, draft: &Draft<'_>) -> Result<StoredResource, StoreError>;

    fn get(&self, name: &str) -> Result<StoredResource, StoreError>;

    fn contains(&self, name: &str) -> Result<bool, StoreError>;

    fn update(&self, draft: &Draft<'_>) -> Result<StoredResource, StoreError>;

    fn delete(&self, name: &str) -> Result<(), StoreError>;

    fn list(&self) -> Result<Vec<StoredResource>, StoreError>;
}

/// On-disk side of a resource, one file per name under the server root.
pub trait Mirror: Send + Sync {
    fn write(&self, name: &str, content: &[u8]) -> Result<(), MirrorError>;

    /// Removing a missing file succeeds.
    fn remove(&self, name: &str) -> Result<(), MirrorError>;

    fn exists(&self, name: &str) -> Result<bool, MirrorError>;

    /// BLAKE3 hash of the mirror file, `None` when there is no file.
    fn digest(&self, name: &str) -> Result<Option<String>, MirrorError>;
}
