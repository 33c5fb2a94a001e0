//! Service traits for record persistence and blob storage
//!
//! The API core never talks to a database driver directly. It consumes a
//! generic [`Repository`] per collection and a single [`BlobStore`], so the
//! backends can be swapped without touching authorization or pagination.

use crate::core::field::{FieldValue, Filter};
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// In-place change applied by [`Repository::modify`]
///
/// An error leaves the stored record untouched and is returned unchanged.
pub type Mutation<T> = Box<dyn FnOnce(&mut T) -> Result<()> + Send>;

/// A persisted record of one collection
pub trait Record: Clone + Serialize + Send + Sync + 'static {
    /// Collection name, used in error messages and logs
    const COLLECTION: &'static str;

    /// Primary identifier
    fn id(&self) -> Uuid;

    /// Dynamic field access used to evaluate [`Filter`]s
    fn field_value(&self, field: &str) -> Option<FieldValue>;
}

/// Persistence interface for one collection
///
/// Multi-record reads are always ordered by primary identifier ascending so
/// that paging over them is stable.
#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    /// Persist a new record
    async fn insert(&self, record: T) -> Result<T>;

    /// Persist `record` unless a record matching `conflict` already exists
    ///
    /// Check and insert are one atomic step. Returns `None` on conflict.
    async fn insert_unique(&self, record: T, conflict: &Filter) -> Result<Option<T>>;

    /// Get a record by ID
    async fn get(&self, id: &Uuid) -> Result<Option<T>>;

    /// All records matching the filter
    async fn find(&self, filter: &Filter) -> Result<Vec<T>>;

    /// First record matching the filter
    async fn find_one(&self, filter: &Filter) -> Result<Option<T>> {
        Ok(self.find(filter).await?.into_iter().next())
    }

    /// Number of records matching the filter
    async fn count(&self, filter: &Filter) -> Result<usize>;

    /// One window of the matching records
    async fn find_page(&self, filter: &Filter, offset: usize, limit: usize) -> Result<Vec<T>>;

    /// Replace an existing record
    async fn update(&self, record: T) -> Result<T>;

    /// Apply `change` to the current stored record as one atomic step
    ///
    /// Returns `None` when no record has this id.
    async fn modify(&self, id: &Uuid, change: Mutation<T>) -> Result<Option<T>>;

    /// Delete a record, returning whether it existed
    async fn delete(&self, id: &Uuid) -> Result<bool>;

    /// Delete every record matching the filter, returning how many were removed
    async fn delete_where(&self, filter: &Filter) -> Result<usize>;
}

/// Bytes plus the metadata stored alongside them
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub key: String,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
    pub data: Bytes,
}

/// Binary content storage addressed by opaque keys
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `key`; the write is durable once this returns
    async fn put(&self, blob: StoredBlob) -> Result<()>;

    /// Fetch the blob stored under `key`
    async fn get(&self, key: &str) -> Result<Option<StoredBlob>>;

    /// Delete the blob stored under `key`
    async fn delete(&self, key: &str) -> Result<()>;
}
