//! In-memory implementation of Repository for testing and development

use crate::core::field::Filter;
use crate::core::service::{Mutation, Record, Repository};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// In-memory repository implementation
///
/// Records are kept in a `BTreeMap` so every read comes back ordered by id.
/// Each call takes the lock once, which makes single-record operations
/// atomic; nothing spans more than one call.
pub struct InMemoryRepository<T: Record> {
    records: Arc<RwLock<BTreeMap<Uuid, T>>>,
}

impl<T: Record> InMemoryRepository<T> {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    fn matching(&self, filter: &Filter) -> Result<Vec<T>> {
        let records = self
            .records
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(records
            .values()
            .filter(|record| filter.matches(|field| record.field_value(field)))
            .cloned()
            .collect())
    }
}

impl<T: Record> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> Clone for InMemoryRepository<T> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
        }
    }
}

#[async_trait]
impl<T: Record> Repository<T> for InMemoryRepository<T> {
    async fn insert(&self, record: T) -> Result<T> {
        let mut records = self
            .records
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        if records.contains_key(&record.id()) {
            return Err(anyhow!("{} {} already exists", T::COLLECTION, record.id()));
        }
        records.insert(record.id(), record.clone());

        Ok(record)
    }

    async fn insert_unique(&self, record: T, conflict: &Filter) -> Result<Option<T>> {
        let mut records = self
            .records
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        if records.contains_key(&record.id()) {
            return Err(anyhow!("{} {} already exists", T::COLLECTION, record.id()));
        }
        if records
            .values()
            .any(|existing| conflict.matches(|field| existing.field_value(field)))
        {
            return Ok(None);
        }
        records.insert(record.id(), record.clone());

        Ok(Some(record))
    }

    async fn get(&self, id: &Uuid) -> Result<Option<T>> {
        let records = self
            .records
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(records.get(id).cloned())
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<T>> {
        self.matching(filter)
    }

    async fn count(&self, filter: &Filter) -> Result<usize> {
        let records = self
            .records
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(records
            .values()
            .filter(|record| filter.matches(|field| record.field_value(field)))
            .count())
    }

    async fn find_page(&self, filter: &Filter, offset: usize, limit: usize) -> Result<Vec<T>> {
        Ok(self
            .matching(filter)?
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn update(&self, record: T) -> Result<T> {
        let mut records = self
            .records
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let slot = records
            .get_mut(&record.id())
            .ok_or_else(|| anyhow!("{} {} not found", T::COLLECTION, record.id()))?;
        *slot = record.clone();

        Ok(record)
    }

    async fn modify(&self, id: &Uuid, change: Mutation<T>) -> Result<Option<T>> {
        let mut records = self
            .records
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let Some(slot) = records.get_mut(id) else {
            return Ok(None);
        };
        // work on a copy so a failed change leaves the stored record as it was
        let mut changed = slot.clone();
        change(&mut changed)?;
        *slot = changed.clone();

        Ok(Some(changed))
    }

    async fn delete(&self, id: &Uuid) -> Result<bool> {
        let mut records = self
            .records
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        Ok(records.remove(id).is_some())
    }

    async fn delete_where(&self, filter: &Filter) -> Result<usize> {
        let mut records = self
            .records
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let before = records.len();
        records.retain(|_, record| !filter.matches(|field| record.field_value(field)));

        Ok(before - records.len())
    }
}
