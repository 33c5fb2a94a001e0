//! Resource access primitives shared by every handler
//!
//! - [`find_or_fail`]: parse an id, load the record, or fail with 400/404
//! - [`create_or_fail`]: validate then persist a new record
//! - [`create_unique_or_fail`]: the same, refusing a conflicting record
//! - [`update_fields`]: atomic partial update restricted to an allow-list
//! - [`cascade_delete`]: delete a parent, then best-effort delete its children

use crate::core::error::{ApiError, ApiResult, ValidationError};
use crate::core::field::Filter;
use crate::core::service::{Record, Repository};
use anyhow::Result;
use futures::future::{BoxFuture, join_all};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

/// Parse a raw identifier for collection `T`
pub fn parse_id<T: Record>(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| {
        ValidationError::MalformedId {
            collection: T::COLLECTION.to_string(),
            value: raw.to_string(),
        }
        .into()
    })
}

/// Load a record by raw identifier
///
/// Malformed ids are a 400, well-formed ids without a record a 404.
pub async fn find_or_fail<T, R>(repository: &R, raw_id: &str) -> ApiResult<T>
where
    T: Record,
    R: Repository<T> + ?Sized,
{
    let id = parse_id::<T>(raw_id)?;
    find_by_id_or_fail(repository, id).await
}

/// Load a record by an already parsed identifier
pub async fn find_by_id_or_fail<T, R>(repository: &R, id: Uuid) -> ApiResult<T>
where
    T: Record,
    R: Repository<T> + ?Sized,
{
    repository
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(T::COLLECTION, id))
}

/// Validate `record` and persist it
pub async fn create_or_fail<T, R>(repository: &R, record: T) -> ApiResult<T>
where
    T: Record + Validate,
    R: Repository<T> + ?Sized,
{
    record.validate()?;
    let created = repository.insert(record).await?;
    tracing::info!(collection = T::COLLECTION, id = %created.id(), "record created");
    Ok(created)
}

/// Validate `record` and persist it unless a record matching `conflict` exists
///
/// The conflict check and the insert are one atomic step. Returns `None`
/// when a conflicting record is already stored.
pub async fn create_unique_or_fail<T, R>(repository: &R, record: T, conflict: &Filter) -> ApiResult<Option<T>>
where
    T: Record + Validate,
    R: Repository<T> + ?Sized,
{
    record.validate()?;
    let created = repository.insert_unique(record, conflict).await?;
    if let Some(created) = &created {
        tracing::info!(collection = T::COLLECTION, id = %created.id(), "record created");
    }
    Ok(created)
}

/// Apply the allowed subset of `payload` to the stored record `id`
///
/// Only keys listed in `allowed` are written; every other key, including
/// ones naming real fields, is ignored. Absent or `null` keys keep the
/// stored value. A payload that carries none of the allowed keys is
/// rejected. The merge and validation run against the current stored
/// record inside one repository step, so concurrent changes to other
/// fields are never overwritten.
pub async fn update_fields<T, R>(
    repository: &R,
    id: Uuid,
    allowed: &'static [&'static str],
    payload: &Value,
) -> ApiResult<T>
where
    T: Record + Validate + DeserializeOwned,
    R: Repository<T> + ?Sized,
{
    let changes = allowed_changes(allowed, payload)?;
    let updated = repository
        .modify(
            &id,
            Box::new(move |record: &mut T| -> Result<()> {
                let merged = merge_fields(record, &changes)?;
                merged.validate().map_err(ApiError::from)?;
                *record = merged;
                Ok(())
            }),
        )
        .await?;

    let updated = updated.ok_or_else(|| ApiError::not_found(T::COLLECTION, id))?;
    tracing::info!(collection = T::COLLECTION, %id, "record updated");
    Ok(updated)
}

/// The allowed, non-null keys of a partial update
fn allowed_changes(allowed: &'static [&'static str], payload: &Value) -> ApiResult<Map<String, Value>> {
    let no_fields = || ValidationError::NoUpdatableFields {
        allowed: allowed.to_vec(),
    };

    let changes: Map<String, Value> = payload
        .as_object()
        .ok_or_else(no_fields)?
        .iter()
        .filter(|(key, value)| allowed.contains(&key.as_str()) && !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    if changes.is_empty() {
        return Err(no_fields().into());
    }
    Ok(changes)
}

/// Overlay `changes` onto a copy of `record`
fn merge_fields<T>(record: &T, changes: &Map<String, Value>) -> ApiResult<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut current = serde_json::to_value(record)?;
    let fields = current
        .as_object_mut()
        .ok_or_else(|| ApiError::Internal("record did not serialize to an object".to_string()))?;
    for (key, value) in changes {
        fields.insert(key.clone(), value.clone());
    }

    serde_json::from_value(current).map_err(|e| {
        ValidationError::InvalidBody {
            message: e.to_string(),
        }
        .into()
    })
}

/// One child collection to clean up after a parent deletion
pub struct CascadeStep {
    label: &'static str,
    run: BoxFuture<'static, Result<usize>>,
}

impl CascadeStep {
    pub fn new<F>(label: &'static str, run: F) -> Self
    where
        F: std::future::Future<Output = Result<usize>> + Send + 'static,
    {
        Self {
            label,
            run: Box::pin(run),
        }
    }
}

/// Delete `parent`, then run every child cleanup
///
/// The parent deletion is the operation's outcome. Child cleanups run
/// concurrently after it and their failures are only logged: a crash or
/// error part way through can leave orphaned children behind.
pub async fn cascade_delete<T, R>(repository: &R, parent: &T, children: Vec<CascadeStep>) -> ApiResult<()>
where
    T: Record,
    R: Repository<T> + ?Sized,
{
    let parent_id = parent.id();
    repository.delete(&parent_id).await?;
    tracing::info!(collection = T::COLLECTION, id = %parent_id, "record deleted");

    let outcomes = join_all(
        children
            .into_iter()
            .map(|step| async move { (step.label, step.run.await) }),
    )
    .await;

    for (label, outcome) in outcomes {
        match outcome {
            Ok(removed) => tracing::info!(
                parent = T::COLLECTION,
                id = %parent_id,
                children = label,
                removed,
                "cascade delete finished"
            ),
            Err(e) => tracing::warn!(
                parent = T::COLLECTION,
                id = %parent_id,
                children = label,
                error = %e,
                "cascade delete failed"
            ),
        }
    }

    Ok(())
}
