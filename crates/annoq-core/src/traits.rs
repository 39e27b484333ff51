//! Core traits for annoq's external collaborators.
//!
//! The durable job record store, the artifact store, and the key/value
//! status cache are external systems; these traits are the seams the
//! orchestrator talks through, enabling pluggable backends and testability.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{AnnotationJob, CachedStatus, CanonicalGraph, GraphCounts, JobStatus};

/// Durable store for annotation job records.
///
/// A job record is only ever updated by the orchestrator, never
/// read-modified concurrently by two workers for the same id.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job record.
    async fn create(&self, job: AnnotationJob) -> Result<()>;

    /// Fetch a job record by id.
    async fn get(&self, id: Uuid) -> Result<Option<AnnotationJob>>;

    /// List all job records, newest first.
    async fn list(&self) -> Result<Vec<AnnotationJob>>;

    /// Update the lifecycle status (and `updated_at`).
    async fn update_status(&self, id: Uuid, status: JobStatus) -> Result<()>;

    /// Record completion results: counts and an optional summary.
    async fn set_result(&self, id: Uuid, counts: GraphCounts, summary: Option<String>)
        -> Result<()>;

    /// Update the job title.
    async fn set_title(&self, id: Uuid, title: &str) -> Result<()>;

    /// Delete a job record. Returns false when the id is unknown.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Delete several job records, returning how many existed.
    async fn delete_many(&self, ids: &[Uuid]) -> Result<usize>;
}

/// Store for persisted canonical graph artifacts, keyed by job id.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist the graph document for a job.
    async fn put(&self, id: Uuid, graph: &CanonicalGraph) -> Result<()>;

    /// Fetch the graph for a job, if materialized.
    async fn get(&self, id: Uuid) -> Result<Option<CanonicalGraph>>;

    /// Remove the artifact for a job, if present.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Short-TTL read-through cache of `{status, graph}` pairs by job id.
///
/// Cache failures must degrade to a miss, never fail a lookup.
#[async_trait]
pub trait StatusCache: Send + Sync {
    async fn get(&self, id: Uuid) -> Option<CachedStatus>;

    async fn put(&self, id: Uuid, entry: CachedStatus);

    async fn invalidate(&self, id: Uuid);
}
