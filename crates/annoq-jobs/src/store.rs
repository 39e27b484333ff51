//! In-memory and file-backed implementations of the store seams.
//!
//! The in-memory stores are the defaults for tests and single-process
//! deployments. [`FileArtifactStore`] persists each canonical graph as one
//! `<job_id>.json` document in the artifact directory.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use annoq_core::models::{
    AnnotationJob, CachedStatus, CanonicalGraph, GraphCounts, GraphDocument, JobStatus,
};
use annoq_core::{defaults, ArtifactStore, Error, JobStore, Result, StatusCache};

/// In-memory job record store.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, AnnotationJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: AnnotationJob) -> Result<()> {
        self.jobs.write().await.insert(job.id, job);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<AnnotationJob>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<AnnotationJob>> {
        let mut jobs: Vec<AnnotationJob> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn update_status(&self, id: Uuid, status: JobStatus) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(Error::JobNotFound(id))?;
        job.status = status;
        job.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn set_result(
        &self,
        id: Uuid,
        counts: GraphCounts,
        summary: Option<String>,
    ) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(Error::JobNotFound(id))?;
        job.counts = Some(counts);
        job.summary = summary;
        job.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn set_title(&self, id: Uuid, title: &str) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(Error::JobNotFound(id))?;
        job.title = title.to_string();
        job.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.jobs.write().await.remove(&id).is_some())
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<usize> {
        let mut jobs = self.jobs.write().await;
        Ok(ids.iter().filter(|id| jobs.remove(id).is_some()).count())
    }
}

/// In-memory artifact store.
#[derive(Default)]
pub struct MemoryArtifactStore {
    graphs: RwLock<HashMap<Uuid, CanonicalGraph>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, id: Uuid, graph: &CanonicalGraph) -> Result<()> {
        self.graphs.write().await.insert(id, graph.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<CanonicalGraph>> {
        Ok(self.graphs.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.graphs.write().await.remove(&id);
        Ok(())
    }
}

/// Artifact store writing one `<job_id>.json` graph document per job.
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn put(&self, id: Uuid, graph: &CanonicalGraph) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let document = serde_json::to_vec(&graph.to_document())?;
        tokio::fs::write(self.path_for(id), document).await?;
        debug!(job_id = %id, "artifact written");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<CanonicalGraph>> {
        let raw = match tokio::fs::read(self.path_for(id)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let document: GraphDocument = serde_json::from_slice(&raw)?;
        Ok(Some(CanonicalGraph::from_document(document)))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory TTL status cache, the default when no Redis server is
/// configured.
pub struct MemoryStatusCache {
    entries: RwLock<HashMap<Uuid, (CachedStatus, Instant)>>,
    ttl: Duration,
}

impl MemoryStatusCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }
}

impl Default for MemoryStatusCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(defaults::CACHE_TTL_SECS))
    }
}

#[async_trait]
impl StatusCache for MemoryStatusCache {
    async fn get(&self, id: Uuid) -> Option<CachedStatus> {
        let mut entries = self.entries.write().await;
        match entries.get(&id) {
            Some((_, stored_at)) if stored_at.elapsed() > self.ttl => {
                entries.remove(&id);
                None
            }
            Some((entry, _)) => Some(entry.clone()),
            None => None,
        }
    }

    async fn put(&self, id: Uuid, entry: CachedStatus) {
        let mut entries = self.entries.write().await;
        // expired entries are swept on write so the map cannot grow with
        // jobs that are never polled again
        entries.retain(|_, (_, stored_at)| stored_at.elapsed() <= self.ttl);
        entries.insert(id, (entry, Instant::now()));
    }

    async fn invalidate(&self, id: Uuid) {
        self.entries.write().await.remove(&id);
    }
}
