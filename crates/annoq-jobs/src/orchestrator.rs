//! Annotation job orchestrator.
//!
//! Owns job submission, asynchronous execution, cooperative cancellation,
//! caching, persistence, and status notification. The pipeline per job is
//! validate → order → compile → execute → group → persist.
//!
//! State machine: `RUNNING → COMPLETE | FAILED`, and `RUNNING → CANCELLED`
//! via explicit cancellation. All states except `RUNNING` are terminal.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use annoq_backends::{ExecuteOptions, GraphBackend};
use annoq_core::models::{
    AnnotationJob, AnnotationRequest, CachedStatus, CanonicalGraph, JobHandle, JobStatus,
    JobStatusView, JobSummary, NodeMap,
};
use annoq_core::{
    group_graph, heuristic_sort, validate_request, CancelToken, Error, JobEvent, JobEventBus,
    Result, SchemaRegistry,
};
use annoq_core::traits::{ArtifactStore, JobStore, StatusCache};

use crate::config::ServiceConfig;
use crate::registry::CancelRegistry;

/// Per-submission options.
#[derive(Debug, Clone, Copy)]
pub struct SubmitOptions {
    /// Result cap, falling back to the configured default.
    pub limit: Option<u64>,
    /// Fetch declared properties for matched entities.
    pub properties: bool,
    /// Track the execution as an asynchronous job. When false the query
    /// runs synchronously and returns the graph directly.
    pub tracked: bool,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            limit: None,
            properties: true,
            tracked: true,
        }
    }
}

/// Result of a submission: the materialized graph (direct query) or a
/// handle onto the tracked job.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Graph(CanonicalGraph),
    Job(JobHandle),
}

/// The annotation service. Composes the validator, orderer, one backend,
/// and the stores; each tracked job executes on an independent task.
pub struct AnnotationService<B> {
    backend: Arc<B>,
    schema: Arc<SchemaRegistry>,
    jobs: Arc<dyn JobStore>,
    artifacts: Arc<dyn ArtifactStore>,
    cache: Arc<dyn StatusCache>,
    registry: Arc<CancelRegistry>,
    events: JobEventBus,
    config: ServiceConfig,
}

impl<B> Clone for AnnotationService<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            schema: Arc::clone(&self.schema),
            jobs: Arc::clone(&self.jobs),
            artifacts: Arc::clone(&self.artifacts),
            cache: Arc::clone(&self.cache),
            registry: Arc::clone(&self.registry),
            events: self.events.clone(),
            config: self.config.clone(),
        }
    }
}

impl<B: GraphBackend + 'static> AnnotationService<B> {
    pub fn new(
        backend: Arc<B>,
        schema: Arc<SchemaRegistry>,
        jobs: Arc<dyn JobStore>,
        artifacts: Arc<dyn ArtifactStore>,
        cache: Arc<dyn StatusCache>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            backend,
            schema,
            jobs,
            artifacts,
            cache,
            registry: Arc::new(CancelRegistry::new()),
            events: JobEventBus::default(),
            config,
        }
    }

    /// The notification bus; subscribers of a job id receive a one-shot
    /// push when that job reaches a terminal state.
    pub fn events(&self) -> &JobEventBus {
        &self.events
    }

    /// Wait until the job reaches a terminal state. Resolves immediately
    /// when the job record is already terminal, so late subscribers are not
    /// left waiting for an event that was emitted before they joined. The
    /// subscription is opened before the record is read so a transition in
    /// between is not missed.
    pub async fn notify(&self, id: Uuid) -> Option<JobEvent> {
        let rx = self.events.subscribe();
        if let Ok(Some(job)) = self.jobs.get(id).await {
            if job.status.is_terminal() {
                return Some(JobEvent {
                    job_id: id,
                    status: job.status,
                    graph_available: job.status == JobStatus::Complete,
                });
            }
        }
        JobEventBus::recv_terminal(rx, id).await
    }

    /// Whether a worker currently owns this job id.
    pub fn has_active_worker(&self, id: Uuid) -> bool {
        self.registry.contains(id)
    }

    /// Submit a query: validate, order, compile, then either run it
    /// synchronously or hand it to an independent worker task.
    pub async fn submit(
        &self,
        request: AnnotationRequest,
        options: SubmitOptions,
    ) -> Result<SubmitOutcome> {
        let (request, node_map) = self.prepare(request)?;
        let limit = options.limit.or(self.config.default_limit);
        let compiled = self.backend.compile(&request, &node_map, limit)?;
        let exec = ExecuteOptions {
            properties: options.properties,
        };

        if !options.tracked {
            let token = CancelToken::new();
            let graph = self.backend.execute(&compiled, &exec, &token).await?;
            return Ok(SubmitOutcome::Graph(group_graph(graph)));
        }

        let job = AnnotationJob::new(request, compiled);
        let handle = JobHandle {
            job_id: job.id,
            title: job.title.clone(),
            status: job.status,
        };
        self.jobs.create(job.clone()).await?;

        let token = self.registry.try_register(job.id).ok_or_else(|| {
            Error::Internal(format!("job {} already has an active worker", job.id))
        })?;
        info!(job_id = %job.id, title = %job.title, "annotation job submitted");
        self.spawn_worker(job, token, exec);

        Ok(SubmitOutcome::Job(handle))
    }

    /// Look up a job's status, reading through the cache first.
    ///
    /// A `RUNNING`/`COMPLETE` record with no materialized artifact and no
    /// active worker means the original worker died silently; the same
    /// compiled query is re-triggered once and `RUNNING` reported.
    pub async fn status(&self, id: Uuid) -> Result<JobStatusView> {
        let job = self.jobs.get(id).await?.ok_or(Error::JobNotFound(id))?;

        if let Some(cached) = self.cache.get(id).await {
            debug!(job_id = %id, status = %cached.status, "status served from cache");
            return Ok(view(job, cached.status, cached.graph));
        }

        match job.status {
            JobStatus::Running => {
                if !self.registry.contains(id) {
                    self.requery(&job).await?;
                }
                Ok(view(job, JobStatus::Running, None))
            }
            JobStatus::Complete => match self.artifacts.get(id).await? {
                Some(graph) => {
                    self.cache
                        .put(
                            id,
                            CachedStatus {
                                status: JobStatus::Complete,
                                graph: Some(graph.clone()),
                            },
                        )
                        .await;
                    Ok(view(job, JobStatus::Complete, Some(graph)))
                }
                None => {
                    if !self.registry.contains(id) {
                        self.requery(&job).await?;
                    }
                    Ok(view(job, JobStatus::Running, None))
                }
            },
            status => Ok(view(job, status, None)),
        }
    }

    /// Request cancellation. If the job has an active worker the signal is
    /// cooperative and observed at its next checkpoint; otherwise the
    /// request is treated as a deletion of the record and any artifacts.
    pub async fn cancel(&self, id: Uuid) -> Result<()> {
        if self.registry.signal(id) {
            info!(job_id = %id, "cancellation signalled");
            return Ok(());
        }
        debug!(job_id = %id, "no active worker, treating cancel as delete");
        self.delete(id).await
    }

    /// Delete a job record, its artifact, and its cache entry.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let existed = self.jobs.delete(id).await?;
        self.artifacts.delete(id).await?;
        self.cache.invalidate(id).await;
        if existed {
            info!(job_id = %id, "job deleted");
            Ok(())
        } else {
            Err(Error::JobNotFound(id))
        }
    }

    /// Delete several jobs, returning how many records existed.
    pub async fn delete_many(&self, ids: &[Uuid]) -> Result<usize> {
        let removed = self.jobs.delete_many(ids).await?;
        for id in ids {
            self.artifacts.delete(*id).await?;
            self.cache.invalidate(*id).await;
        }
        info!(requested = ids.len(), removed, "bulk delete");
        Ok(removed)
    }

    /// Rename a job.
    pub async fn update_title(&self, id: Uuid, title: &str) -> Result<()> {
        self.jobs.set_title(id, title).await
    }

    /// All job records as summary rows, newest first.
    pub async fn history(&self) -> Result<Vec<JobSummary>> {
        Ok(self.jobs.list().await?.iter().map(JobSummary::from).collect())
    }

    fn prepare(&self, mut request: AnnotationRequest) -> Result<(AnnotationRequest, NodeMap)> {
        request.assign_predicate_ids();
        let node_map = validate_request(&request, &self.schema)?;
        let request = if self.config.heuristic_sort {
            heuristic_sort(request, &node_map, &self.config.graph_info)
        } else {
            request
        };
        Ok((request, node_map))
    }

    fn spawn_worker(&self, job: AnnotationJob, token: CancelToken, exec: ExecuteOptions) {
        let service = self.clone();
        tokio::spawn(async move {
            service.run_worker(job, token, exec).await;
        });
    }

    async fn run_worker(self, job: AnnotationJob, token: CancelToken, exec: ExecuteOptions) {
        let job_id = job.id;
        let started = Instant::now();

        match self.execute_job(&job, &exec, &token).await {
            Ok(graph) => {
                let status = match self.persist_success(job_id, &graph).await {
                    Ok(()) => {
                        info!(
                            job_id = %job_id,
                            duration_ms = started.elapsed().as_millis() as u64,
                            node_count = graph.node_count,
                            edge_count = graph.edge_count,
                            "annotation complete"
                        );
                        JobStatus::Complete
                    }
                    Err(e) => {
                        error!(job_id = %job_id, error = %e, "failed to persist job result");
                        let _ = self.jobs.update_status(job_id, JobStatus::Failed).await;
                        JobStatus::Failed
                    }
                };
                self.events.emit(JobEvent {
                    job_id,
                    status,
                    graph_available: status == JobStatus::Complete,
                });
            }
            Err(Error::Cancelled) => {
                info!(job_id = %job_id, "annotation cancelled");
                let _ = self.jobs.update_status(job_id, JobStatus::Cancelled).await;
                self.cache
                    .put(
                        job_id,
                        CachedStatus {
                            status: JobStatus::Cancelled,
                            graph: None,
                        },
                    )
                    .await;
                self.events.emit(JobEvent {
                    job_id,
                    status: JobStatus::Cancelled,
                    graph_available: false,
                });
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "annotation failed");
                let _ = self.jobs.update_status(job_id, JobStatus::Failed).await;
                self.cache
                    .put(
                        job_id,
                        CachedStatus {
                            status: JobStatus::Failed,
                            graph: None,
                        },
                    )
                    .await;
                self.events.emit(JobEvent {
                    job_id,
                    status: JobStatus::Failed,
                    graph_available: false,
                });
            }
        }

        self.registry.remove(job_id);
    }

    async fn execute_job(
        &self,
        job: &AnnotationJob,
        exec: &ExecuteOptions,
        token: &CancelToken,
    ) -> Result<CanonicalGraph> {
        token.checkpoint()?;
        let graph = self.backend.execute(&job.compiled, exec, token).await?;
        token.checkpoint()?;
        Ok(group_graph(graph))
    }

    async fn persist_success(&self, id: Uuid, graph: &CanonicalGraph) -> Result<()> {
        let counts = graph.counts();
        let summary = format!("{} nodes, {} edges", counts.node_count, counts.edge_count);
        self.artifacts.put(id, graph).await?;
        self.jobs.set_result(id, counts, Some(summary)).await?;
        self.jobs.update_status(id, JobStatus::Complete).await?;
        self.cache
            .put(
                id,
                CachedStatus {
                    status: JobStatus::Complete,
                    graph: Some(graph.clone()),
                },
            )
            .await;
        Ok(())
    }

    /// Re-trigger execution for a job whose worker is gone. Registration is
    /// an atomic check-and-insert, so concurrent polls re-submit at most
    /// once. The properties path is used since the original flag is not
    /// recorded on the job.
    async fn requery(&self, job: &AnnotationJob) -> Result<()> {
        let Some(token) = self.registry.try_register(job.id) else {
            return Ok(());
        };
        warn!(job_id = %job.id, "record has no artifact and no worker, re-running query");
        self.jobs.update_status(job.id, JobStatus::Running).await?;
        self.spawn_worker(job.clone(), token, ExecuteOptions { properties: true });
        Ok(())
    }
}

fn view(job: AnnotationJob, status: JobStatus, graph: Option<CanonicalGraph>) -> JobStatusView {
    JobStatusView {
        job_id: job.id,
        status,
        title: job.title,
        request: job.request,
        summary: job.summary,
        counts: job.counts,
        graph,
    }
}
