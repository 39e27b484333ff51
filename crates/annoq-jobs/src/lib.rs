//! # annoq-jobs
//!
//! Asynchronous annotation job orchestration: submission, cooperative
//! cancellation, status caching, artifact persistence, and terminal-state
//! notification. The [`AnnotationService`] ties one graph backend to the
//! job, artifact, and cache stores; in-memory and file/Redis
//! implementations of those stores live here.

pub mod cache;
pub mod config;
pub mod orchestrator;
pub mod registry;
pub mod store;

pub use cache::RedisStatusCache;
pub use config::ServiceConfig;
pub use orchestrator::{AnnotationService, SubmitOptions, SubmitOutcome};
pub use registry::CancelRegistry;
pub use store::{FileArtifactStore, MemoryArtifactStore, MemoryJobStore, MemoryStatusCache};
