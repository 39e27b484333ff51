//! The backend capability seam.
//!
//! Each backend bundles its compiler, executor, and result unifier behind
//! one trait, selected once per data-source load. Compiled artifacts are
//! opaque outside the backend that produced them.

use async_trait::async_trait;

use annoq_core::models::{AnnotationRequest, BackendKind, CanonicalGraph, CompiledQuery, NodeMap};
use annoq_core::{CancelToken, Result};

/// Per-execution options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// Fetch declared properties for every matched entity. When false only
    /// identity and type are retained.
    pub properties: bool,
}

/// A query backend: compile a validated request, execute the compiled
/// artifact, unify the raw result into a canonical graph.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Compile a validated request into this backend's query artifact,
    /// including its total-count and label-count variants.
    ///
    /// The request must already have passed validation; `node_map` resolves
    /// predicate endpoints. `limit` caps the materialized result where the
    /// backend supports it.
    fn compile(
        &self,
        request: &AnnotationRequest,
        node_map: &NodeMap,
        limit: Option<u64>,
    ) -> Result<CompiledQuery>;

    /// Execute a compiled query and return the unified graph.
    ///
    /// `cancel` is observed at every checkpoint, immediately before and
    /// after each backend round trip.
    async fn execute(
        &self,
        compiled: &CompiledQuery,
        options: &ExecuteOptions,
        cancel: &CancelToken,
    ) -> Result<CanonicalGraph>;
}
