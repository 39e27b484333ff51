//! # annoq-core
//!
//! Core types, traits, and abstractions for the annoq graph annotation
//! query service.
//!
//! This crate provides the backend-independent pieces every other annoq
//! crate depends on: the request and canonical-graph models, the schema
//! registry, request validation, heuristic predicate ordering, graph
//! grouping, the job/artifact/cache trait seams, the cancellation token,
//! and the job event bus.

pub mod cancel;
pub mod defaults;
pub mod error;
pub mod events;
pub mod group;
pub mod logging;
pub mod models;
pub mod order;
pub mod schema;
pub mod traits;
pub mod validate;

// Re-export commonly used types at crate root
pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use events::{JobEvent, JobEventBus};
pub use group::{group_graph, group_node_only};
pub use models::*;
pub use order::{heuristic_sort, GraphInfo};
pub use schema::{SchemaEdgeType, SchemaNodeType, SchemaRegistry};
pub use traits::{ArtifactStore, JobStore, StatusCache};
pub use validate::validate_request;
