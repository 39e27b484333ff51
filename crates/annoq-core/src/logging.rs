//! Structured logging field name constants for annoq.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, job completions |
//! | DEBUG | Decision points, compiled query shapes, cache outcomes |
//! | TRACE | Per-row parsing, high-volume data |

/// Annotation job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Backend kind handling a query ("cypher", "metta", "mork").
pub const BACKEND: &str = "backend";

/// Logical operation name.
/// Examples: "compile", "execute", "unify", "submit", "cancel"
pub const OPERATION: &str = "op";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of canonical nodes produced.
pub const NODE_COUNT: &str = "node_count";

/// Number of canonical edges produced.
pub const EDGE_COUNT: &str = "edge_count";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
