//! # annoq-backends
//!
//! The three interchangeable query backends for the annoq graph annotation
//! service: a property-graph engine queried with Cypher, an in-memory
//! symbolic store queried with s-expressions, and a remote pattern-rewrite
//! engine driven by transform rules.
//!
//! Each backend implements [`GraphBackend`]: it compiles a validated
//! request into a backend-native artifact (with count variants), executes
//! it through its client seam, and unifies the raw output into the
//! canonical graph defined in `annoq-core`.

pub mod backend;
pub mod cypher;
pub mod metta;
pub mod mork;
mod pattern;
pub mod sexpr;
pub mod unify;

pub use backend::{ExecuteOptions, GraphBackend};
pub use cypher::{CypherBackend, CypherClient};
pub use metta::{MettaBackend, MettaClient};
pub use mork::{HttpMorkClient, MorkBackend, MorkClient};
