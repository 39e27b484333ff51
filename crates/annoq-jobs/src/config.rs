//! Service configuration, read from environment variables with defaults.

use annoq_core::order::GraphInfo;
use annoq_core::defaults;
use std::time::Duration;
use tracing::warn;

/// Orchestrator configuration.
///
/// Environment variables:
/// - `ANNOQ_HEURISTIC_SORT`: set to "false" to disable predicate reordering
///   (default: true)
/// - `ANNOQ_GRAPH_INFO`: JSON edge-count statistics for the orderer
/// - `ANNOQ_DEFAULT_LIMIT`: result cap applied when the caller gives none
/// - `ANNOQ_CACHE_TTL`: status cache TTL in seconds (default: 3600)
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub heuristic_sort: bool,
    pub graph_info: GraphInfo,
    pub default_limit: Option<u64>,
    pub cache_ttl_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            heuristic_sort: true,
            graph_info: GraphInfo::default(),
            default_limit: None,
            cache_ttl_secs: defaults::CACHE_TTL_SECS,
        }
    }
}

impl ServiceConfig {
    /// TTL for the status cache built next to this config.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let heuristic_sort = std::env::var("ANNOQ_HEURISTIC_SORT")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let graph_info = match std::env::var("ANNOQ_GRAPH_INFO") {
            Ok(raw) => GraphInfo::from_json(&raw).unwrap_or_else(|e| {
                warn!("Invalid ANNOQ_GRAPH_INFO, heuristic stats unavailable: {e}");
                GraphInfo::default()
            }),
            Err(_) => GraphInfo::default(),
        };

        let default_limit = std::env::var("ANNOQ_DEFAULT_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok());

        let cache_ttl_secs = std::env::var("ANNOQ_CACHE_TTL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::CACHE_TTL_SECS);

        Self {
            heuristic_sort,
            graph_info,
            default_limit,
            cache_ttl_secs,
        }
    }
}
