//! Default values used across annoq crates.

/// Status cache entry TTL in seconds.
pub const CACHE_TTL_SECS: u64 = 3600;

/// Buffer capacity for the job event bus.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Name of the MORK workspace scope used for annotation queries.
pub const MORK_WORKSPACE: &str = "annotation";

/// Name of the MORK temporary relation drained after each transform.
pub const MORK_TMP_RELATION: &str = "tmp";

/// Default MORK server URL.
pub const MORK_URL: &str = "http://127.0.0.1:8231";
