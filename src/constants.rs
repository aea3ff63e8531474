//! Console Constants
//!
//! Centralized tuning values shared by the services and state layers.

/// Application identifiers for platform directories
pub const APP_QUALIFIER: &str = "com";
pub const APP_ORGANIZATION: &str = "dispatch";
pub const APP_NAME: &str = "dispatch-console";

/// Default backend endpoints
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_SOCKET_URL: &str = "http://localhost:3000";

/// Environment overrides for the backend endpoints
pub const ENV_API_URL: &str = "DISPATCH_API_URL";
pub const ENV_SOCKET_URL: &str = "DISPATCH_SOCKET_URL";

/// A technician counts as online only if pinged within this window
pub const ONLINE_FRESHNESS_MS: i64 = 120_000;

/// Live map drift-correction poll
pub const LIVE_MAP_POLL_INTERVAL_SECS: u64 = 10;

/// HTTP request timeout
pub const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Fallback view centre when no technician has coordinates (lat, lng)
pub const DEFAULT_MAP_CENTER: (f64, f64) = (23.8103, 90.4125);

/// Listing sizes
pub const JOBS_PAGE_SIZE: usize = 10;
pub const OVERVIEW_LIST_LIMIT: usize = 5;

/// Notifications
pub const TOAST_TTL_MS: i64 = 3_000;
pub const NOTIFICATION_LOG_CAPACITY: usize = 200;

/// Event channel reconnection (Socket.IO client defaults)
pub const RETRY_INITIAL_DELAY_MS: u64 = 1000;
pub const RETRY_MAX_DELAY_MS: u64 = 5000;
pub const RETRY_MULTIPLIER: f64 = 2.0;
pub const RETRY_JITTER: f64 = 0.5;

/// How long teardown waits for the event task to say goodbye
pub const SHUTDOWN_GRACE_MS: u64 = 2_000;

/// Engine.IO heartbeat defaults, used until the server handshake says otherwise
pub const DEFAULT_PING_INTERVAL_MS: u64 = 25_000;
pub const DEFAULT_PING_TIMEOUT_MS: u64 = 20_000;
