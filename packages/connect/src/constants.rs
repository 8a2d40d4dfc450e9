// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of the environment variables read by Tether

// Configuration files
pub const TETHER_CONFIG_PATH: &str = "TETHER_CONFIG_PATH";

// Connection storage
pub const TETHER_DATABASE_URL: &str = "TETHER_DATABASE_URL";
pub const TETHER_ENCRYPTION_KEY: &str = "TETHER_ENCRYPTION_KEY";

// HTTP timeouts applied to every provider round trip
pub const TETHER_HTTP_REQUEST_TIMEOUT_SECS: &str = "TETHER_HTTP_REQUEST_TIMEOUT_SECS";
pub const TETHER_HTTP_CONNECT_TIMEOUT_SECS: &str = "TETHER_HTTP_CONNECT_TIMEOUT_SECS";

// Per-provider credential overrides, prefixed with the upper-cased provider name
pub const API_KEY_SUFFIX: &str = "_API_KEY";
pub const API_SECRET_SUFFIX: &str = "_API_SECRET";
