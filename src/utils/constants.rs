//! Shared constants and invariants

pub const DEFAULT_SAFETY_MARGIN_SECS: u64 = 300;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;

pub const DEFAULT_LISTEN_HOST: &str = "localhost";
pub const DEFAULT_LISTEN_PORT: u16 = 8080;

pub const DEFAULT_METRICS_HOST: &str = "127.0.0.1";
pub const DEFAULT_METRICS_PORT: u16 = 9100;
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

pub const DEFAULT_UPSTREAM_URL: &str = "wss://us-central1-aiplatform.googleapis.com/ws/google.cloud.aiplatform.v1beta1.LlmBidiService/BidiGenerateContent";

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// lifetime requested for the signed assertion
pub const ASSERTION_LIFETIME_SECS: u64 = 3600;

pub const DEFAULT_GCLOUD_COMMAND: &str = "gcloud";
pub const DEFAULT_GCLOUD_LIFETIME_SECS: u64 = 3000;

// Close reason sent to clients on any fatal session condition
pub const INTERNAL_ERROR_REASON: &str = "Internal server error";

// Supported source types
pub const SOURCE_SERVICE_ACCOUNT: &str = "service_account";
pub const SOURCE_GCLOUD: &str = "gcloud";
