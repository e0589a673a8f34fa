//! Environment configuration.
//!
//! All settings come from environment variables with working defaults, so a
//! bare process starts against local infrastructure. Values are validated
//! once at startup; a malformed variable is a startup error, never a
//! per-job surprise.

use crate::error::{RuntimeError, RuntimeResult};

/// Default upload size cap: 150 MB.
const DEFAULT_MAX_FILE_SIZE: u64 = 150 * 1024 * 1024;

/// Connection settings for the object store service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Host name of the store endpoint.
    pub endpoint: String,
    /// Port of the store endpoint.
    pub port: u16,
    /// Access key.
    pub access_key: String,
    /// Secret key.
    pub secret_key: String,
    /// Whether to connect over TLS.
    pub use_ssl: bool,
}

/// Runtime configuration snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Broker connection URL.
    pub broker_url: String,
    /// Object store connection settings.
    pub store: StoreConfig,
    /// Bucket for uploaded models.
    pub upload_bucket: String,
    /// Bucket for produced parts and bundles.
    pub results_bucket: String,
    /// Jobs processed concurrently per worker process.
    pub worker_concurrency: usize,
    /// Upload size cap in bytes.
    pub max_file_size: u64,
    /// Override for completed-job retention, in hours.
    pub job_retention_hours: Option<u64>,
    /// Admin password, when the admin surface is enabled.
    pub admin_password: Option<String>,
    /// CORS origins allowed by the HTTP surface.
    pub allowed_origins: Vec<String>,
    /// Whether request rate limiting is on.
    pub rate_limit_enabled: bool,
}

impl RuntimeConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Config`] for malformed numeric or size
    /// values.
    pub fn from_env() -> RuntimeResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an injectable variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> RuntimeResult<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let worker_concurrency = match get("WORKER_CONCURRENCY") {
            Some(raw) => raw.parse::<usize>().map_err(|_| {
                RuntimeError::config(format!("WORKER_CONCURRENCY must be an integer, got {raw}"))
            })?,
            None => 2,
        };
        if worker_concurrency == 0 {
            return Err(RuntimeError::config("WORKER_CONCURRENCY must be at least 1"));
        }

        let max_file_size = match get("MAX_FILE_SIZE") {
            Some(raw) => parse_size(&raw)?,
            None => DEFAULT_MAX_FILE_SIZE,
        };

        let job_retention_hours = match get("JOB_RETENTION_HOURS") {
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
                RuntimeError::config(format!("JOB_RETENTION_HOURS must be an integer, got {raw}"))
            })?),
            None => None,
        };

        let port = match get("MINIO_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                RuntimeError::config(format!("MINIO_PORT must be a port number, got {raw}"))
            })?,
            None => 9000,
        };

        Ok(Self {
            broker_url: get("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            store: StoreConfig {
                endpoint: get("MINIO_ENDPOINT").unwrap_or_else(|| "127.0.0.1".to_string()),
                port,
                access_key: get("MINIO_ACCESS_KEY").unwrap_or_else(|| "minioadmin".to_string()),
                secret_key: get("MINIO_SECRET_KEY").unwrap_or_else(|| "minioadmin".to_string()),
                use_ssl: get("MINIO_USE_SSL").is_some_and(|v| truthy(&v)),
            },
            upload_bucket: get("UPLOAD_BUCKET").unwrap_or_else(|| "uploads".to_string()),
            results_bucket: get("RESULTS_BUCKET").unwrap_or_else(|| "results".to_string()),
            worker_concurrency,
            max_file_size,
            job_retention_hours,
            admin_password: get("ADMIN_PASSWORD"),
            allowed_origins: get("ALLOWED_ORIGINS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
            rate_limit_enabled: get("RATE_LIMIT_ENABLED").is_none_or(|v| truthy(&v)),
        })
    }
}

fn truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Parse a human size string: `<number>[B|KB|MB|GB]`.
///
/// A bare number is bytes. Units are powers of 1024, case-insensitive.
///
/// # Errors
///
/// Returns [`RuntimeError::Config`] on anything else.
pub fn parse_size(raw: &str) -> RuntimeResult<u64> {
    let trimmed = raw.trim();
    let upper = trimmed.to_uppercase();

    let (digits, multiplier) = if let Some(d) = upper.strip_suffix("GB") {
        (d, 1024 * 1024 * 1024)
    } else if let Some(d) = upper.strip_suffix("MB") {
        (d, 1024 * 1024)
    } else if let Some(d) = upper.strip_suffix("KB") {
        (d, 1024)
    } else if let Some(d) = upper.strip_suffix('B') {
        (d, 1)
    } else {
        (upper.as_str(), 1)
    };

    let digits = digits.trim();
    if digits.is_empty() {
        return Err(RuntimeError::config(format!("size has no number: {raw}")));
    }
    let value: u64 = digits
        .parse()
        .map_err(|_| RuntimeError::config(format!("invalid size: {raw}")))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| RuntimeError::config(format!("size overflows: {raw}")))
}
