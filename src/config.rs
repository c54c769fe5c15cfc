//! Configuration for the signing engine.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::encryption::MIN_KDF_ITERATIONS;
use crate::error::{Error, Result};

/// Minimum accepted master key length (characters).
pub const MIN_MASTER_KEY_LEN: usize = 32;

/// Engine configuration.
#[derive(Clone)]
pub struct SealConfig {
    /// Master key protecting stored passphrases and container keys.
    master_key: Option<String>,

    /// Base URL used for `{base_url}/validate/{id}` links.
    pub base_url: String,

    /// HTTP bind address.
    pub bind_addr: SocketAddr,

    /// Root directory for the local object storage backend.
    pub storage_dir: PathBuf,

    /// Deadline for a single object storage call.
    pub storage_timeout: Duration,

    /// Requests per minute per client IP on public endpoints.
    pub rate_limit_per_minute: u32,

    /// Reverse proxies whose `x-forwarded-for` is believed. Empty means the
    /// socket peer is always the client.
    pub trusted_proxies: Vec<IpAddr>,

    /// Failed access-code attempts allowed per window.
    pub code_attempts: u32,

    /// Window for failed access-code attempts.
    pub code_window: Duration,

    /// PBKDF2 iteration count.
    pub kdf_iterations: u32,

    /// Lifetime of unsigned drafts.
    pub draft_ttl: chrono::Duration,
}

impl std::fmt::Debug for SealConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealConfig")
            .field("master_key", &self.master_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("bind_addr", &self.bind_addr)
            .field("storage_dir", &self.storage_dir)
            .field("storage_timeout", &self.storage_timeout)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("trusted_proxies", &self.trusted_proxies)
            .field("code_attempts", &self.code_attempts)
            .field("code_window", &self.code_window)
            .field("kdf_iterations", &self.kdf_iterations)
            .field("draft_ttl", &self.draft_ttl)
            .finish()
    }
}

impl Default for SealConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SealConfig {
    /// Create new configuration with defaults and no master key.
    pub fn new() -> Self {
        Self {
            master_key: None,
            base_url: "http://localhost:8080".to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            storage_dir: PathBuf::from("./data"),
            storage_timeout: Duration::from_secs(15),
            rate_limit_per_minute: 60,
            trusted_proxies: Vec::new(),
            code_attempts: 5,
            code_window: Duration::from_secs(900),
            kdf_iterations: 310_000,
            draft_ttl: chrono::Duration::days(7),
        }
    }

    /// Load configuration from `PDF_SEAL_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new();

        if let Ok(key) = std::env::var("PDF_SEAL_MASTER_KEY") {
            config = config.with_master_key(key)?;
        }
        if let Ok(url) = std::env::var("PDF_SEAL_BASE_URL") {
            config = config.with_base_url(url);
        }
        if let Ok(bind) = std::env::var("PDF_SEAL_BIND") {
            config.bind_addr = bind.parse().map_err(|_| {
                Error::Validation(format!("PDF_SEAL_BIND is not an address: {}", bind))
            })?;
        }
        if let Ok(dir) = std::env::var("PDF_SEAL_STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }
        if let Some(secs) = env_number::<u64>("PDF_SEAL_STORAGE_TIMEOUT_SECS")? {
            config.storage_timeout = Duration::from_secs(secs);
        }
        if let Some(limit) = env_number::<u32>("PDF_SEAL_RATE_LIMIT_PER_MINUTE")? {
            config.rate_limit_per_minute = limit;
        }
        if let Ok(proxies) = std::env::var("PDF_SEAL_TRUSTED_PROXIES") {
            config.trusted_proxies = parse_proxies(&proxies)?;
        }
        if let Some(attempts) = env_number::<u32>("PDF_SEAL_CODE_ATTEMPTS")? {
            config.code_attempts = attempts;
        }
        if let Some(secs) = env_number::<u64>("PDF_SEAL_CODE_WINDOW_SECS")? {
            config.code_window = Duration::from_secs(secs);
        }
        if let Some(iterations) = env_number::<u32>("PDF_SEAL_KDF_ITERATIONS")? {
            config = config.with_kdf_iterations(iterations);
        }
        if let Some(days) = env_number::<i64>("PDF_SEAL_DRAFT_TTL_DAYS")? {
            config.draft_ttl = chrono::Duration::days(days);
        }

        Ok(config)
    }

    /// Set the master key. Short keys are rejected.
    pub fn with_master_key(mut self, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.chars().count() < MIN_MASTER_KEY_LEN {
            return Err(Error::Validation(format!(
                "master key must be at least {} characters",
                MIN_MASTER_KEY_LEN
            )));
        }
        self.master_key = Some(key);
        Ok(self)
    }

    /// Set the base URL for validation links.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the storage call deadline.
    pub fn with_storage_timeout(mut self, timeout: Duration) -> Self {
        self.storage_timeout = timeout;
        self
    }

    /// Set the public endpoint rate limit.
    pub fn with_rate_limit(mut self, per_minute: u32) -> Self {
        self.rate_limit_per_minute = per_minute;
        self
    }

    /// Set the proxies allowed to report the client address.
    pub fn with_trusted_proxies(mut self, proxies: impl IntoIterator<Item = IpAddr>) -> Self {
        self.trusted_proxies = proxies.into_iter().collect();
        self
    }

    /// Whether `peer` may report the client address in `x-forwarded-for`.
    pub fn is_trusted_proxy(&self, peer: &IpAddr) -> bool {
        self.trusted_proxies.contains(peer)
    }

    /// Set the failed access-code policy.
    pub fn with_code_attempts(mut self, attempts: u32, window: Duration) -> Self {
        self.code_attempts = attempts;
        self.code_window = window;
        self
    }

    /// Set the PBKDF2 iteration count (floored at the minimum).
    pub fn with_kdf_iterations(mut self, iterations: u32) -> Self {
        self.kdf_iterations = iterations.max(MIN_KDF_ITERATIONS);
        self
    }

    /// Master key, or `MissingEncryptionKey`.
    pub fn master_key(&self) -> Result<&str> {
        self.master_key.as_deref().ok_or(Error::MissingEncryptionKey)
    }

    /// Whether a master key is configured.
    pub fn has_master_key(&self) -> bool {
        self.master_key.is_some()
    }

    /// Public validation URL for a document.
    pub fn validation_url(&self, document_id: &uuid::Uuid) -> String {
        format!("{}/validate/{}", self.base_url, document_id)
    }
}

/// Comma-separated IP list.
fn parse_proxies(raw: &str) -> Result<Vec<IpAddr>> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.parse::<IpAddr>().map_err(|_| {
                Error::Validation(format!("PDF_SEAL_TRUSTED_PROXIES entry is not an IP: {}", p))
            })
        })
        .collect()
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::Validation(format!("{} is not a number: {}", name, raw))),
        Err(_) => Ok(None),
    }
}
