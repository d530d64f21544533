//! Downloader configuration and platform capability flags.

use std::time::Duration;

use super::constants::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_MAX_RETRY_COUNT, DEFAULT_READ_TIMEOUT_MS,
    DISABLE_KEEP_ALIVE_ENV, DOWNLOADER_NAME,
};
use crate::user_agent;

/// Connection settings applied to every request a downloader sends.
///
/// The value is immutable once handed to a [`Downloader`](super::Downloader);
/// changing settings means building a new value with the chained `with_*`
/// setters and passing it to
/// [`Downloader::reconfigure`](super::Downloader::reconfigure).
///
/// A timeout of `0` disables that timeout.
///
/// # Example
///
/// ```
/// use imagefetch_core::fetch::DownloaderConfig;
///
/// let config = DownloaderConfig::default()
///     .with_connect_timeout_ms(3_000)
///     .with_read_timeout_ms(10_000)
///     .with_max_retry_count(2)
///     .with_user_agent("gallery/1.0");
/// assert_eq!(config.max_retry_count(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloaderConfig {
    connect_timeout_ms: u64,
    read_timeout_ms: u64,
    max_retry_count: u32,
    user_agent: String,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            user_agent: user_agent::default_fetch_user_agent(),
        }
    }
}

impl DownloaderConfig {
    /// Sets the connect timeout in milliseconds.
    #[must_use]
    pub fn with_connect_timeout_ms(mut self, connect_timeout_ms: u64) -> Self {
        self.connect_timeout_ms = connect_timeout_ms;
        self
    }

    /// Sets the read timeout in milliseconds.
    #[must_use]
    pub fn with_read_timeout_ms(mut self, read_timeout_ms: u64) -> Self {
        self.read_timeout_ms = read_timeout_ms;
        self
    }

    /// Sets the maximum number of retries a caller should attempt.
    #[must_use]
    pub fn with_max_retry_count(mut self, max_retry_count: u32) -> Self {
        self.max_retry_count = max_retry_count;
        self
    }

    /// Sets the User-Agent header value.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn connect_timeout_ms(&self) -> u64 {
        self.connect_timeout_ms
    }

    #[must_use]
    pub fn read_timeout_ms(&self) -> u64 {
        self.read_timeout_ms
    }

    #[must_use]
    pub fn max_retry_count(&self) -> u32 {
        self.max_retry_count
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Connect timeout as a `Duration`, or `None` when disabled.
    #[must_use]
    pub fn connect_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.connect_timeout_ms)
    }

    /// Read timeout as a `Duration`, or `None` when disabled.
    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.read_timeout_ms)
    }

    /// Deterministic fingerprint of this configuration.
    ///
    /// Field order is fixed: `maxRetryCount`, `connectTimeout`, `readTimeout`,
    /// `userAgent`. Used for cache-key disambiguation and diagnostics.
    #[must_use]
    pub fn identifier(&self) -> String {
        format!(
            "{DOWNLOADER_NAME}(maxRetryCount={},connectTimeout={},readTimeout={},userAgent={})",
            self.max_retry_count, self.connect_timeout_ms, self.read_timeout_ms, self.user_agent
        )
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Capability flags describing known defects of the runtime platform.
///
/// Evaluated once at startup and injected into the downloader, so the fetch
/// path never inspects the environment itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformQuirks {
    /// Persistent connections are unreliable; send `Connection: close`.
    pub disable_keep_alive: bool,
}

impl PlatformQuirks {
    /// No known quirks.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            disable_keep_alive: false,
        }
    }

    /// Reads quirk flags from the process environment.
    ///
    /// `IMAGEFETCH_DISABLE_KEEP_ALIVE` accepts `1`, `true` or `yes`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(DISABLE_KEEP_ALIVE_ENV).ok().as_deref())
    }

    fn from_env_value(value: Option<&str>) -> Self {
        let disable_keep_alive = value.is_some_and(|raw| {
            matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            )
        });
        Self { disable_keep_alive }
    }
}
