//! Constants for the fetch module (timeouts, retry defaults).

/// Default connect timeout in milliseconds (7 seconds).
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 7_000;

/// Default read timeout in milliseconds (7 seconds).
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 7_000;

/// Default maximum retry count. Image fetches are not retried unless asked.
pub const DEFAULT_MAX_RETRY_COUNT: u32 = 0;

/// Name used as the prefix of [`Downloader::identifier`](super::Downloader::identifier).
pub(crate) const DOWNLOADER_NAME: &str = "Downloader";

/// Environment variable that turns on the keep-alive quirk at startup.
pub const DISABLE_KEEP_ALIVE_ENV: &str = "IMAGEFETCH_DISABLE_KEEP_ALIVE";
