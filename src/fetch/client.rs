//! The [`Downloader`]: turns a URI plus configuration into a [`Response`].

use std::sync::Arc;

use reqwest::Client;
use reqwest::header::CONNECTION;
use tracing::{debug, instrument};
use url::Url;

use super::config::{DownloaderConfig, PlatformQuirks};
use super::error::NetworkError;
use super::hook::{NoopHook, RequestHook};
use super::response::Response;

/// HTTP downloader with fixed connection settings.
///
/// Each [`fetch`](Self::fetch) produces an independently owned
/// [`Response`]; nothing is shared between concurrent fetches except the
/// client's connection pool. Cloning is cheap and clones share that pool.
///
/// The downloader never retries on its own. Callers own the retry loop, use
/// [`can_retry`](Self::can_retry) to classify a failure, and stop after
/// [`DownloaderConfig::max_retry_count`] retries.
///
/// # Example
///
/// ```no_run
/// use imagefetch_core::fetch::{Downloader, DownloaderConfig, PlatformQuirks};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = DownloaderConfig::default().with_read_timeout_ms(10_000);
/// let downloader = Downloader::new(config, PlatformQuirks::from_env())?;
/// let mut response = downloader.fetch("https://example.com/cat.png").await?;
/// let bytes = response.open_stream()?.read_to_end().await?;
/// println!("{} bytes, status {}", bytes.len(), response.status_code());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    config: DownloaderConfig,
    quirks: PlatformQuirks,
    hook: Arc<dyn RequestHook>,
}

impl Downloader {
    /// Creates a downloader with the given configuration and platform flags.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::ClientBuild`] if the HTTP client rejects the
    /// configuration (e.g. a User-Agent that is not a valid header value).
    pub fn new(config: DownloaderConfig, quirks: PlatformQuirks) -> Result<Self, NetworkError> {
        let client = build_client(&config, quirks)?;
        Ok(Self {
            client,
            config,
            quirks,
            hook: Arc::new(NoopHook),
        })
    }

    /// Creates a downloader with default configuration and no quirks.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_defaults() -> Result<Self, NetworkError> {
        Self::new(DownloaderConfig::default(), PlatformQuirks::none())
    }

    /// Installs the hook called before each request is sent.
    #[must_use]
    pub fn with_hook(mut self, hook: impl RequestHook + 'static) -> Self {
        self.hook = Arc::new(hook);
        self
    }

    /// Replaces the configuration for subsequent fetches.
    ///
    /// Responses already returned keep their connection and settings. On
    /// error the previous configuration stays in effect.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    #[instrument(level = "debug", skip(self, config), fields(identifier = %config.identifier()))]
    pub fn reconfigure(&mut self, config: DownloaderConfig) -> Result<(), NetworkError> {
        if config == self.config {
            return Ok(());
        }
        self.client = build_client(&config, self.quirks)?;
        self.config = config;
        debug!("downloader reconfigured");
        Ok(())
    }

    #[must_use]
    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    #[must_use]
    pub fn quirks(&self) -> PlatformQuirks {
        self.quirks
    }

    /// Deterministic fingerprint of the current configuration.
    ///
    /// See [`DownloaderConfig::identifier`].
    #[must_use]
    pub fn identifier(&self) -> String {
        self.config.identifier()
    }

    /// Whether a failed fetch or read is worth another attempt.
    ///
    /// True only for connect/read timeouts and interrupted transfers.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn can_retry(&self, error: &NetworkError) -> bool {
        error.is_retryable()
    }

    /// Opens a GET exchange for `uri` and returns once headers have arrived.
    ///
    /// # Errors
    ///
    /// - [`NetworkError::InvalidUrl`] if `uri` is not an absolute HTTP/HTTPS URL
    /// - [`NetworkError::ConnectTimeout`] / [`NetworkError::ReadTimeout`] when a
    ///   configured timeout expires
    /// - [`NetworkError::Connect`] for DNS failures and refused connections
    /// - [`NetworkError::Interrupted`] / [`NetworkError::Io`] for other
    ///   transport failures
    #[instrument(skip(self), fields(url = %uri))]
    pub async fn fetch(&self, uri: &str) -> Result<Response, NetworkError> {
        let parsed = parse_http_url(uri)?;

        let mut request = self.client.get(parsed.clone());
        if self.quirks.disable_keep_alive {
            request = request.header(CONNECTION, "close");
        }
        let request = self.hook.before_send(&parsed, request);

        let response = request.send().await.map_err(|e| {
            let error = NetworkError::from_send_error(uri, e);
            debug!(error = %error, retryable = error.is_retryable(), "fetch failed");
            error
        })?;

        debug!(
            status = response.status().as_u16(),
            content_length = ?response.content_length(),
            "response headers received"
        );
        Ok(Response::from_http(uri, response))
    }
}

/// Validates that `uri` is an absolute HTTP or HTTPS URL with a host.
fn parse_http_url(uri: &str) -> Result<Url, NetworkError> {
    let parsed = Url::parse(uri).map_err(|_| NetworkError::invalid_url(uri))?;
    let supported = matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some();
    if supported {
        Ok(parsed)
    } else {
        Err(NetworkError::invalid_url(uri))
    }
}

fn build_client(config: &DownloaderConfig, quirks: PlatformQuirks) -> Result<Client, NetworkError> {
    let mut builder = Client::builder().user_agent(config.user_agent());
    if let Some(timeout) = config.connect_timeout() {
        builder = builder.connect_timeout(timeout);
    }
    if let Some(timeout) = config.read_timeout() {
        builder = builder.read_timeout(timeout);
    }
    if quirks.disable_keep_alive {
        builder = builder.pool_max_idle_per_host(0);
    }
    builder
        .build()
        .map_err(|source| NetworkError::ClientBuild { source })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io;
    use std::time::Duration;

    use super::*;
    use crate::fetch::HeaderInjector;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use reqwest::header::{AUTHORIZATION, HeaderValue};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_parse_http_url_accepts_http_and_https() {
        assert!(parse_http_url("http://example.com/a.png").is_ok());
        assert!(parse_http_url("https://example.com/a.png").is_ok());
    }

    #[test]
    fn test_parse_http_url_rejects_other_inputs() {
        for input in ["not-a-url", "ftp://example.com/a.png", "file:///tmp/a.png", ""] {
            assert!(
                matches!(parse_http_url(input), Err(NetworkError::InvalidUrl { .. })),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_identifier_delegates_to_config() {
        let config = DownloaderConfig::default().with_max_retry_count(4);
        let downloader = Downloader::new(config.clone(), PlatformQuirks::none()).unwrap();
        assert_eq!(downloader.identifier(), config.identifier());
    }

    #[test]
    fn test_reconfigure_changes_identifier() {
        let mut downloader = Downloader::with_defaults().unwrap();
        let before = downloader.identifier();

        let updated = downloader.config().clone().with_read_timeout_ms(1);
        downloader.reconfigure(updated).unwrap();

        assert_ne!(downloader.identifier(), before);
        assert_eq!(downloader.config().read_timeout_ms(), 1);
    }

    #[test]
    fn test_invalid_user_agent_fails_client_build() {
        let config = DownloaderConfig::default().with_user_agent("bad\nagent");
        let result = Downloader::new(config, PlatformQuirks::none());
        assert!(matches!(result, Err(NetworkError::ClientBuild { .. })));
    }

    #[test]
    fn test_failed_reconfigure_keeps_previous_config() {
        let mut downloader = Downloader::with_defaults().unwrap();
        let before = downloader.config().clone();

        let bad = before.clone().with_user_agent("bad\nagent");
        assert!(downloader.reconfigure(bad).is_err());
        assert_eq!(downloader.config(), &before);
    }

    #[test]
    fn test_can_retry_classification() {
        let downloader = Downloader::with_defaults().unwrap();
        assert!(downloader.can_retry(&NetworkError::connect_timeout("u")));
        assert!(downloader.can_retry(&NetworkError::read_timeout("u")));
        assert!(downloader.can_retry(&NetworkError::interrupted("u", "reset")));
        assert!(!downloader.can_retry(&NetworkError::invalid_url("not-a-url")));
        assert!(!downloader.can_retry(&NetworkError::io(
            "u",
            io::Error::other("generic")
        )));
        assert!(!downloader.can_retry(&NetworkError::malformed("u", "bad status line")));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let downloader = Downloader::with_defaults().unwrap();
        let result = downloader.fetch("not-a-valid-url").await;
        let error = result.unwrap_err();
        assert!(matches!(error, NetworkError::InvalidUrl { .. }));
        assert!(!downloader.can_retry(&error));
    }

    #[tokio::test]
    async fn test_fetch_sends_configured_user_agent() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/ua.png"))
            .and(header("user-agent", "gallery/1.0"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let config = DownloaderConfig::default().with_user_agent("gallery/1.0");
        let downloader = Downloader::new(config, PlatformQuirks::none()).unwrap();
        let response = downloader
            .fetch(&format!("{}/ua.png", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(response.status_code(), 200);
    }

    #[tokio::test]
    async fn test_keep_alive_quirk_sends_connection_close() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/quirk.png"))
            .and(header("connection", "close"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let quirks = PlatformQuirks {
            disable_keep_alive: true,
        };
        let downloader = Downloader::new(DownloaderConfig::default(), quirks).unwrap();
        let response = downloader
            .fetch(&format!("{}/quirk.png", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(response.status_code(), 200);
    }

    #[tokio::test]
    async fn test_hook_runs_before_send() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/private.png"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png"))
            .with_priority(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/private.png"))
            .respond_with(ResponseTemplate::new(401))
            .with_priority(u8::MAX)
            .mount(&mock_server)
            .await;

        let url = format!("{}/private.png", mock_server.uri());

        let plain = Downloader::with_defaults().unwrap();
        assert_eq!(plain.fetch(&url).await.unwrap().status_code(), 401);

        let hooked = Downloader::with_defaults().unwrap().with_hook(
            HeaderInjector::new().set(AUTHORIZATION, HeaderValue::from_static("Bearer secret")),
        );
        let mut response = hooked.fetch(&url).await.unwrap();
        assert_eq!(response.status_code(), 200);
        let body = response.open_stream().unwrap().read_to_end().await.unwrap();
        assert_eq!(body, b"png");
    }

    #[tokio::test]
    async fn test_fetch_read_timeout_is_retryable() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/slow.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"data")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let config = DownloaderConfig::default().with_read_timeout_ms(200);
        let downloader = Downloader::new(config, PlatformQuirks::none()).unwrap();
        let error = downloader
            .fetch(&format!("{}/slow.png", mock_server.uri()))
            .await
            .unwrap_err();

        assert!(error.is_timeout(), "expected timeout, got: {error:?}");
        assert!(downloader.can_retry(&error));
    }
}
