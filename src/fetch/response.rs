//! Normalized view over a single HTTP exchange.
//!
//! A [`Response`] owns the live connection of one exchange until it is
//! released. Status and headers are captured when the exchange is
//! established and stay readable after release; the body can only be read
//! while the connection is held.
//!
//! ```text
//! Opened --open_stream/next_chunk--> Reading --end of body--> Drained
//!    \                                  |                        |
//!     `-------------- release()/drop ---+------------------------`--> Released
//! ```
//!
//! `Drained` and `Released` both count as released: [`Response::open_stream`]
//! fails in either state.

use std::fmt;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, TRANSFER_ENCODING};
use tracing::{debug, trace};

use super::error::NetworkError;

/// Upper bound on the buffer reserved up front by [`ByteStream::read_to_end`].
const MAX_BODY_PREALLOC: usize = 1024 * 1024;

/// Body chunks as produced by the connection.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, NetworkError>> + Send>>;

/// Response headers in the order the header map yields them.
///
/// Each name appears once with all of its values in arrival order. Names
/// taken from a live response are lowercase, as normalized by the `http`
/// crate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    entries: Vec<(String, Vec<String>)>,
}

impl ResponseHeaders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies every header out of a client header map.
    ///
    /// Values that are not valid UTF-8 are converted lossily.
    #[must_use]
    pub fn from_header_map(map: &HeaderMap) -> Self {
        let entries = map
            .keys()
            .map(|name| {
                let values = map
                    .get_all(name)
                    .iter()
                    .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                    .collect();
                (name.as_str().to_string(), values)
            })
            .collect();
        Self { entries }
    }

    /// Appends a header with its values.
    pub fn push(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.entries.push((name.into(), values));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates `(name, values)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// First value of the named header, matched case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// All values of the named header, matched case-insensitively.
    #[must_use]
    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    /// Diagnostic rendering of all headers, `None` when there are none.
    ///
    /// Format: `[{name:value}, {name:[v1, v2]}, {name:}]`. A single value is
    /// rendered bare, several values as a bracketed list, no values as an
    /// empty string. Entry order is the header map's iteration order, so the
    /// text is meant for logs and debug identification only, never as a stable
    /// serialization.
    #[must_use]
    pub fn summary(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        let rendered: Vec<String> = self
            .entries
            .iter()
            .map(|(name, values)| format!("{{{name}:{}}}", render_values(values)))
            .collect();
        Some(format!("[{}]", rendered.join(", ")))
    }
}

impl<N, V> FromIterator<(N, Vec<V>)> for ResponseHeaders
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, Vec<V>)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(name, values)| (name.into(), values.into_iter().map(Into::into).collect()))
            .collect();
        Self { entries }
    }
}

fn render_values(values: &[String]) -> String {
    match values {
        [] => String::new(),
        [single] => single.clone(),
        many => format!("[{}]", many.join(", ")),
    }
}

enum BodyState {
    Open(BodyStream),
    /// End of body reached; the connection has been handed back.
    Drained,
    Released,
}

/// A fetched HTTP response holding its connection until released.
///
/// Dropping a `Response` releases the connection, so every exit path
/// (including `?` and panics mid-read) gives it back.
pub struct Response {
    url: String,
    status: StatusCode,
    headers: ResponseHeaders,
    body: BodyState,
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("url", &self.url)
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("released", &self.is_released())
            .finish()
    }
}

impl Response {
    /// Assembles a response from already-parsed parts.
    ///
    /// Used for live exchanges and by test doubles that stand in for a
    /// [`Downloader`](super::Downloader).
    #[must_use]
    pub fn from_parts(
        url: impl Into<String>,
        status: StatusCode,
        headers: ResponseHeaders,
        body: BodyStream,
    ) -> Self {
        Self {
            url: url.into(),
            status,
            headers,
            body: BodyState::Open(body),
        }
    }

    /// Wraps a live client response, mapping body errors to [`NetworkError`].
    pub(crate) fn from_http(url: &str, response: reqwest::Response) -> Self {
        let status = response.status();
        let headers = ResponseHeaders::from_header_map(response.headers());
        let body_url = url.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| NetworkError::from_body_error(&body_url, e)))
            .boxed();
        Self::from_parts(url, status, headers, body)
    }

    /// The URL this response was fetched from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Numeric status code.
    ///
    /// The status line is parsed when the exchange is established; an
    /// unreadable status line fails [`Downloader::fetch`](super::Downloader::fetch)
    /// instead. Remains valid after release.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Reason phrase for the status code, empty when the code has none.
    #[must_use]
    pub fn status_message(&self) -> &str {
        self.status.canonical_reason().unwrap_or_default()
    }

    /// True for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    #[must_use]
    pub fn headers(&self) -> &ResponseHeaders {
        &self.headers
    }

    /// First value of a header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Header value parsed as a non-negative integer, or `default`.
    #[must_use]
    pub fn header_i64(&self, name: &str, default: i64) -> i64 {
        self.header(name)
            .and_then(|value| value.trim().parse::<u64>().ok())
            .and_then(|value| i64::try_from(value).ok())
            .unwrap_or(default)
    }

    /// Value of `Content-Length`, or `-1` when absent, empty or not numeric.
    #[must_use]
    pub fn content_length(&self) -> i64 {
        self.header_i64(CONTENT_LENGTH.as_str(), -1)
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
    }

    #[must_use]
    pub fn content_encoding(&self) -> Option<&str> {
        self.header(CONTENT_ENCODING.as_str())
    }

    /// True when the body is sent with chunked transfer encoding.
    #[must_use]
    pub fn is_content_chunked(&self) -> bool {
        self.headers
            .get_all(TRANSFER_ENCODING.as_str())
            .iter()
            .flat_map(|value| value.split(','))
            .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
    }

    /// See [`ResponseHeaders::summary`].
    #[must_use]
    pub fn header_summary(&self) -> Option<String> {
        self.headers.summary()
    }

    /// Opens the body for reading.
    ///
    /// Repeated calls continue from where the previous stream stopped.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::Released`] once the connection has been handed
    /// back, including after the body was read to the end.
    pub fn open_stream(&mut self) -> Result<ByteStream<'_>, NetworkError> {
        if self.is_released() {
            return Err(NetworkError::released(&self.url));
        }
        Ok(ByteStream { response: self })
    }

    /// Returns true once the connection has been handed back.
    #[must_use]
    pub fn is_released(&self) -> bool {
        !matches!(self.body, BodyState::Open(_))
    }

    /// Releases the underlying connection.
    ///
    /// Idempotent and infallible: closing a body cannot produce an error the
    /// caller could act on, so there is nothing to report beyond a debug event.
    pub fn release(&mut self) {
        match std::mem::replace(&mut self.body, BodyState::Released) {
            BodyState::Open(body) => {
                drop(body);
                debug!(url = %self.url, "released connection");
            }
            BodyState::Drained => trace!(url = %self.url, "release after end of body"),
            BodyState::Released => trace!(url = %self.url, "release on released response"),
        }
    }
}

impl Drop for Response {
    fn drop(&mut self) {
        if matches!(self.body, BodyState::Open(_)) {
            debug!(url = %self.url, "response dropped while holding connection");
            self.release();
        }
    }
}

/// Readable body of a [`Response`].
///
/// Reaching the end of the body or hitting a read error hands the connection
/// back immediately; the caller does not need to wait for the `Response` to be
/// dropped.
pub struct ByteStream<'a> {
    response: &'a mut Response,
}

impl ByteStream<'_> {
    /// Reads the next chunk, `None` at end of body and on every later call.
    ///
    /// # Errors
    ///
    /// Returns the transport error that interrupted the body (the connection
    /// is released first), or [`NetworkError::Released`] when the response was
    /// released before the body was fully read.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, NetworkError> {
        let body = match &mut self.response.body {
            BodyState::Open(body) => body,
            BodyState::Drained => return Ok(None),
            BodyState::Released => return Err(NetworkError::released(&self.response.url)),
        };

        let next = body.next().await;
        match next {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(error)) => {
                debug!(url = %self.response.url, error = %error, "body read failed");
                self.response.release();
                Err(error)
            }
            None => {
                self.response.body = BodyState::Drained;
                debug!(url = %self.response.url, "end of body, connection released");
                Ok(None)
            }
        }
    }

    /// Reads the remaining body into memory.
    ///
    /// # Errors
    ///
    /// Same as [`next_chunk`](Self::next_chunk).
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>, NetworkError> {
        // Content-Length is server-controlled; only a hint.
        let capacity = usize::try_from(self.response.content_length())
            .unwrap_or(0)
            .min(MAX_BODY_PREALLOC);
        let mut buffer = Vec::with_capacity(capacity);
        while let Some(chunk) = self.next_chunk().await? {
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer)
    }
}
