//! Error types for the fetch module.
//!
//! Every failure surfaced by [`Downloader`](super::Downloader) and
//! [`Response`](super::Response) is a [`NetworkError`]. Timeout and
//! interrupted-I/O variants are the only ones considered transient.

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

/// Errors that can occur while fetching a remote resource.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The provided URI is malformed or not an HTTP/HTTPS URL.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URI string.
        url: String,
    },

    /// The connection could not be established within the connect timeout.
    #[error("connect timeout fetching {url}")]
    ConnectTimeout {
        /// The URL that timed out.
        url: String,
    },

    /// The server stopped sending data for longer than the read timeout.
    #[error("read timeout fetching {url}")]
    ReadTimeout {
        /// The URL that timed out.
        url: String,
    },

    /// The connection was closed or reset while the exchange was in flight.
    #[error("interrupted fetching {url}: {reason}")]
    Interrupted {
        /// The URL whose transfer was interrupted.
        url: String,
        /// Description of the interruption.
        reason: String,
    },

    /// Connection-level failure (DNS resolution, connection refused, TLS).
    #[error("connection failed for {url}: {source}")]
    Connect {
        /// The URL that could not be reached.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// Any other I/O failure while sending the request or reading the body.
    #[error("IO error fetching {url}: {source}")]
    Io {
        /// The URL being fetched.
        url: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Status line, headers or body encoding could not be understood.
    #[error("malformed response from {url}: {reason}")]
    MalformedResponse {
        /// The URL that returned the malformed response.
        url: String,
        /// What was wrong with the response.
        reason: String,
    },

    /// The response body was accessed after the connection was released.
    #[error("response for {url} already released")]
    Released {
        /// The URL of the released response.
        url: String,
    },

    /// The underlying HTTP client could not be built from the configuration.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl NetworkError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a connect timeout error.
    pub fn connect_timeout(url: impl Into<String>) -> Self {
        Self::ConnectTimeout { url: url.into() }
    }

    /// Creates a read timeout error.
    pub fn read_timeout(url: impl Into<String>) -> Self {
        Self::ReadTimeout { url: url.into() }
    }

    /// Creates an interrupted-transfer error.
    pub fn interrupted(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Interrupted {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a connection error from a client error.
    pub fn connect(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Connect {
            url: url.into(),
            source,
        }
    }

    /// Creates an IO error.
    pub fn io(url: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            url: url.into(),
            source,
        }
    }

    /// Creates a malformed response error.
    pub fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a use-after-release error.
    pub fn released(url: impl Into<String>) -> Self {
        Self::Released { url: url.into() }
    }

    /// Returns true for timeout-class and interrupted-I/O-class failures.
    ///
    /// This is the whole retry-eligibility policy: a retry may help only when
    /// the failure was transient. DNS failures, refused connections, malformed
    /// input and protocol errors fail the same way on every attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout { .. } | Self::ReadTimeout { .. } | Self::Interrupted { .. }
        )
    }

    /// Returns true for the connect and read timeout variants.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectTimeout { .. } | Self::ReadTimeout { .. })
    }

    /// Maps a client error raised while sending the request.
    pub(crate) fn from_send_error(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return if error.is_connect() {
                Self::connect_timeout(url)
            } else {
                Self::read_timeout(url)
            };
        }
        if error.is_connect() {
            return Self::connect(url, error);
        }
        if let Some(protocol) = find_in_chain::<hyper::Error>(&error) {
            if protocol.is_parse() {
                return Self::malformed(url, protocol.to_string());
            }
            if protocol.is_incomplete_message() || protocol.is_canceled() || protocol.is_closed() {
                return Self::interrupted(url, protocol.to_string());
            }
        }
        match io_kind_in_chain(&error) {
            Some(io::ErrorKind::TimedOut) => Self::read_timeout(url),
            Some(kind) if is_interruption(kind) => Self::interrupted(url, error.to_string()),
            _ => Self::io(url, io::Error::other(error)),
        }
    }

    /// Maps a client error raised while reading the response body.
    ///
    /// Once headers have arrived, any failure other than a timeout or a
    /// broken chunk framing means the connection went away under the reader.
    pub(crate) fn from_body_error(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() || io_kind_in_chain(&error) == Some(io::ErrorKind::TimedOut) {
            return Self::read_timeout(url);
        }
        if let Some(protocol) = find_in_chain::<hyper::Error>(&error).filter(|e| e.is_parse()) {
            return Self::malformed(url, protocol.to_string());
        }
        Self::interrupted(url, error.to_string())
    }
}

/// Finds the first error of type `E` in an error's source chain.
fn find_in_chain<'a, E: StdError + 'static>(error: &'a (dyn StdError + 'static)) -> Option<&'a E> {
    let mut current: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(err) = current {
        if let Some(found) = err.downcast_ref::<E>() {
            return Some(found);
        }
        current = err.source();
    }
    None
}

/// Kind of the first `std::io::Error` in an error's source chain.
fn io_kind_in_chain(error: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    find_in_chain::<io::Error>(error).map(io::Error::kind)
}

fn is_interruption(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::Interrupted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}
