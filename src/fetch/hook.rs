//! Request mutation hooks invoked just before a request is sent.

use std::fmt;

use reqwest::RequestBuilder;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

/// Extension point for mutating outgoing requests.
///
/// The downloader calls [`before_send`](Self::before_send) after timeouts,
/// User-Agent and platform quirk headers have been applied and before the
/// request goes out. Typical uses are auth tokens and CDN-specific headers.
pub trait RequestHook: Send + Sync + fmt::Debug {
    /// Returns the request to send for `uri`.
    fn before_send(&self, uri: &Url, request: RequestBuilder) -> RequestBuilder;
}

/// Hook that sends requests unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl RequestHook for NoopHook {
    fn before_send(&self, _uri: &Url, request: RequestBuilder) -> RequestBuilder {
        request
    }
}

/// Hook that attaches a fixed set of headers to every request.
///
/// `set` headers replace any value already on the request (including the
/// configured User-Agent); `add` headers are appended and may repeat.
///
/// ```
/// use imagefetch_core::fetch::HeaderInjector;
/// use reqwest::header::{AUTHORIZATION, HeaderValue};
///
/// let hook = HeaderInjector::new()
///     .set(AUTHORIZATION, HeaderValue::from_static("Bearer token"))
///     .add("x-trace".parse().unwrap(), HeaderValue::from_static("a"));
/// assert_eq!(hook.len(), 2);
/// ```
#[derive(Debug, Default, Clone)]
pub struct HeaderInjector {
    set: Vec<(HeaderName, HeaderValue)>,
    add: Vec<(HeaderName, HeaderValue)>,
}

impl HeaderInjector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing existing values. A later `set` of the same
    /// name wins.
    #[must_use]
    pub fn set(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.set.retain(|(existing, _)| *existing != name);
        self.set.push((name, value));
        self
    }

    /// Appends a header value.
    #[must_use]
    pub fn add(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.add.push((name, value));
        self
    }

    /// Number of configured header entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.set.len() + self.add.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.add.is_empty()
    }
}

impl RequestHook for HeaderInjector {
    fn before_send(&self, _uri: &Url, request: RequestBuilder) -> RequestBuilder {
        let mut request = request;
        if !self.set.is_empty() {
            let replacements: HeaderMap = self.set.iter().cloned().collect();
            request = request.headers(replacements);
        }
        for (name, value) in &self.add {
            request = request.header(name.clone(), value.clone());
        }
        request
    }
}
