//! Default User-Agent string for image fetch requests.
//!
//! Single source for the UA format so every downloader built with default
//! configuration identifies itself the same way (RFC 9308).

/// Default User-Agent for image fetch requests (identifies the tool).
#[must_use]
pub(crate) fn default_fetch_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("imagefetch/{version} (image-loader)")
}
