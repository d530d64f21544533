//! Imagefetch Core Library
//!
//! This library provides the network-fetch layer of an image-loading
//! pipeline: a configurable [`Downloader`] that opens HTTP exchanges and a
//! [`Response`] that normalizes status, headers and the body stream with
//! guaranteed connection cleanup.
//!
//! # Architecture
//!
//! - [`fetch`] - Downloader, response, retry classification and request hooks
//!
//! URL construction, disk caching and image decoding live in the callers.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod fetch;
mod user_agent;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use fetch::{
    Downloader, DownloaderConfig, FailureType, NetworkError, PlatformQuirks, Response,
    RetryDecision, RetryPolicy, classify_error,
};
