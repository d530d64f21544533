//! HTTP fetch layer for image loading.
//!
//! A [`Downloader`] holds connection settings and turns a URI into a
//! [`Response`]; the response normalizes status, headers and content length
//! and hands out the body as a [`ByteStream`].
//!
//! # Features
//!
//! - Configurable connect/read timeouts and User-Agent (7s/7s by default)
//! - Retry classification via [`Downloader::can_retry`]; callers own the loop
//! - Deterministic configuration fingerprint via [`Downloader::identifier`]
//! - Request hook ([`RequestHook`]) for auth tokens and extra headers
//! - Connection released exactly once: explicitly, at end of body, or on drop
//!
//! # Example
//!
//! ```no_run
//! use imagefetch_core::fetch::Downloader;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = Downloader::with_defaults()?;
//! let mut response = downloader.fetch("https://example.com/cat.png").await?;
//! println!("{:?}", response.header_summary());
//! let bytes = response.open_stream()?.read_to_end().await?;
//! println!("{} bytes", bytes.len());
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
pub mod constants;
mod error;
mod hook;
mod response;
mod retry;

pub use client::Downloader;
pub use config::{DownloaderConfig, PlatformQuirks};
pub use error::NetworkError;
pub use hook::{HeaderInjector, NoopHook, RequestHook};
pub use response::{BodyStream, ByteStream, Response, ResponseHeaders};
pub use retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
