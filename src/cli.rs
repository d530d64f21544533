//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;
use reqwest::header::{HeaderName, HeaderValue};

use imagefetch_core::DownloaderConfig;
use imagefetch_core::fetch::constants::{DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_READ_TIMEOUT_MS};

/// Fetch a remote image over HTTP.
///
/// Imagefetch opens the URL with the configured timeouts and User-Agent,
/// retries timeouts and interrupted transfers up to --max-retries times, and
/// reports status, content length and response headers.
#[derive(Parser, Debug)]
#[command(name = "imagefetch")]
#[command(author, version, about)]
pub struct Args {
    /// Absolute http:// or https:// URL to fetch
    pub url: String,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Connect timeout in milliseconds (0 disables, max 600000)
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_MS, value_parser = clap::value_parser!(u64).range(0..=600_000))]
    pub connect_timeout: u64,

    /// Read timeout in milliseconds (0 disables, max 600000)
    #[arg(long, default_value_t = DEFAULT_READ_TIMEOUT_MS, value_parser = clap::value_parser!(u64).range(0..=600_000))]
    pub read_timeout: u64,

    /// Maximum retries for timeouts and interrupted transfers (0-10)
    #[arg(short = 'r', long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub max_retries: u32,

    /// Override the User-Agent header
    #[arg(short = 'A', long)]
    pub user_agent: Option<String>,

    /// Extra request header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(HeaderName, HeaderValue)>,

    /// Send "Connection: close" and disable connection reuse
    #[arg(long)]
    pub no_keep_alive: bool,

    /// Write the body to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print a JSON fetch report on stdout
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Builds the downloader configuration from the parsed flags.
    pub fn downloader_config(&self) -> DownloaderConfig {
        let config = DownloaderConfig::default()
            .with_connect_timeout_ms(self.connect_timeout)
            .with_read_timeout_ms(self.read_timeout)
            .with_max_retry_count(self.max_retries);
        match &self.user_agent {
            Some(user_agent) => config.with_user_agent(user_agent.clone()),
            None => config,
        }
    }
}

/// Parses a `Name: value` header argument.
fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: value\", got {raw:?}"))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|e| format!("invalid header name {:?}: {e}", name.trim()))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|e| format!("invalid header value for {name}: {e}"))?;
    Ok((name, value))
}
