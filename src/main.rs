//! CLI entry point for the imagefetch tool.

use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use clap::Parser;
use imagefetch_core::fetch::HeaderInjector;
use imagefetch_core::{
    Downloader, FailureType, NetworkError, PlatformQuirks, RetryDecision, RetryPolicy,
    classify_error,
};
use serde::Serialize;
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

/// What a completed fetch looked like, printed with `--json`.
#[derive(Debug, Serialize)]
struct FetchReport {
    url: String,
    identifier: String,
    status: u16,
    status_message: String,
    content_length: i64,
    content_type: Option<String>,
    header_summary: Option<String>,
    bytes: usize,
    attempts: u32,
}

/// Status and body of the last attempt.
struct Fetched {
    status: u16,
    status_message: String,
    content_length: i64,
    content_type: Option<String>,
    header_summary: Option<String>,
    body: Vec<u8>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr so stdout stays clean for the body or the JSON report
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let mut quirks = PlatformQuirks::from_env();
    if args.no_keep_alive {
        quirks.disable_keep_alive = true;
    }

    let mut injector = HeaderInjector::new();
    for (name, value) in &args.headers {
        injector = injector.add(name.clone(), value.clone());
    }

    let downloader = Downloader::new(args.downloader_config(), quirks)
        .context("failed to build HTTP client")?
        .with_hook(injector);
    info!(identifier = %downloader.identifier(), "imagefetch starting");

    let (fetched, attempts) = fetch_with_retry(&downloader, &args.url).await?;

    let report = FetchReport {
        url: args.url.clone(),
        identifier: downloader.identifier(),
        status: fetched.status,
        status_message: fetched.status_message.clone(),
        content_length: fetched.content_length,
        content_type: fetched.content_type.clone(),
        header_summary: fetched.header_summary.clone(),
        bytes: fetched.body.len(),
        attempts,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        info!(
            status = report.status,
            status_message = %report.status_message,
            content_length = report.content_length,
            bytes = report.bytes,
            attempts = report.attempts,
            "fetch complete"
        );
        if let Some(summary) = &report.header_summary {
            info!(headers = %summary, "response headers");
        }
    }

    if !(200..300).contains(&fetched.status) {
        bail!(
            "server returned {} {} for {}",
            fetched.status,
            fetched.status_message,
            args.url
        );
    }

    if let Some(path) = &args.output {
        tokio::fs::write(path, &fetched.body)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), bytes = fetched.body.len(), "body written");
    } else if !args.json {
        let mut stdout = io::stdout().lock();
        stdout.write_all(&fetched.body)?;
        stdout.flush()?;
    }

    Ok(())
}

/// Fetches `url`, retrying transient failures as allowed by the downloader's
/// `max_retry_count`. Returns the result and the number of attempts made.
async fn fetch_with_retry(downloader: &Downloader, url: &str) -> Result<(Fetched, u32)> {
    let policy = RetryPolicy::from_max_retry_count(downloader.config().max_retry_count());
    let mut attempt = 1;

    loop {
        match fetch_body(downloader, url).await {
            Ok(fetched) => return Ok((fetched, attempt)),
            Err(error) => {
                let failure_type = classify_error(&error);
                match policy.should_retry(failure_type, attempt) {
                    RetryDecision::Retry {
                        delay,
                        attempt: next,
                    } => {
                        warn!(
                            attempt,
                            next_attempt = next,
                            delay_ms = delay.as_millis(),
                            error = %error,
                            "fetch failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt = next;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        debug!(
                            transient = failure_type == FailureType::Transient,
                            %reason,
                            "giving up"
                        );
                        return Err(anyhow::Error::new(error)
                            .context(format!("fetch failed after {attempt} attempt(s)")));
                    }
                }
            }
        }
    }
}

/// One attempt: open the exchange and read the whole body.
async fn fetch_body(downloader: &Downloader, url: &str) -> Result<Fetched, NetworkError> {
    let mut response = downloader.fetch(url).await?;
    let body = response.open_stream()?.read_to_end().await?;
    response.release();

    Ok(Fetched {
        status: response.status_code(),
        status_message: response.status_message().to_string(),
        content_length: response.content_length(),
        content_type: response.content_type().map(str::to_string),
        header_summary: response.header_summary(),
        body,
    })
}
