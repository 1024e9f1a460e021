//! phantom-fetch: fetch one URL with a browser fingerprint and print the
//! response as JSON.

use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use phantom_fetch::{Fetcher, FingerprintProfile, RedirectPolicy, RetryPolicy, Timeouts};

#[derive(Parser)]
#[command(
    name = "phantom-fetch",
    about = "Fetch a URL described by a JSON config, looking like a desktop browser",
    version
)]
struct Cli {
    /// Request descriptor: {"url": ..., "method"?: ..., "headers"?: {...}, "cookie"?: "k=v; ..."}
    config_json: String,

    /// Browser profile to impersonate (chrome_133, chrome_131).
    #[arg(long, default_value = "chrome_133")]
    profile: String,

    /// Per-attempt timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Maximum number of send attempts.
    #[arg(long, default_value_t = RetryPolicy::DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Return 3xx responses instead of following them.
    #[arg(long)]
    no_redirects: bool,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    // stdout carries the envelope only.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(json) => {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = stdout.write_all(json.as_bytes()).and_then(|_| stdout.flush()) {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> phantom_fetch::Result<String> {
    let profile = FingerprintProfile::from_id(&cli.profile)?.browser_profile();
    let timeouts = Timeouts::fetch_defaults().total(Duration::from_secs(cli.timeout));
    let redirects = if cli.no_redirects {
        RedirectPolicy::None
    } else {
        RedirectPolicy::default()
    };

    Fetcher::browser(profile, timeouts, redirects)
        .retry_policy(RetryPolicy::new(cli.max_attempts, Duration::from_secs(1)))
        .run(&cli.config_json)
        .await
}
