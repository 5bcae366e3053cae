use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::error::ErrorKind;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use assetfetch_core::catalog::{self, Catalog, CatalogConfig, OutputDirs, DEFAULT_BASE_URL};
use assetfetch_core::downloader::batch::BatchRunner;
use assetfetch_core::downloader::fetcher::{RedirectFetcher, DEFAULT_MAX_REDIRECTS};
use assetfetch_core::downloader::retry::{RetryMode, RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use assetfetch_core::report::ExitStatus;
use assetfetch_core::types::types::DownloadTask;

mod terminal_observer;
use terminal_observer::TerminalObserver;

#[derive(Parser)]
#[command(
    name = "assetfetch",
    version,
    about = "Fetch seeded placeholder images, retrying failures with backoff"
)]
struct Args {
    /// Single URL to download instead of the catalog (requires OUTPUT)
    #[arg(requires = "output", conflicts_with = "catalog")]
    url: Option<String>,

    /// Destination path for URL
    output: Option<PathBuf>,

    /// JSON catalog of {name, seed, size, group?} entries; defaults to the built-in one
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Directory for asset images
    #[arg(long, default_value = "assets")]
    assets_dir: PathBuf,

    /// Directory for testimonial portraits
    #[arg(long, default_value = "testimonials")]
    testimonials_dir: PathBuf,

    /// Image service base URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Attempts per task before it is reported failed
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS, value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: u32,

    /// Per-request timeout in seconds, 0 disables it
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Redirect hops followed before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_REDIRECTS)]
    max_redirects: u32,

    /// Do not retry permanent failures such as 404
    #[arg(long)]
    skip_permanent: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return parse_error_status(&e).into();
        }
    };

    let tasks = match resolve_tasks(&args).await {
        Ok(tasks) => tasks,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitStatus::Usage.into();
        }
    };

    let timeout = (args.timeout_secs > 0).then(|| Duration::from_secs(args.timeout_secs));
    let fetcher = match RedirectFetcher::builder()
        .with_max_redirects(args.max_redirects)
        .with_request_timeout(timeout)
        .build()
    {
        Ok(fetcher) => fetcher,
        Err(e) => {
            eprintln!("error: cannot build HTTP client: {}", e);
            return ExitStatus::Usage.into();
        }
    };

    let mode = if args.skip_permanent {
        RetryMode::TransientOnly
    } else {
        RetryMode::All
    };
    let policy = RetryPolicy::default()
        .with_max_attempts(args.max_attempts)
        .with_mode(mode);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupted, cancelling remaining downloads");
            signal_token.cancel();
        }
    });

    let mut runner = BatchRunner::new(Arc::new(fetcher), policy).with_cancel_token(cancel);
    runner.add_observer(Box::new(TerminalObserver::new()));

    println!("Starting downloads: {}", tasks.len());
    let start = Instant::now();
    let result = runner.run(&tasks).await;
    log::info!("batch finished in {:.2}s", start.elapsed().as_secs_f64());

    result.exit_status().into()
}

/// clap exits with 2 on usage errors; this tool reserves 2 for failed
/// downloads, so bad arguments map to 1.
fn parse_error_status(error: &clap::Error) -> ExitStatus {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitStatus::Success,
        _ => ExitStatus::Usage,
    }
}

async fn resolve_tasks(args: &Args) -> Result<Vec<DownloadTask>, Box<dyn std::error::Error>> {
    if let (Some(url), Some(output)) = (&args.url, &args.output) {
        return Ok(vec![catalog::single_task(url, output.clone())?]);
    }

    let catalog = match &args.catalog {
        Some(path) => Catalog::load(path).await?,
        None => Catalog::builtin(),
    };
    let config = CatalogConfig {
        base_url: args.base_url.clone(),
        dirs: OutputDirs {
            assets_dir: args.assets_dir.clone(),
            testimonials_dir: args.testimonials_dir.clone(),
        },
    };
    Ok(catalog.resolve(&config)?)
}
