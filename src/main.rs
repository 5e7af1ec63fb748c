use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::runtime::Runtime;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use webrate::config::WebrateConfig;
use webrate::ratelimit::{
    CounterStore, Limiter, MemoryStore, RateLimiter, RequestInfo, RequestRecord, TimeoutStore,
};

/// Replay request descriptors through a fixed-window rate limiter.
///
/// Reads one JSON request per line from stdin, e.g.
/// `{"method":"POST","path":"/login","remote_addr":"1.2.3.4:5000"}`,
/// and writes one JSON decision per line to stdout.
#[derive(Debug, Parser)]
#[command(name = "webrate", version, about)]
struct Args {
    /// Configuration file (YAML); `WEBRATE__*` environment variables override it
    #[arg(short, long)]
    config: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

/// How long shutdown waits for blocking tasks, such as a pending stdin read.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let runtime = Runtime::new()?;
    run_to_completion(runtime, run(args))
}

/// Drive `future` to completion, then shut the runtime down without waiting
/// on blocking tasks longer than [`SHUTDOWN_TIMEOUT`].
fn run_to_completion<F: Future>(runtime: Runtime, future: F) -> F::Output {
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
    output
}

async fn run(args: Args) -> anyhow::Result<()> {
    info!("Starting webrate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = WebrateConfig::load(args.config.as_deref())?;
    info!(
        requests = config.limiter.requests_per_window,
        window_secs = config.limiter.window_secs,
        methods = ?config.limiter.methods,
        on_store_error = ?config.on_store_error,
        "Configuration loaded"
    );

    let memory = Arc::new(MemoryStore::new());
    let sweeper = memory.spawn_sweeper(config.store.sweep_interval());
    let store: Arc<dyn CounterStore> = match config.store.timeout() {
        Some(timeout) => Arc::new(TimeoutStore::new(Arc::clone(&memory), timeout)),
        None => memory,
    };

    let limiter = RateLimiter::from_config(&config.limiter, store);
    info!("Rate limiter initialized");

    tokio::select! {
        result = replay(&limiter, &config) => result?,
        _ = shutdown_signal() => {}
    }

    sweeper.abort();
    info!("webrate stopped");
    Ok(())
}

/// Decide every request read from stdin.
async fn replay(limiter: &RateLimiter, config: &WebrateConfig) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let output = match serde_json::from_str::<RequestRecord>(line) {
            Ok(record) => {
                let request = RequestInfo::from(record);
                let result = limiter.limit(&request).await;
                let error = result.as_ref().err().map(ToString::to_string);
                let allowed = config.on_store_error.resolve(result);
                debug!(method = %request.method, path = %request.path, allowed = allowed, "Decided request");
                json!({ "allowed": allowed, "error": error })
            }
            Err(e) => {
                warn!(error = %e, "Skipping malformed request line");
                json!({ "allowed": null, "error": format!("invalid request: {}", e) })
            }
        };

        stdout.write_all(output.to_string().as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    info!("Reached end of input");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
