//! tradeq CLI: run the dispatch service, or replay a trade file through it.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use futures::StreamExt as _;
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader};
use tokio_stream::wrappers::LinesStream;
use tracing::info;

use tradeq::config::Config;
use tradeq::dispatch::{DispatchConfig, Dispatcher, FailurePolicy};
use tradeq::error::Error;
use tradeq::model::{Trade, WorkItem};
use tradeq::processor::TradeProcessor;
use tradeq::server::{AppState, serve, shutdown_signal};
use tradeq::telemetry::{TelemetryConfig, init_telemetry};

#[derive(Parser)]
#[command(name = "tradeq", about = "Keyed, order-preserving trade dispatcher")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP dispatch service
    Serve {
        /// Address to listen on
        #[arg(long)]
        addr: Option<String>,
        #[command(flatten)]
        dispatch: DispatchArgs,
    },
    /// Dispatch trades from an NDJSON file and print results to stdout
    Replay {
        /// File with one JSON trade per line
        file: PathBuf,
        #[command(flatten)]
        dispatch: DispatchArgs,
    },
}

/// Overrides for values otherwise read from the environment.
#[derive(Args)]
struct DispatchArgs {
    /// Maximum items processing at once
    #[arg(long)]
    max_concurrency: Option<usize>,
    /// Simulated processing latency per trade, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,
    /// fail-fast or isolate
    #[arg(long)]
    failure_policy: Option<FailurePolicy>,
}

impl DispatchArgs {
    fn apply(self, config: &mut Config) {
        if let Some(n) = self.max_concurrency {
            config.max_concurrency = n;
        }
        if let Some(ms) = self.delay_ms {
            config.process_delay = std::time::Duration::from_millis(ms);
        }
        if let Some(policy) = self.failure_policy {
            config.failure_policy = policy;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    match cli.command {
        Command::Serve { addr, dispatch } => {
            dispatch.apply(&mut config);
            if let Some(addr) = addr {
                config.listen_addr = addr;
            }
            cmd_serve(config).await
        }
        Command::Replay { file, dispatch } => {
            dispatch.apply(&mut config);
            cmd_replay(config, file).await
        }
    }
}

fn dispatch_config(config: &Config) -> anyhow::Result<DispatchConfig> {
    Ok(DispatchConfig::new(config.max_concurrency)?.with_failure_policy(config.failure_policy))
}

async fn cmd_serve(config: Config) -> anyhow::Result<()> {
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "tradeq".to_string(),
        log_level: config.log_level.clone(),
    })?;

    info!(
        addr = %config.listen_addr,
        max_concurrency = config.max_concurrency,
        delay_ms = config.process_delay.as_millis() as u64,
        policy = %config.failure_policy,
        "starting trade dispatch service"
    );

    let state = AppState::new(
        TradeProcessor::new(config.process_delay),
        dispatch_config(&config)?,
    );
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    serve(listener, state, shutdown_signal()).await?;
    Ok(())
}

async fn cmd_replay(config: Config, file: PathBuf) -> anyhow::Result<()> {
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "tradeq-replay".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let handle = tokio::fs::File::open(&file).await?;
    let lines = LinesStream::new(BufReader::new(handle).lines());
    let trades = lines
        .filter(|line| futures::future::ready(!matches!(line, Ok(l) if l.trim().is_empty())))
        .map(|line| -> Result<_, Error> {
            let trade: Trade = serde_json::from_str(&line?)?;
            Ok(WorkItem::from(trade))
        });

    let dispatcher = Dispatcher::new(
        Arc::new(TradeProcessor::new(config.process_delay)),
        dispatch_config(&config)?,
    );
    let mut results = dispatcher.dispatch(trades);

    let mut stdout = tokio::io::stdout();
    let mut emitted = 0usize;
    let mut failures = 0usize;
    while let Some(result) = results.next().await {
        match result {
            Ok(trade_result) => {
                let mut line = serde_json::to_vec(&trade_result)?;
                line.push(b'\n');
                stdout.write_all(&line).await?;
                emitted += 1;
            }
            Err(e @ Error::Processing { .. }) if config.failure_policy == FailurePolicy::Isolate => {
                eprintln!("failed: {e}");
                failures += 1;
            }
            Err(e) => {
                stdout.flush().await?;
                anyhow::bail!("replay of {} aborted: {e}", file.display());
            }
        }
    }
    stdout.flush().await?;

    info!(emitted, failures, file = %file.display(), "replay finished");
    Ok(())
}
