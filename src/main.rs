//! chanexpand CLI
//!
//! Usage:
//!   chanexpand [OPTIONS] FILE[:MACROS]...
//!
//! Expands each template file once, or periodically when `--period` is
//! given, writing the rendered output into the out-directory. Channel
//! values come from the simulated backend configured with `--channels`;
//! channels with no definition render as disconnected.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use chanexpand::channel::sim::SimClient;
use chanexpand::{
    effective_timeout, CacheConfig, ExpansionScheduler, FetchMode, MacroContext, SchedulerConfig,
    TagRenderer, ValueCache,
};

#[derive(Parser)]
#[command(name = "chanexpand")]
#[command(about = "Expand text templates from live channel values")]
struct Cli {
    /// Template files, each optionally carrying inline macros
    /// (`path` or `path:NAME=VALUE,...`)
    #[arg(value_name = "FILE[:MACROS]", required = true)]
    files: Vec<String>,

    /// Directory expanded files are written into
    #[arg(short = 'O', long, value_name = "DIR", default_value = "..")]
    outdir: PathBuf,

    /// Add a global macro definition (lowest precedence; repeatable)
    #[arg(short = 'D', long = "define", value_name = "KEY=VAL")]
    defines: Vec<String>,

    /// Re-expand templates periodically; 0 expands once and exits
    #[arg(short = 'P', long, value_name = "SECONDS", default_value_t = 0.0)]
    period: f64,

    /// Per-fetch timeout; forced below the period when both are given
    #[arg(short = 'T', long, value_name = "SECONDS", default_value_t = 5.0)]
    timeout: f64,

    /// Do not request change-of-property notifications (some gateways
    /// mishandle them)
    #[arg(long = "no-dbe-prop")]
    no_dbe_prop: bool,

    /// Channel definitions for the simulated backend (TOML)
    #[arg(long, value_name = "FILE")]
    channels: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log errors only
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        tracing::Level::ERROR
    } else {
        match cli.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    if cli.period < 0.0 || !cli.period.is_finite() {
        error!(period = cli.period, "period must be a non-negative number");
        return ExitCode::from(2);
    }
    if cli.timeout <= 0.0 || !cli.timeout.is_finite() {
        error!(timeout = cli.timeout, "timeout must be a positive number");
        return ExitCode::from(2);
    }

    let period = (cli.period > 0.0).then(|| Duration::from_secs_f64(cli.period));
    let (timeout, adjusted) = effective_timeout(Duration::from_secs_f64(cli.timeout), period);
    if adjusted {
        warn!(
            "timeout must be < period; using {:.3}s",
            timeout.as_secs_f64()
        );
    }

    let client = match &cli.channels {
        Some(path) => match SimClient::from_file(path) {
            Ok(client) => {
                info!(
                    definitions = %path.display(),
                    channels = client.channel_count(),
                    "loaded channel definitions"
                );
                client
            }
            Err(err) => {
                error!(definitions = %path.display(), error = %err, "invalid channel definitions");
                return ExitCode::from(2);
            }
        },
        None => {
            warn!("no channel definitions given; every channel will be disconnected");
            SimClient::empty()
        }
    };

    let mode = if period.is_some() {
        FetchMode::Monitor
    } else {
        FetchMode::Get
    };
    let cache = Arc::new(ValueCache::new(
        Arc::new(client),
        CacheConfig {
            mode,
            timeout,
            use_property_events: !cli.no_dbe_prop,
        },
    ));

    let globals = MacroContext::from_defines(&cli.defines);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; finishing current pass");
            let _ = shutdown_tx.send(true);
        }
    });

    let scheduler = ExpansionScheduler::new(
        &cli.files,
        &globals,
        Arc::new(TagRenderer::new()),
        cache,
        SchedulerConfig {
            outdir: cli.outdir.clone(),
            period,
        },
        shutdown_rx,
    );
    scheduler.run().await;

    info!("done");
    ExitCode::SUCCESS
}
