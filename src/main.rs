//! doku - Docker disk usage scanner.
//!
//! Usage:
//!   doku [run]             Run every scanner on its interval
//!   doku df                Run the system df and log file scanners
//!   doku du                Run the bind mount and overlay2 scanners
//!   doku scan <KIND>       Run one scan and exit
//!   doku report            Summarize what the last scans persisted
//!   doku --help            Show help

mod report;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result};
use tokio::runtime::Handle;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::info;

use doku_core::{ScanIntensity, ScanSettings, SelfIdentity};
use doku_docker::EngineClient;
use doku_scan::{
    BindMountScanner, LogScanner, Overlay2Scanner, ScanContext, ScanLoop, ScanSummary, Scanner,
    SystemDfScanner,
};

#[derive(Parser)]
#[command(
    name = "doku",
    version,
    about = "Docker disk usage scanner",
    long_about = "doku measures the disk space Docker uses on this host: images, containers, \
                  volumes and build cache as reported by the daemon, plus container log files, \
                  bind mounts and overlay2 layers measured on disk.\n\n\
                  Run it inside a container with the Docker socket and the host paths of \
                  interest mounted, or directly on the host."
)]
struct Cli {
    #[command(flatten)]
    options: Options,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Debug)]
struct Options {
    /// Directory for the databases and last-scan timestamps
    #[arg(long, env = "DOKU_DB_DIR", default_value = "./db", global = true)]
    db_dir: PathBuf,

    /// Docker daemon address
    #[arg(
        long,
        env = "DOCKER_HOST",
        default_value = "unix:///var/run/docker.sock",
        global = true
    )]
    docker_host: String,

    /// Docker API version, `auto` for the daemon's default
    #[arg(long, env = "DOCKER_VERSION", default_value = "auto", global = true)]
    docker_version: String,

    /// Docker API request timeout in seconds
    #[arg(long, env = "DOCKER_TIMEOUT", default_value_t = 60, global = true)]
    docker_timeout: u64,

    /// Seconds between system df scans
    #[arg(long, env = "SCAN_INTERVAL", default_value_t = 60, global = true)]
    scan_interval: u64,

    /// Seconds between log file scans
    #[arg(long, env = "SCAN_LOGFILE_INTERVAL", default_value_t = 60, global = true)]
    scan_logfile_interval: u64,

    /// Seconds between bind mount scans
    #[arg(long, env = "SCAN_BINDMOUNTS_INTERVAL", default_value_t = 3600, global = true)]
    scan_bindmounts_interval: u64,

    /// Seconds between overlay2 scans
    #[arg(long, env = "SCAN_OVERLAY2_INTERVAL", default_value_t = 86400, global = true)]
    scan_overlay2_interval: u64,

    /// Throttling of directory walks (aggressive, normal, light)
    #[arg(long, env = "SCAN_INTENSITY", default_value = "normal", global = true)]
    scan_intensity: ScanIntensity,

    /// Measure directories with `du` when it is installed
    #[arg(
        long,
        env = "SCAN_USE_DU",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    scan_use_du: bool,

    /// Comma separated globs of bind mount paths never measured.
    /// `*` also matches `/`, a backslash is an ordinary character and
    /// `{a,b}` matches either alternative
    #[arg(
        long,
        env = "BINDMOUNT_IGNORE_PATTERNS",
        value_delimiter = ',',
        global = true
    )]
    bindmount_ignore: Vec<String>,

    /// Skip the overlay2 scanner
    #[arg(long, env = "DISABLE_OVERLAY2_SCAN", global = true)]
    disable_overlay2: bool,

    /// The scanner runs inside a Docker container
    #[arg(long, env = "IN_DOCKER", global = true)]
    in_docker: bool,

    /// Label identifying the scanner's own container
    #[arg(
        long,
        env = "DOKU_SELF_LABEL",
        default_value = "github.repo=amerkurev/doku",
        global = true
    )]
    self_label: String,

    /// Local hostname, used to tell apart several labelled containers
    #[arg(long, env = "HOSTNAME", global = true)]
    hostname: Option<String>,

    /// Format sizes with SI units (kB, MB) instead of binary units (KiB, MiB)
    #[arg(
        long,
        env = "SI",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    si: bool,

    /// Log level when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,
}

impl Options {
    fn scan_settings(&self) -> Result<ScanSettings> {
        let patterns: Vec<String> = self
            .bindmount_ignore
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        ScanSettings::builder()
            .db_dir(self.db_dir.clone())
            .df_interval(Duration::from_secs(self.scan_interval))
            .logfile_interval(Duration::from_secs(self.scan_logfile_interval))
            .bindmounts_interval(Duration::from_secs(self.scan_bindmounts_interval))
            .overlay2_interval(Duration::from_secs(self.scan_overlay2_interval))
            .intensity(self.scan_intensity)
            .use_du(self.scan_use_du)
            .bindmount_ignore_patterns(patterns)
            .identity(SelfIdentity {
                in_docker: self.in_docker,
                label: self.self_label.clone(),
                hostname: self.hostname.clone(),
            })
            .si(self.si)
            .build()
            .context("Invalid configuration")
    }

    fn docker_client(&self, handle: Handle) -> Result<EngineClient> {
        let client = EngineClient::new(&self.docker_host, handle)
            .context("Invalid Docker host")?
            .with_api_version(&self.docker_version)
            .with_timeout(Duration::from_secs(self.docker_timeout));
        Ok(client)
    }
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Run every scanner on its interval (default)
    Run,

    /// Run the system df and log file scanners on their intervals
    Df,

    /// Run the bind mount and overlay2 scanners on their intervals
    Du,

    /// Run a single scan and exit
    Scan {
        #[arg(value_enum)]
        kind: ScanKind,
    },

    /// Summarize what the last scans persisted
    Report {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScanKind {
    SystemDf,
    Logs,
    BindMounts,
    Overlay2,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(&cli.options);

    let settings = cli.options.scan_settings()?;
    let command = cli.command.unwrap_or(Command::Run);

    if let Command::Report { format } = command {
        return report::run_report(&settings, format);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    let docker = cli.options.docker_client(runtime.handle().clone())?;
    info!(
        docker_host = %docker.endpoint(),
        db_dir = %cli.options.db_dir.display(),
        in_docker = cli.options.in_docker,
        intensity = %cli.options.scan_intensity,
        "Starting doku"
    );
    let ctx = ScanContext::new(Arc::new(docker), settings);

    runtime.block_on(async {
        match command {
            Command::Run => {
                let loops = vec![df_loop(&ctx), du_loop(&ctx, cli.options.disable_overlay2)];
                serve(loops).await
            }
            Command::Df => serve(vec![df_loop(&ctx)]).await,
            Command::Du => serve(vec![du_loop(&ctx, cli.options.disable_overlay2)]).await,
            Command::Scan { kind } => scan_once(&ctx, kind).await,
            Command::Report { .. } => Ok(()),
        }
    })
}

/// Initialize tracing: RUST_LOG takes precedence, fallback to `--log-level`.
fn init_tracing(options: &Options) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&options.log_level)),
        )
        .with_ansi(!options.in_docker)
        .with_writer(std::io::stderr)
        .init();
}

fn df_loop(ctx: &ScanContext) -> ScanLoop {
    let settings = ctx.settings();
    ScanLoop::new("df")
        .every(settings.df_interval, SystemDfScanner::new(ctx.clone()))
        .every(settings.logfile_interval, LogScanner::new(ctx.clone()))
}

fn du_loop(ctx: &ScanContext, disable_overlay2: bool) -> ScanLoop {
    let settings = ctx.settings();
    let scan_loop = ScanLoop::new("du")
        .every(settings.bindmounts_interval, BindMountScanner::new(ctx.clone()));
    if disable_overlay2 {
        info!("overlay2 scanning disabled");
        scan_loop
    } else {
        scan_loop.every(settings.overlay2_interval, Overlay2Scanner::new(ctx.clone()))
    }
}

/// Run the loops on blocking threads until SIGINT or SIGTERM.
async fn serve(loops: Vec<ScanLoop>) -> Result<()> {
    let cancel = CancellationToken::new();
    let handles: Vec<_> = loops
        .into_iter()
        .map(|scan_loop| {
            let token = cancel.clone();
            tokio::task::spawn_blocking(move || scan_loop.run(&token))
        })
        .collect();

    shutdown_signal().await?;
    cancel.cancel();

    for handle in handles {
        handle.await.context("Scan loop panicked")?;
    }
    info!("doku stopped");
    Ok(())
}

/// One pass of a single scanner; a signal stops it early.
async fn scan_once(ctx: &ScanContext, kind: ScanKind) -> Result<()> {
    let scanner: Box<dyn Scanner> = match kind {
        ScanKind::SystemDf => Box::new(SystemDfScanner::new(ctx.clone())),
        ScanKind::Logs => Box::new(LogScanner::new(ctx.clone())),
        ScanKind::BindMounts => Box::new(BindMountScanner::new(ctx.clone())),
        ScanKind::Overlay2 => Box::new(Overlay2Scanner::new(ctx.clone())),
    };
    let name = scanner.name();

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let mut task = tokio::task::spawn_blocking(move || scanner.scan(&token));

    let result = tokio::select! {
        result = &mut task => result,
        stopped = shutdown_signal() => {
            stopped?;
            cancel.cancel();
            task.await
        }
    };
    let summary = result
        .context("Scan panicked")?
        .with_context(|| format!("{name} scan failed"))?;

    print_summary(ctx, name, &summary);
    Ok(())
}

fn print_summary(ctx: &ScanContext, name: &str, summary: &ScanSummary) {
    println!();
    println!("{}", "─".repeat(60));
    if summary.skipped {
        println!(" {name}: nothing to scan (see log for details)");
    } else {
        println!(
            " {name} - {} in {} item(s)",
            ctx.format_size(summary.total_size),
            summary.items
        );
        if summary.errors > 0 {
            println!(" {} item(s) could not be measured", summary.errors);
        }
        println!(
            " Scanned in {:.2}s ({}/s)",
            summary.elapsed.as_secs_f64(),
            ctx.format_size(summary.bytes_per_second() as u64)
        );
        if summary.cancelled {
            println!(" Interrupted before completion");
        }
    }
    println!("{}", "─".repeat(60));
}

async fn shutdown_signal() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => info!("Received SIGINT, stopping scanners"),
        _ = sigterm.recv() => info!("Received SIGTERM, stopping scanners"),
    }
    Ok(())
}
