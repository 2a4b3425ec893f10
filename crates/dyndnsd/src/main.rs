// # dyndnsd - dynamic DNS daemon
//
// Keeps `<host>.<domain>` pointed at this machine's public IPv4 address.
//
// This binary is a thin integration layer:
// 1. Parse flags (environment variables as fallbacks)
// 2. Initialize tracing and the runtime
// 3. Build the IP source and DNS backend
// 4. Run the engine until SIGINT/SIGTERM
//
// All reconciliation, monitoring and dispatch logic lives in dyndns-core.
//
// ## Example
//
// ```bash
// export CLOUDFLARE_API_TOKEN=...
// dyndnsd -host home -domain example.com
// ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dyndns_core::{
    AmbiguityPolicy, DnsBackend, DyndnsConfig, DyndnsEngine, Error, MemoryDnsBackend,
    ShutdownCoordinator,
};
use dyndns_ip_http::{HttpIpSource, is_known_echo_service};
use dyndns_provider_cloudflare::CloudflareBackend;
use std::ffi::OsString;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DyndnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DyndnsExitCode> for ExitCode {
    fn from(code: DyndnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Long flags that may also be spelled with a single dash
const GO_STYLE_FLAGS: &[&str] = &[
    "host",
    "domain",
    "ip-echo-url",
    "interval",
    "backend",
    "on-ambiguous-record",
    "dry-run",
    "log-level",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// Cloudflare API v4 (token from CLOUDFLARE_API_TOKEN)
    Cloudflare,
    /// In-process zone, nothing leaves the machine
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OnAmbiguous {
    /// Warn and compare against the first address
    UseFirst,
    /// Refuse to start
    Fail,
}

impl From<OnAmbiguous> for AmbiguityPolicy {
    fn from(value: OnAmbiguous) -> Self {
        match value {
            OnAmbiguous::UseFirst => AmbiguityPolicy::UseFirst,
            OnAmbiguous::Fail => AmbiguityPolicy::Fail,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// Keep a DNS A record pointed at this host's public IPv4 address.
#[derive(Parser, Debug)]
#[command(name = "dyndnsd", version, about)]
struct Cli {
    /// Host label of the managed record (e.g., home)
    #[arg(long, env = "DYNDNS_HOST")]
    host: String,

    /// Domain hosting the record (e.g., example.com)
    #[arg(long, env = "DYNDNS_DOMAIN")]
    domain: String,

    /// IP-echo endpoint answering with the caller's address
    /// (e.g., https://api.ipify.org, https://icanhazip.com)
    #[arg(long, env = "DYNDNS_IP_ECHO_URL", default_value = dyndns_core::config::DEFAULT_IP_ECHO_URL)]
    ip_echo_url: String,

    /// Seconds between two public IP samples
    #[arg(
        long,
        env = "DYNDNS_INTERVAL_SECS",
        default_value_t = 4,
        value_parser = clap::value_parser!(u64).range(1..=3600)
    )]
    interval: u64,

    /// DNS backend holding the record
    #[arg(long, env = "DYNDNS_BACKEND", value_enum, default_value_t = BackendKind::Cloudflare)]
    backend: BackendKind,

    /// What to do when the name already has several A records
    #[arg(long, value_enum, default_value_t = OnAmbiguous::UseFirst)]
    on_ambiguous_record: OnAmbiguous,

    /// Read from the backend but only log intended writes
    #[arg(long, env = "DYNDNS_DRY_RUN")]
    dry_run: bool,

    /// Log verbosity
    #[arg(long, env = "DYNDNS_LOG_LEVEL", value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

impl Cli {
    /// Reject flag combinations clap cannot express
    fn check(&self) -> Result<()> {
        if self.dry_run && self.backend == BackendKind::Memory {
            anyhow::bail!("--dry-run only applies to --backend cloudflare");
        }
        Ok(())
    }

    /// Build the engine configuration from parsed flags
    fn to_config(&self) -> DyndnsConfig {
        let mut config = DyndnsConfig::new(&self.host, &self.domain);
        config.ip_source.url = self.ip_echo_url.clone();
        config.ip_source.interval_secs = self.interval;
        config.reconcile.on_ambiguous = self.on_ambiguous_record.into();
        config
    }
}

/// Rewrite `-host`, `-domain=x` and friends to their double-dash form
///
/// Arguments after a bare `--` are left alone.
fn normalize_go_style_flags<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut passthrough = false;

    args.into_iter()
        .map(|arg| {
            if passthrough {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                passthrough = true;
                return arg;
            }
            if text.starts_with("--") {
                return arg;
            }
            let Some(flag) = text.strip_prefix('-') else {
                return arg;
            };
            let name = flag.split_once('=').map_or(flag, |(name, _)| name);
            if GO_STYLE_FLAGS.contains(&name) {
                OsString::from(format!("-{text}"))
            } else {
                arg
            }
        })
        .collect()
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse_from(normalize_go_style_flags(std::env::args_os())) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    DyndnsExitCode::CleanShutdown.into()
                }
                _ => DyndnsExitCode::ConfigError.into(),
            };
        }
    };

    if let Err(e) = cli.check() {
        eprintln!("Configuration error: {}", e);
        return DyndnsExitCode::ConfigError.into();
    }

    let config = cli.to_config();
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DyndnsExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::from(cli.log_level))
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DyndnsExitCode::ConfigError.into();
    }

    info!(
        fqdn = %config.record.fqdn(),
        backend = ?cli.backend,
        interval_secs = config.ip_source.interval_secs,
        "Starting dyndnsd"
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DyndnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(&cli, config)).into()
}

/// Build the engine, run it until a stop is requested, and pick the exit code
async fn run_daemon(cli: &Cli, config: DyndnsConfig) -> DyndnsExitCode {
    let coordinator = ShutdownCoordinator::new();
    let listener = coordinator.clone();

    // Signals are handled from here on, zone resolution included
    tokio::spawn(async move {
        let fallback = listener.clone();
        match listener.listen().await {
            Ok(Some(signal)) => info!(signal = %signal, "Shutting down daemon"),
            Ok(None) => {}
            Err(e) => {
                error!("Failed to install signal handlers: {}", e);
                fallback.trigger("signal handlers unavailable");
            }
        }
    });

    let engine = match coordinator.run_until_stopped(build_engine(cli, config)).await {
        Some(Ok(engine)) => engine,
        Some(Err(e)) => {
            error!("Startup failed: {:#}", e);
            return DyndnsExitCode::ConfigError;
        }
        None => {
            info!("Stop requested during startup");
            return DyndnsExitCode::CleanShutdown;
        }
    };

    match engine.run(coordinator.token()).await {
        Ok(report) => {
            info!(
                reconciliation = ?report.reconciliation.outcome,
                ticks = report.monitor.ticks,
                failed_lookups = report.monitor.failed_lookups,
                applied = report.dispatch.applied,
                failed = report.dispatch.failed,
                "Daemon stopped"
            );
            DyndnsExitCode::CleanShutdown
        }
        Err(e @ Error::AmbiguousRecord { .. }) => {
            error!("Startup reconciliation failed: {}", e);
            DyndnsExitCode::ConfigError
        }
        Err(e) => {
            error!("Daemon error: {}", e);
            DyndnsExitCode::RuntimeError
        }
    }
}

/// Construct backend, IP source and engine (resolves the hosted zone)
async fn build_engine(cli: &Cli, config: DyndnsConfig) -> Result<DyndnsEngine> {
    let backend: Arc<dyn DnsBackend> = match cli.backend {
        BackendKind::Cloudflare => Arc::new(
            CloudflareBackend::from_env(cli.dry_run)
                .context("Failed to configure Cloudflare backend")?,
        ),
        BackendKind::Memory => {
            warn!("Using in-memory DNS backend - records are not published");
            Arc::new(MemoryDnsBackend::with_zone(&config.record.domain, "local"))
        }
    };

    if !is_known_echo_service(&config.ip_source.url) {
        info!(
            url = %config.ip_source.url,
            "Using a custom IP-echo service, it must answer with a bare IPv4 address"
        );
    }

    let ip_source = Arc::new(
        HttpIpSource::from_config(&config.ip_source).context("Failed to configure IP source")?,
    );

    let fqdn = config.record.fqdn();
    DyndnsEngine::new(ip_source, backend, config)
        .await
        .with_context(|| format!("Failed to resolve hosted zone for {fqdn}"))
}
