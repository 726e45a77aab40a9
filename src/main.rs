use std::path::PathBuf;
use std::time::Duration;

use srh_rs::config::{ScanConfig, DEFAULT_TIMEOUT_MS, DEFAULT_WORKERS};
use srh_rs::ports::{self, DEFAULT_PORT_SPEC};
use srh_rs::{discovery, report, scanner};

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// srh-rs — Security Research Helper: concurrent TCP/UDP port scanner with banner grabbing.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "srh-rs",
    version,
    about = "Security Research Helper: concurrent TCP/UDP port scanner with banner grabbing.",
    long_about = None
)]
struct Cli {
    /// Target IP address or hostname (a CIDR such as 192.168.1.0/24 with --discover).
    #[arg(short, long)]
    target: String,

    /// Find live hosts in the target network and check each for common ports.
    #[arg(long, default_value_t = false)]
    discover: bool,

    /// Port specification, e.g. `22,80,8000-8100`.
    #[arg(short, long, default_value = DEFAULT_PORT_SPEC)]
    ports: String,

    /// Path to ports list file (one spec per line, `#` comments). Overrides --ports.
    #[arg(long = "ports-file")]
    ports_file: Option<PathBuf>,

    /// Skip the TCP pass.
    #[arg(long = "no-tcp", default_value_t = false)]
    no_tcp: bool,

    /// Also run a best-effort UDP pass.
    #[arg(long, default_value_t = false)]
    udp: bool,

    /// Concurrent workers per protocol pass.
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Per-probe timeout in milliseconds (UDP waits twice as long).
    #[arg(long = "timeout-ms", default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Do not attempt banner capture on open TCP ports.
    #[arg(long = "no-banner", default_value_t = false)]
    no_banner: bool,

    /// Print results as JSON instead of a table.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Write results as pretty JSON to this path (optional).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (trace, debug, info, warn, error).
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
}

impl Cli {
    fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            workers: self.workers,
            timeout: Duration::from_millis(self.timeout_ms),
            tcp: !self.no_tcp,
            udp: self.udp,
            grab_banners: !self.no_banner,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = cli.scan_config();
    if !cfg.tcp && !cfg.udp {
        warn!("both TCP and UDP passes are disabled; nothing will be probed");
    }

    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; waiting for in-flight probes");
            cancel_ctrlc.cancel();
        }
    });

    if cli.discover {
        let hosts = discovery::discover(&cli.target, &cfg, cancel)
            .await
            .with_context(|| format!("cannot discover hosts in {}", cli.target))?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&hosts)?);
        } else {
            print!("{}", report::render_hosts(&hosts));
        }
        if let Some(path) = cli.output.as_deref() {
            report::write_json(path, &hosts)?;
            info!(path = %path.display(), "wrote JSON results");
        }
        return Ok(());
    }

    let results = match cli.ports_file.as_deref() {
        Some(path) => {
            let port_list = ports::load_port_file(path)?;
            scanner::dispatch(&cli.target, &port_list, &cfg, cancel).await
        }
        None => scanner::scan_with_cancel(&cli.target, &cli.ports, &cfg, cancel)
            .await
            .with_context(|| format!("cannot scan {}", cli.target))?,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print!("{}", report::render_table(&results));
        if !results.entries.is_empty() {
            println!();
            print!(
                "{}",
                report::render_security(&report::analyze_security(&results.entries))
            );
        }
    }

    if let Some(path) = cli.output.as_deref() {
        report::write_json(path, &results)?;
        info!(path = %path.display(), "wrote JSON results");
    }

    Ok(())
}
