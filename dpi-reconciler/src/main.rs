#![forbid(unsafe_code)]

//! The reconciler binary (§6 CLI surface): parses the colon-separated
//! `key:value` argument tokens, wires a [`dpi_core::reconciler::Reconciler`]
//! to a capture source and send sink, and runs until an INT/TERM/QUIT
//! signal drains it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use dpi_core::config::{self, Config};
use dpi_core::error::{DpiError, Result};
use dpi_core::reconciler::capture::{LoopbackMedium, LoopbackSource, RecordingSink};
use dpi_core::reconciler::janitor;
use dpi_core::reconciler::Reconciler;

/// Default config file consulted for tunables the CLI surface (§6) doesn't
/// expose directly (pairing timeout, sweep interval). Purely ambient: its
/// absence is not an error, unlike a missing `in:`/`out:` token.
const DEFAULT_CONFIG_PATH: &str = "dpi-reconciler.toml";

/// Parsed form of the `in:<iface>` / `out:<iface>` / `last` / `auto` token
/// grammar (§6).
struct Cli {
    in_iface: String,
    out_iface: String,
    terminal_hop: bool,
}

impl Cli {
    /// `auto` ignores every other token and uses compiled-in defaults.
    const AUTO_IN_IFACE: &'static str = "any0";
    const AUTO_OUT_IFACE: &'static str = "any1";

    fn parse(tokens: &[String]) -> Result<Self> {
        if tokens.iter().any(|t| t == "auto") {
            return Ok(Self {
                in_iface: Self::AUTO_IN_IFACE.to_string(),
                out_iface: Self::AUTO_OUT_IFACE.to_string(),
                terminal_hop: tokens.iter().any(|t| t == "last"),
            });
        }

        let mut in_iface = None;
        let mut out_iface = None;
        let mut terminal_hop = false;

        for token in tokens {
            if token == "last" {
                terminal_hop = true;
                continue;
            }
            match token.split_once(':') {
                Some(("in", iface)) => in_iface = Some(iface.to_string()),
                Some(("out", iface)) => out_iface = Some(iface.to_string()),
                _ => return Err(DpiError::InvalidArg(token.clone())),
            }
        }

        Ok(Self {
            in_iface: in_iface.ok_or(DpiError::MissingArg("in:<iface>"))?,
            out_iface: out_iface.ok_or(DpiError::MissingArg("out:<iface>"))?,
            terminal_hop,
        })
    }
}

fn print_usage() {
    eprintln!("usage: dpi-reconciler in:<iface> out:<iface> [last] | auto");
}

#[tokio::main]
async fn main() {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match Cli::parse(&args) {
        Ok(cli) => cli,
        Err(err) => {
            error!(%err, "bad arguments");
            print_usage();
            std::process::exit(1);
        }
    };

    let config = match load_config() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(%err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    info!(
        in_iface = %cli.in_iface,
        out_iface = %cli.out_iface,
        terminal_hop = cli.terminal_hop,
        "starting reconciler"
    );

    let reconciler = Arc::new(Reconciler::new(cli.terminal_hop));

    // Packet capture itself is an external collaborator (§1 non-goals); the
    // loopback medium below is the capture-free demo path. A real
    // deployment swaps in a pcap/af_packet-backed `CaptureSource`/`SendSink`
    // behind the same trait, reading from `cli.in_iface`/`cli.out_iface`.
    let medium = LoopbackMedium::new();
    let source = LoopbackSource { medium: medium.clone() };
    let sink = RecordingSink::new();

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let janitor_reconciler = reconciler.clone();
    let pair_timeout = Duration::from_secs(config.reconciler.pair_timeout_secs);
    let sweep_interval = Duration::from_secs(config.reconciler.sweep_interval_secs);
    let janitor_handle = tokio::spawn(run_janitor(janitor_reconciler, pair_timeout, sweep_interval, shutdown_rx));

    let run_reconciler = reconciler.clone();
    let capture_handle = tokio::spawn(async move {
        if let Err(err) = run_reconciler.run(source, sink).await {
            error!(%err, "capture loop exited with error");
        }
    });

    wait_for_shutdown_signal().await;

    let _ = shutdown_tx.send(true);
    capture_handle.abort();
    let _ = janitor_handle.await;

    let snapshot = reconciler.counters().snapshot();
    println!("plain_forwarded={}", snapshot.plain_forwarded);
    println!("reconciled={}", snapshot.reconciled);
    println!("bytes_forwarded={}", snapshot.bytes_forwarded);
    println!("dropped_malformed={}", snapshot.dropped_malformed);
    println!("dropped_timeout={}", snapshot.dropped_timeout);
    std::process::exit(0);
}

async fn run_janitor(
    reconciler: Arc<Reconciler>,
    eviction_threshold: Duration,
    sweep_interval: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(sweep_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                janitor::sweep_once(
                    reconciler.data_queue(),
                    reconciler.match_queue(),
                    eviction_threshold,
                    reconciler.counters(),
                );
            }
            res = shutdown.changed() => {
                if res.is_ok() && *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// Terminating signals (INT, TERM, QUIT) drain then print counters then
/// exit 0 (§6).
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigquit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");
        tokio::select! {
            _ = sigint.recv() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigquit.recv() => info!("received SIGQUIT"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received ctrl-c");
    }
}

fn load_config() -> Result<Config> {
    if Path::new(DEFAULT_CONFIG_PATH).exists() {
        config::load_from_path(DEFAULT_CONFIG_PATH)
    } else {
        warn!(path = DEFAULT_CONFIG_PATH, "no config file found, using compiled-in defaults");
        Ok(Config::default())
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();
}
