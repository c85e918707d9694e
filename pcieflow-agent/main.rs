use axum::{response::IntoResponse, routing::get, Router};
use clap::Parser;
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pcieflow::common::{cpuid, Msr, CPU_SIGNATURE};
use pcieflow::config::{DEFAULT_DELAY_MS, DEFAULT_LISTEN, DEFAULT_SAMPLES};
use pcieflow::{
    ExportConfig, MetricCollector, MsrCounterPort, PcieMetricExporter, PcieMonitor,
    PcieflowError, Platform, PlatformKind, Result,
};

type MsrExporter = PcieMetricExporter<MsrCounterPort<&'static Msr>>;

#[derive(Parser, Debug)]
#[command(name = "pcieflow")]
#[command(about = "PCIe bandwidth monitoring for Intel Xeon CPUs")]
struct Args {
    #[arg(
        long,
        default_value_t = DEFAULT_DELAY_MS,
        help = "Multiplexing budget in milliseconds for one pass over all event groups"
    )]
    delay_ms: u32,

    #[arg(long, default_value_t = 10, help = "Seconds between collection cycles")]
    interval_secs: u64,

    #[arg(
        long,
        default_value_t = DEFAULT_SAMPLES,
        help = "Samples per pass (divides the per-group slice)"
    )]
    samples: u32,

    #[arg(long, default_value = DEFAULT_LISTEN, help = "Address of the /metrics endpoint")]
    listen: SocketAddr,

    #[arg(
        long = "socket",
        help = "Sockets to monitor (can be specified multiple times, supports ranges: --socket 0 --socket 1 or --socket 0-1)",
        action = clap::ArgAction::Append
    )]
    sockets: Vec<String>,

    #[arg(
        long = "core",
        help = "Cores used to reach each socket (supports ranges and comma-separated lists: --core 0-3,28-31)",
        action = clap::ArgAction::Append
    )]
    cores: Vec<String>,

    #[arg(
        short,
        long,
        help = "Enable verbose logging (shows every MSR access and group delta)"
    )]
    verbose: bool,
}

struct AppState {
    exporter: Arc<MsrExporter>,
}

async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    pcieflow::gather_metrics!(buffer, encoder, state.exporter, "PCIe");

    let content_type = encoder.format_type().to_string();
    (
        [("Content-Type", content_type)],
        String::from_utf8(buffer).unwrap_or_default(),
    )
}

fn check_permissions() {
    let msr_path = "/dev/cpu/0/msr";
    if std::fs::metadata(msr_path).is_err() {
        eprintln!("\nERROR: Cannot access {msr_path}\n\nThe MSR kernel module may not be loaded.\nRun: sudo modprobe msr\n");
        std::process::exit(1);
    }

    if let Err(e) = std::fs::File::open(msr_path) {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            eprintln!("\nERROR: Permission denied accessing {msr_path}\n\nRun as root or grant CAP_SYS_RAWIO.\n");
            std::process::exit(1);
        }
    }
}

/// Parse a list of range strings like ["0-3", "5", "8-11"]
/// Supports multiple formats:
/// - Single values: "0", "5"
/// - Ranges: "0-3" (inclusive)
/// - Comma-separated: "0,2,4"
/// - Mixed: "0-3,5,8-11"
fn parse_range_list(inputs: &[String]) -> Result<Vec<u32>> {
    let mut result = Vec::new();

    for input in inputs {
        for part in input.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let invalid = || PcieflowError::ConfigError(format!("Invalid CPU/socket id: {part}"));
            if let Some((start, end)) = part.split_once('-') {
                let start: u32 = start.trim().parse().map_err(|_| invalid())?;
                let end: u32 = end.trim().parse().map_err(|_| invalid())?;
                result.extend(start..=end);
            } else {
                result.push(part.parse().map_err(|_| invalid())?);
            }
        }
    }

    result.sort_unstable();
    result.dedup();
    Ok(result)
}

fn build_config(args: &Args) -> Result<ExportConfig> {
    let mut config = if args.sockets.is_empty() && args.cores.is_empty() {
        tracing::info!("Auto-detecting CPUs...");
        ExportConfig::auto_detect()
    } else {
        let cores = if args.cores.is_empty() {
            ExportConfig::detect_online_cpus()
        } else {
            parse_range_list(&args.cores)?
        };

        let sockets = if args.sockets.is_empty() {
            ExportConfig::detect_sockets(&cores)
        } else {
            parse_range_list(&args.sockets)?
        };

        tracing::info!("Using sockets: {:?}", sockets);
        tracing::info!("Using cores: {:?}", cores);

        ExportConfig::new(sockets, cores)
    };

    config.delay_ms = args.delay_ms;
    config.samples = args.samples;
    config.interval = Duration::from_secs(args.interval_secs);
    config.listen = args.listen;
    config.validate()?;

    Ok(config)
}

fn init_exporter(config: &ExportConfig) -> Result<MsrExporter> {
    if !cpuid::is_genuine_intel() {
        return Err(PcieflowError::UnsupportedPlatform(format!(
            "CPU vendor {} is not GenuineIntel",
            cpuid::vendor()
        )));
    }

    let signature = *CPU_SIGNATURE;
    tracing::info!(
        "Detected CPU: {}",
        signature.model_name().unwrap_or("unknown model")
    );

    let kind = PlatformKind::for_cpu_model(signature.model)?;
    let platform = Platform::new(kind, config.delay_ms, config.samples)?;

    let socket_cpus = config.socket_representatives()?;
    let port = MsrCounterPort::new(
        Msr::instance(),
        &socket_cpus,
        signature.model,
        platform.descriptor().encoding(),
    )?;

    PcieMetricExporter::new(PcieMonitor::new(platform, port))
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::warn!("Shutdown triggered by Ctrl+C");
        },
        _ = terminate => {
            tracing::warn!("Shutdown triggered by SIGTERM");
        },
    }

    cancel_token.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    check_permissions();
    ExportConfig::ensure_no_offline_cores()?;

    let config = build_config(&args)?;
    tracing::info!(
        "Monitoring {} sockets, {} ms multiplexing budget, {} sample(s) per pass",
        config.sockets.len(),
        config.delay_ms,
        config.samples
    );

    let exporter = init_exporter(&config)?;
    let collector = MetricCollector::new(exporter, config.interval);
    let state = Arc::new(AppState {
        exporter: collector.exporter(),
    });

    let cancel_token = CancellationToken::new();
    let collection_handle = collector.start(cancel_token.clone());

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(state);

    tracing::info!("Starting HTTP server on {}", config.listen);
    let listener = tokio::net::TcpListener::bind(config.listen).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token))
        .await?;

    tracing::info!("Server shutdown complete, waiting for collection loop to finish...");
    if let Err(e) = collection_handle.await {
        tracing::error!("Collection loop failed: {}", e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_list() {
        let inputs = vec!["0-2,5".to_string(), "4".to_string(), "5".to_string()];
        assert_eq!(parse_range_list(&inputs).unwrap(), vec![0, 1, 2, 4, 5]);
    }

    #[test]
    fn test_parse_range_list_rejects_garbage() {
        assert!(parse_range_list(&["x-3".to_string()]).is_err());
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["pcieflow"]);
        assert_eq!(args.delay_ms, 1000);
        assert_eq!(args.interval_secs, 10);
        assert_eq!(args.samples, 1);
        assert_eq!(args.listen.to_string(), "127.0.0.1:9402");
    }
}
