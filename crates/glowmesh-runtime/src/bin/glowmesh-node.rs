//! glowmesh-node - runs one mesh node over UDP broadcast
//!
//! Frames go to the log instead of an LED strip: mode changes at info,
//! every frame at trace.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{info, trace, warn};
use tracing_subscriber::EnvFilter;

use glowmesh_core::{CorrectionPolicy, DisplayMode, InversionPolicy, NodeId, SyncConfig};
use glowmesh_runtime::{FrameView, Node, NodeConfig, Renderer};
use glowmesh_transport::{random_node_id, UdpMeshConfig, UdpMeshTransport, DEFAULT_MESH_PORT};

/// glowmesh node - LED phase synchronization over a broadcast mesh
#[derive(Parser, Debug)]
#[command(name = "glowmesh-node")]
#[command(version, about, long_about = None)]
struct Args {
    /// Local address to bind
    #[arg(long, default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_MESH_PORT)))]
    bind: SocketAddr,

    /// Broadcast targets (repeatable)
    #[arg(long = "target", default_value = "255.255.255.255:47800")]
    targets: Vec<SocketAddr>,

    /// Node identifier (random if omitted, never 0)
    #[arg(long)]
    node_id: Option<u32>,

    /// Peer timeout in milliseconds
    #[arg(long, default_value_t = 3_000)]
    peer_timeout_ms: u64,

    /// Snap phase to zero on beacons instead of estimating the controller's phase
    #[arg(long)]
    hard_reset: bool,

    /// Zero the clock-inversion counter when it signals
    #[arg(long)]
    reset_inversions: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Logs frames, marking the controller with an accent
#[derive(Default)]
struct LogRenderer {
    last: Option<(DisplayMode, bool)>,
}

impl Renderer for LogRenderer {
    fn render(&mut self, frame: &FrameView) {
        let current = (frame.mode, frame.accent);
        if self.last != Some(current) {
            info!(
                node = %frame.node,
                mode = frame.mode.name(),
                controller = frame.accent,
                "display changed"
            );
            self.last = Some(current);
        }
        trace!(
            phase = frame.phase.value(),
            hue = frame.hue(),
            accent = if frame.accent { "*" } else { "" },
            "frame"
        );
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let node_id = match args.node_id {
        Some(0) => return Err("node id 0 is reserved".into()),
        Some(id) => NodeId::new(id),
        None => random_node_id(),
    };

    let sync = SyncConfig {
        correction: if args.hard_reset {
            CorrectionPolicy::HardReset
        } else {
            CorrectionPolicy::Proportional
        },
        inversion: if args.reset_inversions {
            InversionPolicy::ResetOnSignal
        } else {
            InversionPolicy::Latch
        },
        ..Default::default()
    };

    let transport = UdpMeshTransport::bind(UdpMeshConfig {
        node_id,
        bind_addr: args.bind,
        targets: args.targets,
        peer_timeout: Duration::from_millis(args.peer_timeout_ms),
        ..Default::default()
    })
    .await?;

    let mut node = Node::new(
        transport,
        LogRenderer::default(),
        NodeConfig {
            sync,
            ..Default::default()
        },
    )?;
    info!(node = %node_id, "glowmesh node running");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let wakeup = tokio::time::Instant::from_std(node.next_wakeup());
        tokio::select! {
            _ = tokio::time::sleep_until(wakeup) => node.tick(),
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!(error = %e, "signal handler failed");
                }
                break;
            }
        }
    }

    let stats = node.stats();
    info!(
        ticks = stats.ticks,
        messages_in = stats.messages_in,
        broadcasts_out = stats.broadcasts_out,
        transport_resets = stats.transport_resets,
        "glowmesh node stopped"
    );
    Ok(())
}
