mod app;
mod graph;
mod lineage;
mod timing;
mod util;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::lineage::{FixtureRegistry, SAMPLE_REGISTRY};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Registry fixture to explore; the bundled sample is used when omitted.
    #[arg(long, env = "PROVENANCE_FIXTURE")]
    fixture: Option<PathBuf>,

    /// Id to start from; defaults to the first dataset in the registry.
    #[arg(long, env = "PROVENANCE_ROOT")]
    root: Option<String>,

    /// Artificial delay added to every registry call.
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,

    #[arg(long, default_value = "reports")]
    report_dir: PathBuf,

    /// Hops included in generated reports.
    #[arg(long, default_value_t = 3)]
    report_depth: u32,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("provenance_explorer=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let registry = match &args.fixture {
        Some(path) => FixtureRegistry::load(path)?,
        None => FixtureRegistry::parse(SAMPLE_REGISTRY).context("bundled sample registry is invalid")?,
    }
    .with_latency(Duration::from_millis(args.latency_ms));

    let root = args.root.clone().or_else(|| registry.default_root());
    if let Some(root) = &root
        && !registry.contains(root)
    {
        warn!(%root, "root id is not in the registry; lineage queries will fail");
    }
    info!(root = ?root, fixture = ?args.fixture, "starting provenance explorer");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("lineage-fetch")
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    let registry = Arc::new(registry);
    let services = app::Services {
        lineage: registry.clone(),
        items: registry.clone(),
        reports: registry,
    };
    let config = app::AppConfig {
        root,
        report_dir: args.report_dir,
        report_depth: args.report_depth,
    };

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Provenance Explorer",
        options,
        Box::new(move |cc| {
            Ok(Box::new(app::ProvenanceApp::new(
                cc, config, services, runtime,
            )))
        }),
    )
    .map_err(|error| anyhow!("viewer exited with an error: {error}"))
}
