use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use trackgraph::{
    CoordinatorOptions, EndReason, Event, FramePlan, FrameScene, Graph, GraphInput, IngestStats,
    NodePosition, SceneConfig, SimulationConfig, SimulationCoordinator, SimulationState, Viewport,
    logging,
};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Graph JSON with `nodes` and `edges` arrays.
    #[arg(long)]
    input: PathBuf,

    /// Simulation config JSON; missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 1280.0)]
    width: f64,

    #[arg(long, default_value_t = 720.0)]
    height: f64,

    /// Fits the whole layout when omitted.
    #[arg(long)]
    zoom: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    camera_x: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    camera_y: Option<f64>,

    #[arg(long, default_value_t = 10)]
    snapshot_every: usize,

    /// Run the simulation on this thread instead of a worker.
    #[arg(long)]
    inline: bool,

    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    #[arg(long)]
    pretty: bool,

    #[arg(long, default_value = "info")]
    log: String,
}

#[derive(Serialize)]
struct Report {
    reason: EndReason,
    state: Option<SimulationState>,
    ingest: IngestStats,
    viewport: Viewport,
    plan: FramePlan,
    positions: Vec<NodePosition>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn settle(
    coordinator: &mut SimulationCoordinator,
    timeout: Duration,
) -> Result<(EndReason, Vec<NodePosition>)> {
    let mut latest = Vec::new();
    loop {
        match coordinator.next_event(timeout)? {
            Some(Event::Tick { positions, .. }) => latest = positions,
            Some(Event::Ended { reason, .. }) => return Ok((reason, latest)),
            Some(Event::Error { message }) => warn!(%message, "simulation error"),
            None => bail!("no simulation progress within {}s", timeout.as_secs()),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(&args.log).context("installing log subscriber")?;

    let input: GraphInput = read_json(&args.input)?;
    let config: SimulationConfig = match &args.config {
        Some(path) => read_json(path)?,
        None => SimulationConfig::default(),
    };
    let graph = Graph::ingest(input.clone());

    let mut coordinator = SimulationCoordinator::new(CoordinatorOptions {
        snapshot_every: args.snapshot_every,
        force_inline: args.inline,
        ..Default::default()
    });
    coordinator
        .start(input, config)
        .context("starting simulation")?;
    if let Some(reason) = coordinator.fallback_reason() {
        warn!(reason, "running without a worker thread");
    }

    let (reason, positions) = settle(&mut coordinator, Duration::from_secs(args.timeout_secs))?;
    let state = coordinator.state();
    coordinator.stop();

    let mut scene = FrameScene::from_graph(&graph, SceneConfig::default());
    scene.apply_snapshot(&positions);

    let mut viewport = Viewport::new(args.width, args.height);
    match args.zoom {
        Some(zoom) => viewport.zoom = zoom,
        None => viewport.fit_to_bounds(&scene.quadtree().boundary(), 40.0),
    }
    if let Some(x) = args.camera_x {
        viewport.camera_x = x;
    }
    if let Some(y) = args.camera_y {
        viewport.camera_y = y;
    }

    let plan = scene.plan(&viewport);
    info!(stats = %plan.stats, ?reason, "layout ready");

    let report = Report {
        reason,
        state,
        ingest: graph.stats,
        viewport,
        plan,
        positions,
    };
    let json = if args.pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }
    .context("serializing report")?;
    println!("{json}");

    Ok(())
}
