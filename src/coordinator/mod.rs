//! Runs a `ForceSimulation` off the rendering path.
//!
//! The coordinator owns the simulation for the length of a run and talks to
//! it only through `Command`s; layout comes back as immutable `Event::Tick`
//! snapshots in tick order. When no worker thread can be started the same
//! session runs inline on the caller's thread, a batch of ticks per
//! `on_frame` call.

mod inline;
mod protocol;
mod session;
mod worker;

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CoordinatorError, GraphError};
use crate::graph::{EdgeInput, GraphInput, NodeInput};
use crate::physics::{ConfigPatch, SimulationConfig, SimulationState};

pub use protocol::{Command, Event};
pub use worker::{ThreadSpawner, WorkerJob, WorkerSpawner};

use inline::InlineRunner;
use worker::WorkerHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Running,
    Paused,
    Converged,
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorOptions {
    /// Publish every Kth tick; the last tick of a run is always published.
    pub snapshot_every: usize,
    /// Ticks per `on_frame` call when running inline.
    pub ticks_per_frame: usize,
    pub thread_name: String,
    /// Skip the worker thread entirely.
    pub force_inline: bool,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            snapshot_every: 1,
            ticks_per_frame: 4,
            thread_name: "trackgraph-sim".to_owned(),
            force_inline: false,
        }
    }
}

enum Backend {
    Idle,
    Worker(WorkerHandle),
    Inline(InlineRunner),
}

pub struct SimulationCoordinator {
    options: CoordinatorOptions,
    spawner: Box<dyn WorkerSpawner>,
    backend: Backend,
    phase: Phase,
    /// Mirrors the session's pause flag, which outlives convergence.
    paused: bool,
    node_ids: HashSet<String>,
    state: Option<SimulationState>,
    fallback_reason: Option<String>,
}

impl Default for SimulationCoordinator {
    fn default() -> Self {
        Self::new(CoordinatorOptions::default())
    }
}

impl SimulationCoordinator {
    pub fn new(options: CoordinatorOptions) -> Self {
        Self::with_spawner(options, Box::new(ThreadSpawner))
    }

    pub fn with_spawner(options: CoordinatorOptions, spawner: Box<dyn WorkerSpawner>) -> Self {
        Self {
            options,
            spawner,
            backend: Backend::Idle,
            phase: Phase::Idle,
            paused: false,
            node_ids: HashSet::new(),
            state: None,
            fallback_reason: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Alpha and iteration count from the latest published tick.
    pub fn state(&self) -> Option<SimulationState> {
        self.state
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.backend, Backend::Inline(_))
    }

    /// Why the worker thread could not be used, when running inline after a
    /// failed spawn.
    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }

    /// Begins a fresh run, replacing any current one. An empty node set is
    /// rejected and leaves the coordinator idle.
    pub fn start(
        &mut self,
        graph: GraphInput,
        config: SimulationConfig,
    ) -> Result<(), CoordinatorError> {
        let node_ids = graph
            .nodes
            .iter()
            .map(|node| node.id.clone())
            .collect::<HashSet<_>>();
        if node_ids.is_empty() {
            self.shutdown_backend();
            self.phase = Phase::Idle;
            return Err(GraphError::EmptyGraph.into());
        }

        self.shutdown_backend();
        self.backend = self.launch();
        self.node_ids = node_ids;
        self.state = None;
        self.paused = false;
        self.dispatch(Command::Init { graph, config })?;
        self.phase = Phase::Running;
        Ok(())
    }

    fn launch(&mut self) -> Backend {
        let options = &self.options;
        let inline = || InlineRunner::new(options.snapshot_every, options.ticks_per_frame);
        if options.force_inline {
            self.fallback_reason = None;
            return Backend::Inline(inline());
        }

        match WorkerHandle::spawn(
            self.spawner.as_ref(),
            &options.thread_name,
            options.snapshot_every,
        ) {
            Ok(worker) => {
                info!(thread = %options.thread_name, "simulation worker started");
                self.fallback_reason = None;
                Backend::Worker(worker)
            }
            Err(error) => {
                warn!(%error, "simulation worker unavailable, running inline");
                let backend = Backend::Inline(inline());
                self.fallback_reason = Some(error.to_string());
                backend
            }
        }
    }

    fn dispatch(&mut self, command: Command) -> Result<(), CoordinatorError> {
        match &mut self.backend {
            Backend::Idle => Err(CoordinatorError::NotStarted),
            Backend::Worker(worker) => worker.send(command),
            Backend::Inline(runner) => {
                runner.send(command);
                Ok(())
            }
        }
    }

    fn ensure_started(&self) -> Result<(), CoordinatorError> {
        match self.backend {
            Backend::Idle => Err(CoordinatorError::NotStarted),
            _ => Ok(()),
        }
    }

    /// Phase after a command that brings alpha back up. A paused session
    /// stays paused until `resume`.
    fn rewarm(&mut self) {
        if self.phase == Phase::Converged {
            self.phase = if self.paused { Phase::Paused } else { Phase::Running };
        }
    }

    pub fn update(
        &mut self,
        nodes: Option<Vec<NodeInput>>,
        edges: Option<Vec<EdgeInput>>,
    ) -> Result<(), CoordinatorError> {
        self.ensure_started()?;
        let node_ids = match &nodes {
            Some(nodes) => {
                let ids = nodes
                    .iter()
                    .map(|node| node.id.clone())
                    .collect::<HashSet<_>>();
                if ids.is_empty() {
                    return Err(GraphError::EmptyGraph.into());
                }
                Some(ids)
            }
            None => None,
        };

        self.dispatch(Command::Update { nodes, edges })?;
        if let Some(node_ids) = node_ids {
            self.node_ids = node_ids;
        }
        self.rewarm();
        Ok(())
    }

    pub fn configure(&mut self, patch: ConfigPatch) -> Result<(), CoordinatorError> {
        self.dispatch(Command::Configure { patch })
    }

    pub fn pause(&mut self) -> Result<(), CoordinatorError> {
        self.dispatch(Command::Pause)?;
        self.paused = true;
        if self.phase == Phase::Running {
            self.phase = Phase::Paused;
        }
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), CoordinatorError> {
        self.dispatch(Command::Resume)?;
        self.paused = false;
        if self.phase == Phase::Paused {
            self.phase = Phase::Running;
        }
        Ok(())
    }

    /// Raises alpha to `alpha` without moving nodes.
    pub fn reheat(&mut self, alpha: f64) -> Result<(), CoordinatorError> {
        self.dispatch(Command::Reheat { alpha })?;
        self.rewarm();
        Ok(())
    }

    /// Resets alpha and the iteration count, keeping the current layout.
    pub fn restart(&mut self) -> Result<(), CoordinatorError> {
        self.dispatch(Command::Restart)?;
        self.rewarm();
        Ok(())
    }

    pub fn pin_node(&mut self, id: &str, x: f64, y: f64) -> Result<(), CoordinatorError> {
        self.ensure_started()?;
        if !self.node_ids.contains(id) {
            return Err(CoordinatorError::UnknownNode(id.to_owned()));
        }
        self.dispatch(Command::PinNode {
            id: id.to_owned(),
            x,
            y,
        })
    }

    pub fn unpin_node(&mut self, id: &str) -> Result<(), CoordinatorError> {
        self.ensure_started()?;
        if !self.node_ids.contains(id) {
            return Err(CoordinatorError::UnknownNode(id.to_owned()));
        }
        self.dispatch(Command::UnpinNode { id: id.to_owned() })
    }

    /// Ends the run. Safe at any time; once this returns no further events
    /// are delivered.
    pub fn stop(&mut self) {
        if matches!(self.backend, Backend::Idle) {
            return;
        }
        self.shutdown_backend();
        self.phase = Phase::Stopped;
        info!("simulation stopped");
    }

    fn shutdown_backend(&mut self) {
        match std::mem::replace(&mut self.backend, Backend::Idle) {
            Backend::Idle => {}
            Backend::Worker(worker) => worker.shutdown(),
            Backend::Inline(_) => debug!("inline simulation dropped"),
        }
    }

    /// Called once per animation frame. Inline runs advance a batch of
    /// ticks here; worker runs only deliver what has arrived.
    pub fn on_frame(&mut self) -> Vec<Event> {
        if let Backend::Inline(runner) = &mut self.backend {
            runner.run_frame();
        }
        self.poll_events()
    }

    /// Events published since the last call, without blocking.
    pub fn poll_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        match &mut self.backend {
            Backend::Idle => {}
            Backend::Inline(runner) => events = runner.drain(),
            Backend::Worker(worker) => loop {
                match worker.try_recv() {
                    Ok(Some(event)) => events.push(event),
                    Ok(None) => break,
                    Err(error) => {
                        events.push(Event::Error {
                            message: error.to_string(),
                        });
                        break;
                    }
                }
            },
        }

        for event in &events {
            self.observe(event);
        }
        events
    }

    /// Waits up to `timeout` for the next event. Inline runs tick on the
    /// calling thread until an event is produced.
    pub fn next_event(&mut self, timeout: Duration) -> Result<Option<Event>, CoordinatorError> {
        let event = match &mut self.backend {
            Backend::Idle => return Err(CoordinatorError::NotStarted),
            Backend::Inline(runner) => runner.next_event(),
            Backend::Worker(worker) => worker.recv_timeout(timeout)?,
        };

        if let Some(event) = &event {
            self.observe(event);
        }
        Ok(event)
    }

    fn observe(&mut self, event: &Event) {
        match event {
            Event::Tick { state, .. } => self.state = Some(*state),
            Event::Ended { reason, state } => {
                self.state = Some(*state);
                if matches!(self.phase, Phase::Running | Phase::Paused) {
                    self.phase = Phase::Converged;
                }
                info!(?reason, iteration = state.iteration, "layout settled");
            }
            Event::Error { message } => warn!(%message, "simulation reported an error"),
        }
    }
}

impl Drop for SimulationCoordinator {
    fn drop(&mut self) {
        self.shutdown_backend();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::thread::JoinHandle;

    struct RefusingSpawner;

    impl WorkerSpawner for RefusingSpawner {
        fn spawn(&self, _name: &str, _job: WorkerJob) -> io::Result<JoinHandle<()>> {
            Err(io::Error::other("threads unavailable"))
        }
    }

    fn graph(count: usize) -> GraphInput {
        GraphInput {
            nodes: (0..count).map(|i| NodeInput::new(format!("n{i}"))).collect(),
            edges: (1..count)
                .map(|i| EdgeInput::new("n0", format!("n{i}")))
                .collect(),
        }
    }

    #[test]
    fn empty_graph_leaves_coordinator_idle() {
        let mut coordinator = SimulationCoordinator::default();
        let result = coordinator.start(GraphInput::default(), SimulationConfig::default());

        assert_eq!(result, Err(CoordinatorError::Graph(GraphError::EmptyGraph)));
        assert_eq!(coordinator.phase(), Phase::Idle);
        assert_eq!(coordinator.pause(), Err(CoordinatorError::NotStarted));
    }

    #[test]
    fn spawn_failure_falls_back_to_inline() {
        let mut coordinator =
            SimulationCoordinator::with_spawner(CoordinatorOptions::default(), Box::new(RefusingSpawner));
        coordinator.start(graph(5), SimulationConfig::default()).unwrap();

        assert!(coordinator.is_inline());
        assert_eq!(coordinator.fallback_reason(), Some("threads unavailable"));

        let events = coordinator.on_frame();
        assert_eq!(events.len(), CoordinatorOptions::default().ticks_per_frame);
        assert_eq!(coordinator.state().map(|state| state.iteration), Some(4));
    }

    #[test]
    fn unknown_pin_is_rejected_up_front() {
        let mut coordinator = SimulationCoordinator::new(CoordinatorOptions {
            force_inline: true,
            ..Default::default()
        });
        coordinator.start(graph(3), SimulationConfig::default()).unwrap();

        assert_eq!(
            coordinator.pin_node("ghost", 0.0, 0.0),
            Err(CoordinatorError::UnknownNode("ghost".into()))
        );
        assert!(coordinator.pin_node("n1", 0.0, 0.0).is_ok());
    }

    fn settle(coordinator: &mut SimulationCoordinator) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = coordinator.next_event(Duration::ZERO).unwrap() {
            events.push(event);
        }
        events
    }

    fn inline_coordinator() -> SimulationCoordinator {
        SimulationCoordinator::new(CoordinatorOptions {
            force_inline: true,
            ..Default::default()
        })
    }

    fn fast() -> SimulationConfig {
        SimulationConfig {
            alpha_decay: 0.2,
            ..Default::default()
        }
    }

    #[test]
    fn reheat_while_paused_waits_for_resume() {
        let mut coordinator = inline_coordinator();
        coordinator.start(graph(4), fast()).unwrap();
        settle(&mut coordinator);
        assert_eq!(coordinator.phase(), Phase::Converged);

        coordinator.pause().unwrap();
        coordinator.reheat(0.5).unwrap();
        assert_eq!(coordinator.phase(), Phase::Paused);
        assert!(coordinator.on_frame().is_empty());

        coordinator.resume().unwrap();
        assert_eq!(coordinator.phase(), Phase::Running);
        assert!(!coordinator.on_frame().is_empty());
        coordinator.pause().unwrap();
        coordinator.restart().unwrap();
        assert_eq!(coordinator.phase(), Phase::Paused);
    }

    #[test]
    fn tiny_reheat_still_ends_the_run() {
        let mut coordinator = inline_coordinator();
        coordinator.start(graph(4), fast()).unwrap();
        settle(&mut coordinator);

        coordinator.reheat(0.0005).unwrap();
        assert_eq!(coordinator.phase(), Phase::Running);
        let events = settle(&mut coordinator);
        assert!(matches!(
            events.last(),
            Some(Event::Ended {
                reason: crate::physics::EndReason::Converged,
                ..
            })
        ));
        assert_eq!(coordinator.phase(), Phase::Converged);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut coordinator = SimulationCoordinator::default();
        coordinator.stop();
        assert_eq!(coordinator.phase(), Phase::Idle);

        coordinator.start(graph(3), SimulationConfig::default()).unwrap();
        coordinator.stop();
        coordinator.stop();
        assert_eq!(coordinator.phase(), Phase::Stopped);
        assert!(coordinator.poll_events().is_empty());
    }
}
