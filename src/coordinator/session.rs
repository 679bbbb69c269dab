use tracing::{debug, warn};

use crate::physics::ForceSimulation;

use super::protocol::{Command, Event};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

/// Command handling and tick emission shared by the worker thread and the
/// inline runner.
pub(crate) struct Session {
    simulation: Option<ForceSimulation>,
    paused: bool,
    snapshot_every: usize,
    since_snapshot: usize,
}

impl Session {
    pub(crate) fn new(snapshot_every: usize) -> Self {
        Self {
            simulation: None,
            paused: false,
            snapshot_every: snapshot_every.max(1),
            since_snapshot: 0,
        }
    }

    /// Whether `step` would advance the layout.
    pub(crate) fn is_active(&self) -> bool {
        !self.paused
            && self
                .simulation
                .as_ref()
                .is_some_and(ForceSimulation::is_running)
    }

    pub(crate) fn handle(&mut self, command: Command, emit: &mut impl FnMut(Event)) -> Flow {
        debug!(command = command.name(), "handling command");

        let command = match command {
            Command::Init { graph, config } => {
                match ForceSimulation::from_input(graph, config) {
                    Ok(simulation) => {
                        self.simulation = Some(simulation);
                        self.paused = false;
                        self.since_snapshot = 0;
                    }
                    Err(error) => emit(Event::Error {
                        message: error.to_string(),
                    }),
                }
                return Flow::Continue;
            }
            Command::Stop => return Flow::Stop,
            Command::Pause => {
                self.paused = true;
                return Flow::Continue;
            }
            Command::Resume => {
                self.paused = false;
                return Flow::Continue;
            }
            other => other,
        };

        let Some(simulation) = self.simulation.as_mut() else {
            emit(Event::Error {
                message: format!("{} received before init", command.name()),
            });
            return Flow::Continue;
        };

        match command {
            Command::Update { nodes, edges } => {
                if let Err(error) = simulation.update(nodes, edges) {
                    warn!(%error, "update rejected");
                    emit(Event::Error {
                        message: error.to_string(),
                    });
                }
            }
            Command::Configure { patch } => simulation.configure(&patch),
            Command::Reheat { alpha } => simulation.reheat(alpha),
            Command::Restart => simulation.restart(),
            Command::PinNode { id, x, y } => {
                if simulation.pin(&id, x, y) {
                    if !self.paused && !simulation.is_running() {
                        // Settled layouts emit nothing on their own.
                        emit(Self::snapshot(simulation));
                    }
                } else {
                    emit(Event::Error {
                        message: format!("cannot pin node {id}"),
                    });
                }
            }
            Command::UnpinNode { id } => {
                if !simulation.unpin(&id) {
                    emit(Event::Error {
                        message: format!("unknown node id: {id}"),
                    });
                }
            }
            Command::Init { .. } | Command::Stop | Command::Pause | Command::Resume => {}
        }
        Flow::Continue
    }

    /// One tick. Every `snapshot_every`-th tick is published, and the tick
    /// that ends the run always is, followed by `Ended`.
    pub(crate) fn step(&mut self, emit: &mut impl FnMut(Event)) {
        if !self.is_active() {
            return;
        }
        let Some(simulation) = self.simulation.as_mut() else {
            return;
        };

        let reason = simulation.tick();
        self.since_snapshot += 1;
        if reason.is_some() || self.since_snapshot >= self.snapshot_every {
            self.since_snapshot = 0;
            emit(Self::snapshot(simulation));
        }
        if let Some(reason) = reason {
            emit(Event::Ended {
                reason,
                state: simulation.state(),
            });
        }
    }

    fn snapshot(simulation: &ForceSimulation) -> Event {
        Event::Tick {
            positions: simulation.positions(),
            state: simulation.state(),
        }
    }
}
