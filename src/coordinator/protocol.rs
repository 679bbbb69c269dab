use serde::{Deserialize, Serialize};

use crate::graph::{EdgeInput, GraphInput, NodeInput};
use crate::physics::{ConfigPatch, EndReason, NodePosition, SimulationConfig, SimulationState};

/// Messages into the execution context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Init {
        graph: GraphInput,
        #[serde(default)]
        config: SimulationConfig,
    },
    Update {
        #[serde(default)]
        nodes: Option<Vec<NodeInput>>,
        #[serde(default)]
        edges: Option<Vec<EdgeInput>>,
    },
    Configure {
        patch: ConfigPatch,
    },
    Pause,
    Resume,
    Stop,
    Reheat {
        alpha: f64,
    },
    Restart,
    PinNode {
        id: String,
        x: f64,
        y: f64,
    },
    UnpinNode {
        id: String,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Update { .. } => "update",
            Self::Configure { .. } => "configure",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Reheat { .. } => "reheat",
            Self::Restart => "restart",
            Self::PinNode { .. } => "pin_node",
            Self::UnpinNode { .. } => "unpin_node",
        }
    }
}

/// Messages out of the execution context, in tick order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Tick {
        positions: Vec<NodePosition>,
        state: SimulationState,
    },
    Ended {
        reason: EndReason,
        state: SimulationState,
    },
    Error {
        message: String,
    },
}
