//! Force-directed layout for large track graphs: an arena quadtree, a
//! Barnes-Hut simulation driven from a worker thread, and the viewport
//! culling and level-of-detail decisions a renderer needs each frame.

pub mod coordinator;
pub mod error;
pub mod graph;
pub mod logging;
pub mod physics;
pub mod scene;
pub mod spatial;
pub mod util;
pub mod view;

pub use coordinator::{Command, CoordinatorOptions, Event, Phase, SimulationCoordinator};
pub use error::{CoordinatorError, GraphError};
pub use graph::{EdgeInput, EdgeKind, Graph, GraphInput, IngestStats, NodeInput};
pub use physics::{
    ConfigPatch, EndReason, ForceSimulation, NodePosition, SimulationConfig, SimulationState,
};
pub use scene::{FramePlan, FrameScene, SceneConfig};
pub use spatial::{Entry, Quadtree, Rect};
pub use view::{CullConfig, FrustumCuller, LodConfig, LodPolicy, LodTier, Viewport, VisibilityStats};
