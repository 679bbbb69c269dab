//! Barnes-Hut force layout.
//!
//! One `tick` rebuilds the quadtree from current positions, accumulates every
//! force term into a scratch buffer, integrates velocities under the current
//! alpha and cools alpha by one step.

mod config;
mod forces;
mod state;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::error::GraphError;
use crate::graph::{EdgeInput, Graph, GraphInput, NodeInput};
use crate::spatial::{CellId, Entry, Quadtree, Rect};

pub use config::{
    ConfigPatch, DEFAULT_ALPHA_DECAY_TICKS, DEFAULT_ALPHA_MIN, DEFAULT_MAX_ITERATIONS, DEFAULT_THETA,
    DEFAULT_VELOCITY_DECAY, RadialConfig, SimulationConfig,
};
pub use state::{EndReason, SimulationState};

use forces::{
    RepulsionParams, accumulate_centering, accumulate_clusters, accumulate_collisions,
    accumulate_links, accumulate_radial, accumulate_repulsion, pairwise_repulsion,
};

/// Alpha floor applied when the node or edge set changes mid-run.
pub const UPDATE_REHEAT_ALPHA: f64 = 0.3;

/// One node in a position snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodePosition {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

#[derive(Default)]
struct Scratch {
    entries: Vec<Entry>,
    forces: Vec<DVec2>,
    radii: Vec<f64>,
}

pub struct ForceSimulation {
    graph: Graph,
    config: SimulationConfig,
    state: SimulationState,
    tree: Quadtree,
    scratch: Scratch,
}

impl ForceSimulation {
    pub fn new(graph: Graph, mut config: SimulationConfig) -> Result<Self, GraphError> {
        if graph.is_empty() {
            return Err(GraphError::EmptyGraph);
        }
        config.sanitize();

        let state = SimulationState::new(&config);
        let tree = Quadtree::new(
            Rect::new(DVec2::ZERO, 1.0, 1.0),
            config.quadtree_capacity,
            config.quadtree_max_depth,
        );
        info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            theta = config.theta,
            "simulation started"
        );

        Ok(Self {
            graph,
            config,
            state,
            tree,
            scratch: Scratch::default(),
        })
    }

    pub fn from_input(input: GraphInput, config: SimulationConfig) -> Result<Self, GraphError> {
        Self::new(Graph::ingest(input), config)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    /// The tree built by the most recent tick.
    pub fn quadtree(&self) -> &Quadtree {
        &self.tree
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    /// Advances one tick. Returns the end reason on the tick that ends the run.
    pub fn tick(&mut self) -> Option<EndReason> {
        self.rebuild_tree();

        let node_count = self.graph.nodes.len();
        let scratch = &mut self.scratch;
        scratch.forces.clear();
        scratch.forces.resize(node_count, DVec2::ZERO);
        scratch.radii.clear();
        scratch.radii.extend(
            self.graph
                .nodes
                .iter()
                .map(|node| self.config.collision_radius(node.mass)),
        );

        let nodes = &self.graph.nodes;
        let forces = &mut scratch.forces;
        let params = RepulsionParams::new(&self.config, self.config.theta);
        for (key, (force, node)) in forces.iter_mut().zip(nodes).enumerate() {
            let mut repulsion = DVec2::ZERO;
            accumulate_repulsion(&self.tree, CellId::ROOT, key, node.position, params, &mut repulsion);
            // Heavier hubs give way less.
            *force += repulsion / node.mass.max(1.0);
        }
        accumulate_collisions(
            &self.tree,
            nodes,
            &scratch.radii,
            self.config.collision_strength,
            forces,
        );
        accumulate_links(nodes, &self.graph.edges, &self.config, forces);
        accumulate_centering(nodes, &self.config, forces);
        if let Some(radial) = &self.config.radial {
            let center = DVec2::new(self.config.center_x, self.config.center_y);
            accumulate_radial(nodes, radial, center, forces);
        }
        accumulate_clusters(
            nodes,
            self.graph.categories.len(),
            self.config.cluster_strength,
            forces,
        );

        let unstable = self.integrate();
        if unstable > 0 {
            debug!(unstable, iteration = self.state.iteration, "discarded non-finite motion");
        }

        let reason = self.state.cool(self.config.max_iterations);
        trace!(iteration = self.state.iteration, alpha = self.state.alpha, "tick");
        if let Some(reason) = reason {
            info!(
                ?reason,
                iteration = self.state.iteration,
                alpha = self.state.alpha,
                "simulation ended"
            );
        }
        reason
    }

    /// Ticks until the run ends.
    pub fn run_to_end(&mut self) -> EndReason {
        loop {
            if let Some(reason) = self.tick() {
                return reason;
            }
        }
    }

    fn integrate(&mut self) -> usize {
        let alpha = self.state.alpha;
        let retain = 1.0 - self.state.velocity_decay;
        let mut unstable = 0;

        for (node, force) in self.graph.nodes.iter_mut().zip(&self.scratch.forces) {
            let mut velocity = (node.velocity + *force * alpha) * retain;
            let mut next = node.position + velocity;
            if !velocity.is_finite() || !next.is_finite() {
                unstable += 1;
                velocity = DVec2::ZERO;
                next = node.position;
            }

            if let Some(x) = node.fixed_x {
                next.x = x;
                velocity.x = 0.0;
            }
            if let Some(y) = node.fixed_y {
                next.y = y;
                velocity.y = 0.0;
            }

            node.position = next;
            node.velocity = velocity;
        }

        unstable
    }

    fn rebuild_tree(&mut self) {
        if self.tree.capacity() != self.config.quadtree_capacity
            || self.tree.max_depth() != self.config.quadtree_max_depth
        {
            self.tree = Quadtree::new(
                self.tree.boundary(),
                self.config.quadtree_capacity,
                self.config.quadtree_max_depth,
            );
        }

        self.scratch.entries.clear();
        self.scratch.entries.extend(
            self.graph
                .nodes
                .iter()
                .enumerate()
                .map(|(key, node)| Entry::new(key, node.position, node.mass)),
        );
        self.tree.rebuild_fitted(&self.scratch.entries);
    }

    pub fn positions(&self) -> Vec<NodePosition> {
        self.graph
            .nodes
            .iter()
            .map(|node| NodePosition {
                id: node.id.clone(),
                x: node.position.x,
                y: node.position.y,
                vx: node.velocity.x,
                vy: node.velocity.y,
            })
            .collect()
    }

    /// Fixes both axes of `id` at `(x, y)`. Returns false for unknown ids.
    pub fn pin(&mut self, id: &str, x: f64, y: f64) -> bool {
        let Some(node) = self.graph.node_mut(id) else {
            return false;
        };
        if !x.is_finite() || !y.is_finite() {
            return false;
        }

        node.fixed_x = Some(x);
        node.fixed_y = Some(y);
        node.position = DVec2::new(x, y);
        node.velocity = DVec2::ZERO;
        true
    }

    pub fn unpin(&mut self, id: &str) -> bool {
        let Some(node) = self.graph.node_mut(id) else {
            return false;
        };
        node.fixed_x = None;
        node.fixed_y = None;
        true
    }

    pub fn reheat(&mut self, alpha: f64) {
        self.state.reheat(alpha);
        debug!(alpha = self.state.alpha, "reheated");
    }

    /// Resets alpha and the iteration count; positions are kept.
    pub fn restart(&mut self) {
        self.state.restart();
        debug!("restarted");
    }

    pub fn configure(&mut self, patch: &ConfigPatch) {
        self.config.apply(patch);
        self.state.sync_config(&self.config);
        debug!(?patch, "configuration merged");
    }

    /// Replaces the node set and/or edge set, keeping state of surviving nodes.
    /// An empty resulting node set is rejected and the current graph kept.
    pub fn update(
        &mut self,
        nodes: Option<Vec<NodeInput>>,
        edges: Option<Vec<EdgeInput>>,
    ) -> Result<(), GraphError> {
        let next = self.graph.updated(nodes, edges);
        if next.is_empty() {
            return Err(GraphError::EmptyGraph);
        }

        debug!(nodes = next.nodes.len(), edges = next.edges.len(), "graph updated");
        self.graph = next;
        self.state.reheat(UPDATE_REHEAT_ALPHA);
        Ok(())
    }

    /// Many-body repulsion on every node at the current positions, computed
    /// with the given opening threshold.
    pub fn repulsion_field(&mut self, theta: f64) -> Vec<DVec2> {
        self.rebuild_tree();
        let params = RepulsionParams::new(&self.config, theta.max(0.0));
        self.graph
            .nodes
            .iter()
            .enumerate()
            .map(|(key, node)| {
                let mut force = DVec2::ZERO;
                accumulate_repulsion(&self.tree, CellId::ROOT, key, node.position, params, &mut force);
                force
            })
            .collect()
    }

    /// Pairwise many-body repulsion, O(n²).
    pub fn exact_repulsion_field(&self) -> Vec<DVec2> {
        pairwise_repulsion(&self.graph.nodes, RepulsionParams::new(&self.config, 0.0))
    }
}
