//! Per-frame pipeline feeding the draw layer.
//!
//! A snapshot from the simulation is loaded into a fresh quadtree; `plan`
//! then culls against the viewport, assigns LOD tiers and thins edges.

use std::collections::HashMap;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::graph::{EdgeKind, Graph};
use crate::physics::NodePosition;
use crate::spatial::{DEFAULT_CAPACITY, DEFAULT_MAX_DEPTH, Entry, Quadtree};
use crate::view::{CullConfig, FrustumCuller, LodConfig, LodPolicy, LodTier, Viewport, VisibilityStats};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub cull: CullConfig,
    pub lod: LodConfig,
    pub base_radius: f64,
    pub mass_radius: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            cull: CullConfig::default(),
            lod: LodConfig::default(),
            base_radius: 6.0,
            mass_radius: 2.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VisibleNode {
    pub index: usize,
    pub id: String,
    pub tier: LodTier,
    pub screen_x: f64,
    pub screen_y: f64,
    pub screen_radius: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct VisibleEdge {
    pub source: usize,
    pub target: usize,
    pub kind: EdgeKind,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FramePlan {
    pub nodes: Vec<VisibleNode>,
    pub edges: Vec<VisibleEdge>,
    pub stats: VisibilityStats,
    /// In view but below the smallest drawable size.
    pub lod_culled: usize,
    pub edge_stride: usize,
}

#[derive(Clone, Copy, Debug)]
struct SceneEdge {
    source: usize,
    target: usize,
    kind: EdgeKind,
}

pub struct FrameScene {
    config: SceneConfig,
    policy: LodPolicy,
    tree: Quadtree,
    ids: Vec<String>,
    index_by_id: HashMap<String, usize>,
    positions: Vec<DVec2>,
    radii: Vec<f64>,
    edges: Vec<SceneEdge>,
    entries: Vec<Entry>,
}

impl FrameScene {
    pub fn new(config: SceneConfig) -> Self {
        Self {
            config,
            policy: LodPolicy::new(config.lod),
            tree: Quadtree::default(),
            ids: Vec::new(),
            index_by_id: HashMap::new(),
            positions: Vec::new(),
            radii: Vec::new(),
            edges: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn from_graph(graph: &Graph, config: SceneConfig) -> Self {
        let mut scene = Self::new(config);
        scene.load(graph);
        scene
    }

    /// Takes topology, sizes and current positions from `graph`.
    pub fn load(&mut self, graph: &Graph) {
        self.ids = graph.nodes.iter().map(|node| node.id.clone()).collect();
        self.index_by_id = self
            .ids
            .iter()
            .enumerate()
            .map(|(index, id)| (id.clone(), index))
            .collect();
        self.positions = graph.nodes.iter().map(|node| node.position).collect();
        self.radii = graph
            .nodes
            .iter()
            .map(|node| self.config.base_radius + self.config.mass_radius * node.mass.max(0.0).sqrt())
            .collect();
        self.edges = graph
            .edges
            .iter()
            .map(|edge| SceneEdge {
                source: edge.source,
                target: edge.target,
                kind: edge.kind,
            })
            .collect();
        self.rebuild_index();
    }

    /// Moves nodes to the snapshot positions. Unknown ids are ignored.
    pub fn apply_snapshot(&mut self, positions: &[NodePosition]) -> usize {
        let mut applied = 0;
        for position in positions {
            let Some(&index) = self.index_by_id.get(&position.id) else {
                continue;
            };
            self.positions[index] = DVec2::new(position.x, position.y);
            applied += 1;
        }
        self.rebuild_index();
        applied
    }

    fn rebuild_index(&mut self) {
        self.entries.clear();
        self.entries.extend(
            self.positions
                .iter()
                .enumerate()
                .map(|(key, &position)| Entry::new(key, position, 1.0)),
        );
        if self.tree.capacity() != DEFAULT_CAPACITY || self.tree.max_depth() != DEFAULT_MAX_DEPTH {
            self.tree = Quadtree::new(self.tree.boundary(), DEFAULT_CAPACITY, DEFAULT_MAX_DEPTH);
        }
        self.tree.rebuild_fitted(&self.entries);
    }

    pub fn quadtree(&self) -> &Quadtree {
        &self.tree
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn plan(&self, viewport: &Viewport) -> FramePlan {
        let mut culler = FrustumCuller::new(*viewport, self.config.cull);
        let zoom = viewport.zoom;
        let node_count = self.ids.len();

        let mut lod_culled = 0;
        let mut nodes = Vec::new();
        for entry in culler.visible_nodes(&self.tree) {
            let screen_radius = self.radii[entry.key] * zoom;
            let tier = self.policy.tier(zoom, screen_radius * 2.0, node_count);
            if !tier.is_drawn() {
                lod_culled += 1;
                continue;
            }

            let screen = viewport.world_to_screen(entry.position);
            nodes.push(VisibleNode {
                index: entry.key,
                id: self.ids[entry.key].clone(),
                tier,
                screen_x: screen.x,
                screen_y: screen.y,
                screen_radius,
            });
        }
        nodes.sort_unstable_by_key(|node| node.index);

        let edge_stride = self.policy.edge_stride(zoom);
        let edges = self
            .edges
            .iter()
            .filter(|edge| self.policy.keeps_edge(edge.source, edge.target, edge_stride))
            .filter(|edge| {
                culler.is_edge_visible(self.positions[edge.source], self.positions[edge.target])
            })
            .map(|edge| VisibleEdge {
                source: edge.source,
                target: edge.target,
                kind: edge.kind,
            })
            .collect::<Vec<_>>();
        culler.record_edges(self.edges.len(), edges.len());

        let stats = culler.visibility_stats();
        trace!(%stats, lod_culled, "frame planned");
        FramePlan {
            nodes,
            edges,
            stats,
            lod_culled,
            edge_stride,
        }
    }

    /// Id of the node drawn under `screen`, if any.
    pub fn node_at(&self, viewport: &Viewport, screen: DVec2) -> Option<&str> {
        if !viewport.is_valid() || !screen.is_finite() {
            return None;
        }

        let world = viewport.screen_to_world(screen);
        let reach = self.radii.iter().copied().fold(0.0_f64, f64::max);
        // The nearest centre can miss while a larger neighbour's disc covers
        // the cursor, so every disc in reach is checked.
        let mut hit: Option<(f64, usize)> = None;
        self.tree.for_each_in_circle(world, reach, |entry| {
            let distance = entry.position.distance(world);
            if distance > self.radii[entry.key] {
                return;
            }
            if hit.is_none_or(|(best, key)| distance < best || (distance == best && entry.key < key)) {
                hit = Some((distance, entry.key));
            }
        });
        hit.map(|(_, key)| self.ids[key].as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeInput, GraphInput, NodeInput};

    fn graph() -> Graph {
        Graph::ingest(GraphInput {
            nodes: vec![
                NodeInput::new("center").at(0.0, 0.0),
                NodeInput::new("near").at(120.0, 40.0),
                NodeInput::new("west").at(-5000.0, 0.0),
                NodeInput::new("east").at(5000.0, 0.0),
            ],
            edges: vec![
                EdgeInput::new("center", "near"),
                EdgeInput::new("west", "east"),
                EdgeInput::new("west", "center"),
            ],
        })
    }

    #[test]
    fn plan_keeps_only_nodes_in_view() {
        let scene = FrameScene::from_graph(&graph(), SceneConfig::default());
        let plan = scene.plan(&Viewport::new(800.0, 600.0));

        let ids = plan.nodes.iter().map(|node| node.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["center", "near"]);
        assert_eq!(plan.edges.len(), 3);
        assert_eq!(plan.stats.total_nodes, 4);
        assert_eq!(plan.stats.culled_nodes, 2);
    }

    #[test]
    fn snapshot_moves_nodes() {
        let mut scene = FrameScene::from_graph(&graph(), SceneConfig::default());
        let applied = scene.apply_snapshot(&[
            NodePosition {
                id: "west".into(),
                x: 10.0,
                y: 10.0,
                vx: 0.0,
                vy: 0.0,
            },
            NodePosition {
                id: "ghost".into(),
                x: 0.0,
                y: 0.0,
                vx: 0.0,
                vy: 0.0,
            },
        ]);

        assert_eq!(applied, 1);
        let plan = scene.plan(&Viewport::new(800.0, 600.0));
        assert!(plan.nodes.iter().any(|node| node.id == "west"));
    }

    #[test]
    fn hit_test_finds_node_under_cursor() {
        let scene = FrameScene::from_graph(&graph(), SceneConfig::default());
        let viewport = Viewport::new(800.0, 600.0);

        assert_eq!(scene.node_at(&viewport, DVec2::new(402.0, 301.0)), Some("center"));
        assert_eq!(scene.node_at(&viewport, DVec2::new(460.0, 200.0)), None);
    }

    #[test]
    fn hit_test_prefers_the_disc_under_the_cursor() {
        let mut nodes = vec![NodeInput::new("hub").at(0.0, 0.0), NodeInput::new("leaf").at(20.0, 0.0)];
        let mut edges = vec![EdgeInput::new("hub", "leaf")];
        for i in 0..9 {
            let id = format!("spoke{i}");
            nodes.push(NodeInput::new(id.clone()).at(-400.0 + i as f64 * 100.0, 500.0));
            edges.push(EdgeInput::new("hub", id));
        }
        let scene = FrameScene::from_graph(
            &Graph::ingest(GraphInput { nodes, edges }),
            SceneConfig::default(),
        );
        let viewport = Viewport::new(800.0, 600.0);

        // Closer to the leaf's centre, but only inside the hub's larger disc.
        assert_eq!(scene.node_at(&viewport, DVec2::new(410.5, 300.0)), Some("hub"));
        assert_eq!(scene.node_at(&viewport, DVec2::new(422.0, 300.0)), Some("leaf"));
    }

    #[test]
    fn far_zoom_shrinks_detail() {
        let scene = FrameScene::from_graph(&graph(), SceneConfig::default());
        let close = scene.plan(&Viewport::new(800.0, 600.0).with_zoom(2.0));
        let far = scene.plan(&Viewport::new(800.0, 600.0).with_zoom(0.1));

        assert!(close.nodes.iter().all(|node| node.tier == LodTier::Full));
        assert_eq!(far.edge_stride, 3);
        assert!(far.nodes.iter().all(|node| node.tier == LodTier::Low));
    }
}
