use std::collections::HashMap;
use std::f64::consts::PI;

use glam::DVec2;
use serde::Serialize;
use tracing::{debug, warn};

use crate::util::stable_pair;

use super::{Edge, Graph, GraphInput, Node};

const SEED_RADIUS: f64 = 10.0;
const SEED_JITTER: f64 = 2.0;

/// Counters for input that was repaired or discarded during ingestion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub nodes: usize,
    pub edges: usize,
    pub duplicate_nodes: usize,
    pub dropped_edges: usize,
    pub self_loops: usize,
    pub reseeded_positions: usize,
    pub clamped_weights: usize,
}

/// Phyllotaxis spiral, so unseeded nodes start evenly spread without overlap.
fn seed_position(id: &str, index: usize) -> DVec2 {
    let radius = SEED_RADIUS * (0.5 + index as f64).sqrt();
    let angle = index as f64 * PI * (3.0 - 5.0_f64.sqrt());
    let (jx, jy) = stable_pair(id);
    DVec2::new(radius * angle.cos(), radius * angle.sin()) + DVec2::new(jx, jy) * SEED_JITTER
}

impl Graph {
    pub fn ingest(input: GraphInput) -> Graph {
        Self::ingest_with_prior(input, None)
    }

    pub(super) fn ingest_with_prior(input: GraphInput, prior: Option<&Graph>) -> Graph {
        let mut stats = IngestStats::default();
        let mut index_by_id = HashMap::with_capacity(input.nodes.len());
        let mut category_index: HashMap<String, usize> = HashMap::new();
        let mut categories = Vec::new();
        let mut nodes = Vec::with_capacity(input.nodes.len());

        for raw in input.nodes {
            if index_by_id.contains_key(&raw.id) {
                stats.duplicate_nodes += 1;
                continue;
            }

            let index = nodes.len();
            let previous = prior.and_then(|graph| graph.node(&raw.id));
            let seeded = match (raw.x, raw.y) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some(DVec2::new(x, y)),
                _ => None,
            };
            let position = match (previous, seeded) {
                (Some(node), _) => node.position,
                (None, Some(position)) => position,
                (None, None) => {
                    stats.reseeded_positions += 1;
                    seed_position(&raw.id, index)
                }
            };

            let category = raw.category.map(|name| {
                *category_index.entry(name.clone()).or_insert_with(|| {
                    categories.push(name);
                    categories.len() - 1
                })
            });

            index_by_id.insert(raw.id.clone(), index);
            nodes.push(Node {
                id: raw.id,
                position,
                velocity: previous.map(|node| node.velocity).unwrap_or(DVec2::ZERO),
                fixed_x: previous.and_then(|node| node.fixed_x),
                fixed_y: previous.and_then(|node| node.fixed_y),
                degree: 0,
                mass: 1.0,
                category,
                radial_value: raw.radial_value.filter(|value| value.is_finite()),
            });
        }

        let mut edges = Vec::with_capacity(input.edges.len());
        for raw in input.edges {
            let (Some(&source), Some(&target)) =
                (index_by_id.get(&raw.source), index_by_id.get(&raw.target))
            else {
                stats.dropped_edges += 1;
                continue;
            };

            if source == target {
                stats.self_loops += 1;
                continue;
            }

            let weight = if raw.weight.is_finite() && raw.weight >= 0.0 {
                raw.weight
            } else {
                stats.clamped_weights += 1;
                0.0
            };

            nodes[source].degree += 1;
            nodes[target].degree += 1;
            edges.push(Edge {
                source,
                target,
                weight,
                kind: raw.kind,
            });
        }

        for node in &mut nodes {
            node.mass = 1.0 + node.degree as f64;
        }

        stats.nodes = nodes.len();
        stats.edges = edges.len();
        if stats.dropped_edges > 0 || stats.duplicate_nodes > 0 {
            warn!(
                dropped_edges = stats.dropped_edges,
                duplicate_nodes = stats.duplicate_nodes,
                "discarded malformed graph input"
            );
        }
        debug!(
            nodes = stats.nodes,
            edges = stats.edges,
            self_loops = stats.self_loops,
            reseeded = stats.reseeded_positions,
            "ingested graph"
        );

        Graph {
            nodes,
            edges,
            categories,
            stats,
            index_by_id,
        }
    }
}
