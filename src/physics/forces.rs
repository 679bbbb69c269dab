use glam::DVec2;

use crate::graph::{Edge, Node};
use crate::spatial::{CellId, Quadtree};
use crate::util::spread_direction;

use super::{RadialConfig, SimulationConfig};

const COINCIDENT_DISTANCE_SQ: f64 = 1e-12;
const LINK_WEIGHT_FLOOR: f64 = 0.25;
const LINK_DISTANCE_FLOOR: f64 = 1e-6;

fn separating_direction(from: usize, to: usize) -> DVec2 {
    let (x, y) = spread_direction(from, to);
    DVec2::new(x, y)
}

#[derive(Clone, Copy, Debug)]
pub(super) struct RepulsionParams {
    pub(super) charge: f64,
    pub(super) theta: f64,
    pub(super) distance_min: f64,
    pub(super) distance_max_sq: f64,
}

impl RepulsionParams {
    pub(super) fn new(config: &SimulationConfig, theta: f64) -> Self {
        Self {
            charge: config.charge,
            theta,
            distance_min: config.distance_min,
            distance_max_sq: config
                .distance_max
                .map(|distance| distance * distance)
                .unwrap_or(f64::INFINITY),
        }
    }
}

/// Force on a body at `point` from a body (or pseudo-body) of `mass` at `other`.
fn repulsion_between(
    point: DVec2,
    other: DVec2,
    mass: f64,
    params: RepulsionParams,
    seed: (usize, usize),
) -> DVec2 {
    let mut delta = point - other;
    let mut distance_sq = delta.length_squared();
    if distance_sq > params.distance_max_sq {
        return DVec2::ZERO;
    }
    if distance_sq < COINCIDENT_DISTANCE_SQ {
        delta = separating_direction(seed.0, seed.1) * params.distance_min;
        distance_sq = delta.length_squared();
    }

    let distance_sq = distance_sq.max(params.distance_min * params.distance_min);
    delta * (-params.charge * mass / distance_sq)
}

/// Barnes-Hut traversal for the body stored under `key`.
pub(super) fn accumulate_repulsion(
    tree: &Quadtree,
    cell_id: CellId,
    key: usize,
    point: DVec2,
    params: RepulsionParams,
    force: &mut DVec2,
) {
    let cell = tree.cell(cell_id);
    if cell.count() == 0 {
        return;
    }

    let Some(children) = cell.children() else {
        for entry in cell.entries() {
            if entry.key == key {
                continue;
            }
            *force += repulsion_between(point, entry.position, entry.mass, params, (key, entry.key));
        }
        return;
    };

    let center_of_mass = cell.center_of_mass();
    let distance = point.distance(center_of_mass);
    let can_approximate = !cell.bounds.contains(point)
        && distance > 0.0
        && (cell.bounds.width() / distance) < params.theta;

    if can_approximate {
        *force += repulsion_between(point, center_of_mass, cell.mass(), params, (key, key));
        return;
    }

    for child in children {
        accumulate_repulsion(tree, child, key, point, params, force);
    }
}

/// Reference O(n²) repulsion used to validate the approximation.
pub(super) fn pairwise_repulsion(nodes: &[Node], params: RepulsionParams) -> Vec<DVec2> {
    let mut forces = vec![DVec2::ZERO; nodes.len()];
    for i in 0..nodes.len() {
        for j in (i + 1)..nodes.len() {
            forces[i] += repulsion_between(
                nodes[i].position,
                nodes[j].position,
                nodes[j].mass,
                params,
                (i, j),
            );
            forces[j] += repulsion_between(
                nodes[j].position,
                nodes[i].position,
                nodes[i].mass,
                params,
                (j, i),
            );
        }
    }
    forces
}

pub(super) fn accumulate_collisions(
    tree: &Quadtree,
    nodes: &[Node],
    radii: &[f64],
    strength: f64,
    forces: &mut [DVec2],
) {
    if strength <= 0.0 {
        return;
    }
    let max_radius = radii.iter().copied().fold(0.0_f64, f64::max);
    if max_radius <= 0.0 {
        return;
    }

    for (from, node) in nodes.iter().enumerate() {
        let reach = radii[from] + max_radius;
        tree.for_each_in_circle(node.position, reach, |entry| {
            let to = entry.key;
            if to <= from || to >= nodes.len() {
                return;
            }

            let min_distance = radii[from] + radii[to];
            let mut delta = node.position - nodes[to].position;
            let mut distance = delta.length();
            if distance >= min_distance {
                return;
            }
            if distance * distance < COINCIDENT_DISTANCE_SQ {
                delta = separating_direction(from, to);
                distance = 1.0;
            }

            let overlap_push = (min_distance - distance) / distance * strength;
            let total_mass = node.mass + nodes[to].mass;
            let share_from = nodes[to].mass / total_mass;
            forces[from] += delta * overlap_push * share_from;
            forces[to] -= delta * overlap_push * (1.0 - share_from);
        });
    }
}

pub(super) fn rest_length(config: &SimulationConfig, edge: &Edge) -> f64 {
    config.link_distance * edge.kind.distance_scale() / edge.weight.max(LINK_WEIGHT_FLOOR)
}

pub(super) fn accumulate_links(
    nodes: &[Node],
    edges: &[Edge],
    config: &SimulationConfig,
    forces: &mut [DVec2],
) {
    for edge in edges {
        let (source, target) = (&nodes[edge.source], &nodes[edge.target]);
        let delta = target.position - source.position;
        let distance = delta.length().max(LINK_DISTANCE_FLOOR);

        let stiffness = config.link_strength * edge.kind.strength_scale()
            / source.degree.min(target.degree).max(1) as f64;
        let stretch = (distance - rest_length(config, edge)) / distance * stiffness;
        let correction = delta * stretch;

        let share_source = target.mass / (source.mass + target.mass);
        forces[edge.source] += correction * share_source;
        forces[edge.target] -= correction * (1.0 - share_source);
    }
}

pub(super) fn accumulate_centering(nodes: &[Node], config: &SimulationConfig, forces: &mut [DVec2]) {
    if config.center_strength == 0.0 {
        return;
    }
    let center = DVec2::new(config.center_x, config.center_y);
    for (force, node) in forces.iter_mut().zip(nodes) {
        *force += (center - node.position) * config.center_strength;
    }
}

pub(super) fn accumulate_radial(
    nodes: &[Node],
    radial: &RadialConfig,
    center: DVec2,
    forces: &mut [DVec2],
) {
    let (min, max) = nodes
        .iter()
        .filter_map(|node| node.radial_value)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), value| {
            (min.min(value), max.max(value))
        });
    if !min.is_finite() {
        return;
    }

    let span = max - min;
    for (index, (force, node)) in forces.iter_mut().zip(nodes).enumerate() {
        let Some(value) = node.radial_value else {
            continue;
        };
        let t = if span > 0.0 { (value - min) / span } else { 0.5 };
        let target_radius = radial.inner_radius + t * (radial.outer_radius - radial.inner_radius);

        let offset = node.position - center;
        let radius = offset.length();
        let direction = if radius > 1e-6 {
            offset / radius
        } else {
            separating_direction(index, index)
        };
        *force += direction * (target_radius - radius) * radial.strength;
    }
}

pub(super) fn accumulate_clusters(
    nodes: &[Node],
    category_count: usize,
    strength: f64,
    forces: &mut [DVec2],
) {
    if strength == 0.0 || category_count == 0 {
        return;
    }

    let mut sums = vec![(DVec2::ZERO, 0usize); category_count];
    for node in nodes {
        if let Some(category) = node.category
            && let Some(slot) = sums.get_mut(category)
        {
            slot.0 += node.position;
            slot.1 += 1;
        }
    }

    for (force, node) in forces.iter_mut().zip(nodes) {
        let Some(&(sum, count)) = node.category.and_then(|category| sums.get(category)) else {
            continue;
        };
        if count < 2 {
            continue;
        }
        let centroid = sum / count as f64;
        *force += (centroid - node.position) * strength;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeKind, Graph, GraphInput, NodeInput};
    use crate::spatial::Entry;

    fn params(theta: f64) -> RepulsionParams {
        RepulsionParams::new(&SimulationConfig::default(), theta)
    }

    #[test]
    fn coincident_bodies_get_a_finite_push() {
        let force = repulsion_between(DVec2::ZERO, DVec2::ZERO, 1.0, params(0.8), (3, 4));
        assert!(force.is_finite());
        assert!(force.length() > 0.0);
    }

    #[test]
    fn repulsion_points_away_from_the_other_body() {
        let force = repulsion_between(DVec2::new(10.0, 0.0), DVec2::ZERO, 1.0, params(0.8), (0, 1));
        assert!(force.x > 0.0);
        assert_eq!(force.y, 0.0);
    }

    #[test]
    fn distance_max_cuts_off_far_bodies() {
        let mut config = SimulationConfig::default();
        config.distance_max = Some(50.0);
        let params = RepulsionParams::new(&config, 0.8);
        assert_eq!(
            repulsion_between(DVec2::new(100.0, 0.0), DVec2::ZERO, 1.0, params, (0, 1)),
            DVec2::ZERO
        );
    }

    #[test]
    fn zero_theta_tree_matches_pairwise() {
        let graph = Graph::ingest(GraphInput {
            nodes: (0..12).map(|i| NodeInput::new(format!("n{i}"))).collect(),
            edges: Vec::new(),
        });
        let entries = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(key, node)| Entry::new(key, node.position, node.mass))
            .collect::<Vec<_>>();
        let tree = Quadtree::fitted(&entries, 1, 16);

        let exact = pairwise_repulsion(&graph.nodes, params(0.0));
        for (key, node) in graph.nodes.iter().enumerate() {
            let mut force = DVec2::ZERO;
            accumulate_repulsion(&tree, CellId::ROOT, key, node.position, params(0.0), &mut force);
            assert!((force - exact[key]).length() < 1e-9, "node {key}");
        }
    }

    #[test]
    fn proven_transitions_rest_shorter_than_suggestions() {
        let config = SimulationConfig::default();
        let proven = Edge {
            source: 0,
            target: 1,
            weight: 1.0,
            kind: EdgeKind::ProvenTransition,
        };
        let suggestion = Edge {
            kind: EdgeKind::HarmonicSuggestion,
            ..proven
        };
        let heavy = Edge {
            weight: 4.0,
            ..proven
        };
        let weightless = Edge {
            weight: 0.0,
            ..proven
        };

        assert!(rest_length(&config, &proven) < rest_length(&config, &suggestion));
        assert!(rest_length(&config, &heavy) < rest_length(&config, &proven));
        assert!(rest_length(&config, &weightless).is_finite());
    }
}
