use std::f64::consts::TAU;

use glam::DVec2;
use trackgraph::util::stable_pair;
use trackgraph::{
    EdgeInput, EndReason, ForceSimulation, GraphInput, NodeInput, SimulationConfig,
};

fn scattered_graph(count: usize, spread: f64) -> GraphInput {
    scattered_graph_seeded(count, spread, "track")
}

fn scattered_graph_seeded(count: usize, spread: f64, prefix: &str) -> GraphInput {
    let id = |i: usize| format!("{prefix}-{i}");
    GraphInput {
        nodes: (0..count)
            .map(|i| {
                let (x, y) = stable_pair(&id(i));
                NodeInput::new(id(i)).at(x * spread, y * spread)
            })
            .collect(),
        edges: (1..count)
            .filter(|i| i % 3 != 0)
            .map(|i| EdgeInput::new(id(i / 2), id(i)))
            .collect(),
    }
}

fn relative_error(approx: &[DVec2], exact: &[DVec2]) -> f64 {
    let error: f64 = approx.iter().zip(exact).map(|(a, e)| (*a - *e).length()).sum();
    let scale: f64 = exact.iter().map(|e| e.length()).sum();
    error / scale
}

/// Mean relative error over several 20-node layouts, so single unlucky
/// cancellations do not decide the trend.
#[test]
fn barnes_hut_error_shrinks_with_theta() {
    let thetas = [1.0, 0.7, 0.4, 0.1];
    let mut errors = vec![0.0; thetas.len()];
    let layouts = ["alpha", "bravo", "charlie", "delta", "echo"];

    for prefix in layouts {
        let config = SimulationConfig {
            quadtree_capacity: 1,
            ..Default::default()
        };
        let mut simulation =
            ForceSimulation::from_input(scattered_graph_seeded(20, 200.0, prefix), config).unwrap();
        let exact = simulation.exact_repulsion_field();

        for (slot, &theta) in errors.iter_mut().zip(&thetas) {
            *slot += relative_error(&simulation.repulsion_field(theta), &exact) / layouts.len() as f64;
        }
        assert!(relative_error(&simulation.repulsion_field(0.0), &exact) < 1e-9);
    }

    for pair in errors.windows(2) {
        assert!(pair[1] <= pair[0] * 1.1 + 1e-9, "{errors:?}");
    }
    assert!(errors[0] > errors[3], "{errors:?}");
    assert!(errors[3] < 0.01, "{errors:?}");
}

#[test]
fn default_decay_converges_on_a_large_graph() {
    let mut simulation =
        ForceSimulation::from_input(scattered_graph(1500, 800.0), SimulationConfig::default())
            .unwrap();

    let reason = simulation.run_to_end();
    let state = simulation.state();
    assert_eq!(reason, EndReason::Converged);
    assert!(state.alpha < state.alpha_min);
    assert!(state.iteration <= 301, "{}", state.iteration);
    assert!(
        simulation
            .positions()
            .iter()
            .all(|p| p.x.is_finite() && p.y.is_finite())
    );
}

fn pentagon() -> GraphInput {
    let ids = ["a", "b", "c", "d", "e"];
    GraphInput {
        nodes: ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let angle = i as f64 / 5.0 * TAU;
                NodeInput::new(*id).at(50.0 * angle.cos(), 50.0 * angle.sin())
            })
            .collect(),
        edges: (0..5)
            .map(|i| EdgeInput::new(ids[i], ids[(i + 1) % 5]))
            .collect(),
    }
}

fn pairwise_distances(simulation: &ForceSimulation) -> Vec<f64> {
    let nodes = &simulation.graph().nodes;
    let mut distances = Vec::new();
    for i in 0..nodes.len() {
        for j in (i + 1)..nodes.len() {
            distances.push(nodes[i].position.distance(nodes[j].position));
        }
    }
    distances
}

/// Layouts from theta 0.5 and exact repulsion agree within 5% of the mean
/// pairwise distance after 300 ticks.
#[test]
fn pentagon_layout_matches_exact_simulation() {
    let run = |theta: f64| {
        let config = SimulationConfig {
            theta,
            ..Default::default()
        };
        let mut simulation = ForceSimulation::from_input(pentagon(), config).unwrap();
        for _ in 0..300 {
            simulation.tick();
        }
        pairwise_distances(&simulation)
    };

    let approx = run(0.5);
    let exact = run(0.0);
    let mean = exact.iter().sum::<f64>() / exact.len() as f64;
    for (a, e) in approx.iter().zip(&exact) {
        assert!((a - e).abs() <= 0.05 * mean, "{a} vs {e} (mean {mean})");
    }
}

#[test]
fn pinned_node_ignores_forces_until_released() {
    let mut simulation =
        ForceSimulation::from_input(scattered_graph(40, 50.0), SimulationConfig::default()).unwrap();
    assert!(simulation.pin("track-1", -300.0, 120.0));

    for _ in 0..100 {
        simulation.tick();
        let node = simulation.graph().node("track-1").unwrap();
        assert_eq!(node.position, DVec2::new(-300.0, 120.0));
        assert_eq!(node.velocity, DVec2::ZERO);
    }

    simulation.unpin("track-1");
    simulation.tick();
    assert_ne!(
        simulation.graph().node("track-1").unwrap().position,
        DVec2::new(-300.0, 120.0)
    );
}

#[test]
fn stacked_nodes_never_produce_nan() {
    let input = GraphInput {
        nodes: (0..30).map(|i| NodeInput::new(format!("n{i}")).at(0.0, 0.0)).collect(),
        edges: (1..30)
            .map(|i| EdgeInput::new("n0", format!("n{i}")).with_weight(0.0))
            .collect(),
    };
    let mut simulation = ForceSimulation::from_input(input, SimulationConfig::default()).unwrap();

    let reason = simulation.run_to_end();
    assert_eq!(reason, EndReason::Converged);
    for position in simulation.positions() {
        assert!(position.x.is_finite() && position.y.is_finite(), "{position:?}");
        assert!(position.vx.is_finite() && position.vy.is_finite(), "{position:?}");
    }
}

#[test]
fn radial_force_orders_nodes_by_value() {
    let input = GraphInput {
        nodes: (0..12)
            .map(|i| NodeInput::new(format!("n{i}")).with_radial_value(90.0 + i as f64 * 5.0))
            .collect(),
        edges: Vec::new(),
    };
    let config = SimulationConfig {
        radial: Some(Default::default()),
        center_strength: 0.0,
        ..Default::default()
    };
    let mut simulation = ForceSimulation::from_input(input, config).unwrap();
    simulation.run_to_end();

    let radius = |id: &str| simulation.graph().node(id).unwrap().position.length();
    assert!(radius("n0") < radius("n11"));
    assert!(radius("n0") < 300.0);
    assert!(radius("n11") > 400.0);
}

#[test]
fn cluster_force_pulls_categories_together() {
    let input = GraphInput {
        nodes: (0..16)
            .map(|i| {
                let category = if i % 2 == 0 { "house" } else { "techno" };
                let angle = i as f64 / 16.0 * TAU;
                NodeInput::new(format!("n{i}"))
                    .at(200.0 * angle.cos(), 200.0 * angle.sin())
                    .with_category(category)
            })
            .collect(),
        edges: Vec::new(),
    };
    let spread = |simulation: &ForceSimulation, parity: usize| {
        let nodes = simulation
            .graph()
            .nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 2 == parity)
            .map(|(_, node)| node.position)
            .collect::<Vec<_>>();
        let centroid = nodes.iter().copied().sum::<DVec2>() / nodes.len() as f64;
        nodes.iter().map(|p| p.distance(centroid)).sum::<f64>() / nodes.len() as f64
    };

    let mut loose = ForceSimulation::from_input(input.clone(), SimulationConfig::default()).unwrap();
    loose.run_to_end();
    let clustered_config = SimulationConfig {
        cluster_strength: 0.3,
        ..Default::default()
    };
    let mut clustered = ForceSimulation::from_input(input, clustered_config).unwrap();
    clustered.run_to_end();

    assert!(spread(&clustered, 0) < spread(&loose, 0));
}
