use glam::DVec2;
use trackgraph::util::stable_pair;
use trackgraph::{
    CullConfig, EdgeInput, Entry, FrameScene, FrustumCuller, Graph, GraphInput, NodeInput,
    Quadtree, SceneConfig, Viewport,
};

fn scattered(count: usize, spread: f64) -> Vec<Entry> {
    (0..count)
        .map(|key| {
            let (x, y) = stable_pair(&format!("node-{key}"));
            Entry::new(key, DVec2::new(x, y) * spread, 1.0)
        })
        .collect()
}

fn keys(entries: Vec<Entry>) -> Vec<usize> {
    let mut keys = entries.into_iter().map(|entry| entry.key).collect::<Vec<_>>();
    keys.sort_unstable();
    keys
}

#[test]
fn camera_target_is_visible_at_every_zoom() {
    for zoom in [0.05, 0.2, 1.0, 2.5, 6.0] {
        for (x, y) in [(0.0, 0.0), (-750.0, 320.0), (12_000.0, -9_000.0)] {
            let viewport = Viewport::new(1024.0, 768.0).with_camera(x, y).with_zoom(zoom);
            let culler = FrustumCuller::new(viewport, CullConfig { buffer_px: 0.0 });
            assert!(culler.is_node_visible(DVec2::new(x, y)), "zoom {zoom} at ({x}, {y})");
        }
    }
}

#[test]
fn far_nodes_and_edges_are_culled() {
    let culler = FrustumCuller::new(Viewport::new(800.0, 600.0), CullConfig::default());
    let far = DVec2::new(2000.0, 0.0);
    let farther = DVec2::new(2500.0, 900.0);

    assert!(!culler.is_node_visible(far));
    assert!(!culler.is_edge_visible(far, farther));
}

#[test]
fn edges_crossing_the_screen_stay_visible() {
    let culler = FrustumCuller::new(Viewport::new(800.0, 600.0), CullConfig::default());
    let west = DVec2::new(-5000.0, 10.0);
    let east = DVec2::new(5000.0, -10.0);

    assert!(!culler.is_node_visible(west));
    assert!(!culler.is_node_visible(east));
    assert!(culler.is_edge_crossing_viewport(west, east));
    assert!(culler.is_edge_visible(west, east));
}

#[test]
fn indexed_culling_agrees_with_per_node_checks() {
    let entries = scattered(600, 1500.0);
    let tree = Quadtree::fitted(&entries, 8, 16);

    for (zoom, camera) in [(1.0, DVec2::ZERO), (0.4, DVec2::new(300.0, -200.0)), (3.0, DVec2::new(-900.0, 40.0))] {
        let viewport = Viewport::new(1280.0, 720.0)
            .with_camera(camera.x, camera.y)
            .with_zoom(zoom);
        let mut culler = FrustumCuller::new(viewport, CullConfig::default());

        let expected = keys(
            entries
                .iter()
                .copied()
                .filter(|entry| culler.is_node_visible(entry.position))
                .collect(),
        );
        assert_eq!(keys(culler.visible_nodes(&tree)), expected, "zoom {zoom}");

        let stats = culler.visibility_stats();
        assert_eq!(stats.total_nodes, 600);
        assert_eq!(stats.visible_nodes + stats.culled_nodes, 600);
    }
}

#[test]
fn larger_buffers_only_add_nodes() {
    let entries = scattered(400, 1200.0);
    let tree = Quadtree::fitted(&entries, 4, 16);
    let viewport = Viewport::new(800.0, 600.0).with_zoom(0.8);

    let mut previous: Vec<usize> = Vec::new();
    for buffer_px in [0.0, 25.0, 100.0, 400.0, 2000.0] {
        let mut culler = FrustumCuller::new(viewport, CullConfig { buffer_px });
        let visible = keys(culler.visible_nodes(&tree));
        assert!(previous.iter().all(|key| visible.binary_search(key).is_ok()));
        previous = visible;
    }
    assert_eq!(previous.len(), entries.len());
}

#[test]
fn invalid_viewport_shows_nothing() {
    let tree = Quadtree::fitted(&scattered(50, 100.0), 4, 16);
    let mut culler = FrustumCuller::new(Viewport::new(0.0, 600.0), CullConfig::default());

    assert!(culler.visible_nodes(&tree).is_empty());
    assert!(!culler.is_node_visible(DVec2::ZERO));
    assert!(!culler.is_edge_visible(DVec2::new(-10.0, 0.0), DVec2::new(10.0, 0.0)));
}

fn grid_graph(side: usize, spacing: f64) -> Graph {
    let id = |x: usize, y: usize| format!("{x}:{y}");
    let mut input = GraphInput::default();
    for y in 0..side {
        for x in 0..side {
            input
                .nodes
                .push(NodeInput::new(id(x, y)).at(x as f64 * spacing, y as f64 * spacing));
            if x > 0 {
                input.edges.push(EdgeInput::new(id(x - 1, y), id(x, y)));
            }
            if y > 0 {
                input.edges.push(EdgeInput::new(id(x, y - 1), id(x, y)));
            }
        }
    }
    Graph::ingest(input)
}

#[test]
fn zoomed_out_frames_thin_edges_and_shrink_detail() {
    let scene = FrameScene::from_graph(&grid_graph(30, 100.0), SceneConfig::default());

    let mut overview = Viewport::new(1280.0, 720.0);
    overview.fit_to_bounds(&scene.quadtree().boundary(), 20.0);
    let far = scene.plan(&overview);
    assert!(overview.zoom < 0.35);
    assert_eq!(far.edge_stride, 3);
    assert_eq!(far.stats.total_nodes, 900);
    assert!(far.edges.len() < far.stats.total_edges);

    let close = scene.plan(&Viewport::new(1280.0, 720.0).with_camera(1500.0, 1500.0).with_zoom(2.0));
    assert_eq!(close.edge_stride, 1);
    assert!(close.nodes.len() < far.nodes.len());
    assert!(close.nodes.iter().all(|node| node.tier.full_geometry()));
}
