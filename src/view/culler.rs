use std::fmt;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::spatial::{Entry, Quadtree, Rect};

use super::Viewport;
use super::clip::segment_crosses;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullConfig {
    /// Screen pixels kept around the viewport so nodes entering during a pan
    /// are already drawn.
    pub buffer_px: f64,
}

impl Default for CullConfig {
    fn default() -> Self {
        Self { buffer_px: 100.0 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityStats {
    pub total_nodes: usize,
    pub visible_nodes: usize,
    pub culled_nodes: usize,
    pub total_edges: usize,
    pub visible_edges: usize,
    pub culled_edges: usize,
}

impl VisibilityStats {
    pub fn visible_ratio(&self) -> f64 {
        if self.total_nodes == 0 {
            return 0.0;
        }
        self.visible_nodes as f64 / self.total_nodes as f64
    }

    fn edge_ratio(&self) -> f64 {
        if self.total_edges == 0 {
            return 0.0;
        }
        self.visible_edges as f64 / self.total_edges as f64
    }
}

impl fmt::Display for VisibilityStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nodes {}/{} visible ({:.1}%), edges {}/{} visible ({:.1}%)",
            self.visible_nodes,
            self.total_nodes,
            self.visible_ratio() * 100.0,
            self.visible_edges,
            self.total_edges,
            self.edge_ratio() * 100.0,
        )
    }
}

/// Visibility decisions for one viewport.
#[derive(Clone, Debug, Default)]
pub struct FrustumCuller {
    viewport: Viewport,
    config: CullConfig,
    stats: VisibilityStats,
}

impl FrustumCuller {
    pub fn new(viewport: Viewport, config: CullConfig) -> Self {
        Self {
            viewport,
            config,
            stats: VisibilityStats::default(),
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn config(&self) -> CullConfig {
        self.config
    }

    /// World-space query rectangle for the screen grown by `buffer_px`.
    pub fn viewport_rectangle(&self, buffer_px: f64) -> Rect {
        self.viewport.visible_world_rect(buffer_px)
    }

    fn buffered_world_rect(&self) -> Option<Rect> {
        if !self.viewport.is_valid() {
            return None;
        }
        Some(self.viewport_rectangle(self.config.buffer_px))
    }

    pub fn visible_nodes(&mut self, tree: &Quadtree) -> Vec<Entry> {
        let visible = match self.buffered_world_rect() {
            Some(rect) => tree.query_rect(&rect),
            None => Vec::new(),
        };

        self.stats.total_nodes = tree.len();
        self.stats.visible_nodes = visible.len();
        self.stats.culled_nodes = tree.len().saturating_sub(visible.len());
        visible
    }

    /// Single-node check in screen space, for callers without an index.
    pub fn is_node_visible(&self, position: DVec2) -> bool {
        if !self.viewport.is_valid() || !position.is_finite() {
            return false;
        }
        let screen = self.viewport.world_to_screen(position);
        self.viewport.screen_rect(self.config.buffer_px).contains(screen)
    }

    pub fn is_edge_visible(&self, source: DVec2, target: DVec2) -> bool {
        self.is_node_visible(source)
            || self.is_node_visible(target)
            || self.is_edge_crossing_viewport(source, target)
    }

    /// True when the segment passes through the buffered viewport, even if
    /// both endpoints lie outside it.
    pub fn is_edge_crossing_viewport(&self, source: DVec2, target: DVec2) -> bool {
        let Some(rect) = self.buffered_world_rect() else {
            return false;
        };
        segment_crosses(&rect, source, target)
    }

    pub fn record_edges(&mut self, total: usize, visible: usize) {
        self.stats.total_edges = total;
        self.stats.visible_edges = visible.min(total);
        self.stats.culled_edges = total.saturating_sub(visible);
    }

    pub fn visibility_stats(&self) -> VisibilityStats {
        self.stats
    }
}
