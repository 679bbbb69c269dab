use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LodTier {
    Full = 0,
    Medium = 1,
    Low = 2,
    Culled = 3,
}

impl LodTier {
    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn draws_labels(self) -> bool {
        self == Self::Full
    }

    pub fn draws_glow(self) -> bool {
        matches!(self, Self::Full | Self::Medium)
    }

    /// Below this the draw layer falls back to a flat dot.
    pub fn full_geometry(self) -> bool {
        matches!(self, Self::Full | Self::Medium)
    }

    pub fn is_drawn(self) -> bool {
        self != Self::Culled
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    pub full_px: f64,
    pub medium_px: f64,
    pub low_px: f64,
    /// Node count at which thresholds start widening.
    pub reference_nodes: usize,
    /// Threshold growth per doubling of the node count past `reference_nodes`.
    pub widen: f64,
    /// From this zoom on, medium-sized nodes are promoted to full detail.
    pub label_zoom: f64,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            full_px: 18.0,
            medium_px: 8.0,
            low_px: 1.5,
            reference_nodes: 2000,
            widen: 0.5,
            label_zoom: 1.35,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LodPolicy {
    config: LodConfig,
}

impl LodPolicy {
    pub fn new(config: LodConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LodConfig {
        &self.config
    }

    pub fn threshold_scale(&self, node_count: usize) -> f64 {
        let reference = self.config.reference_nodes.max(1) as f64;
        let excess = (node_count as f64 / reference).max(1.0);
        1.0 + self.config.widen.max(0.0) * excess.log2()
    }

    pub fn tier(&self, zoom: f64, size_px: f64, node_count: usize) -> LodTier {
        if !zoom.is_finite() || zoom <= 0.0 || !size_px.is_finite() {
            return LodTier::Culled;
        }

        let scale = self.threshold_scale(node_count);
        let config = &self.config;
        if size_px < config.low_px * scale {
            LodTier::Culled
        } else if size_px >= config.full_px * scale
            || (zoom >= config.label_zoom && size_px >= config.medium_px * scale)
        {
            LodTier::Full
        } else if size_px >= config.medium_px * scale {
            LodTier::Medium
        } else {
            LodTier::Low
        }
    }

    /// Keep every `stride`-th edge when zoomed far out.
    pub fn edge_stride(&self, zoom: f64) -> usize {
        if zoom < 0.35 {
            3
        } else if zoom < 0.55 {
            2
        } else {
            1
        }
    }

    pub fn keeps_edge(&self, source: usize, target: usize, stride: usize) -> bool {
        if stride <= 1 {
            return true;
        }
        let edge_hash = source.wrapping_mul(31) ^ target.wrapping_mul(131);
        edge_hash % stride == 0
    }
}
