//! Graph records handed to the simulation.
//!
//! Raw inputs arrive loosely shaped from the data layer; `Graph::ingest`
//! resolves every optional field once so the force kernels only ever see
//! complete records.

mod ingest;

use std::collections::HashMap;

use glam::DVec2;
use serde::{Deserialize, Serialize};

pub use ingest::IngestStats;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// A transition that has actually been played.
    #[default]
    ProvenTransition,
    /// Key/tempo compatible, never played.
    HarmonicSuggestion,
    /// Generic relatedness (shared artist, label, tags).
    Similarity,
}

impl EdgeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::ProvenTransition => "proven_transition",
            Self::HarmonicSuggestion => "harmonic_suggestion",
            Self::Similarity => "similarity",
        }
    }

    /// Multiplier on the rest length; proven transitions sit closest.
    pub fn distance_scale(self) -> f64 {
        match self {
            Self::ProvenTransition => 0.8,
            Self::HarmonicSuggestion => 1.4,
            Self::Similarity => 1.15,
        }
    }

    /// Multiplier on spring stiffness; proven transitions pull hardest.
    pub fn strength_scale(self) -> f64 {
        match self {
            Self::ProvenTransition => 1.0,
            Self::HarmonicSuggestion => 0.35,
            Self::Similarity => 0.6,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeInput {
    pub id: String,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    /// Scalar used by the radial force, typically tempo.
    #[serde(default, alias = "tempo", alias = "bpm")]
    pub radial_value: Option<f64>,
}

impl NodeInput {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            x: None,
            y: None,
            category: None,
            radial_value: None,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_radial_value(mut self, value: f64) -> Self {
        self.radial_value = Some(value);
        self
    }
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeInput {
    pub source: String,
    pub target: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub kind: EdgeKind,
}

impl EdgeInput {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            weight: default_weight(),
            kind: EdgeKind::default(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_kind(mut self, kind: EdgeKind) -> Self {
        self.kind = kind;
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphInput {
    #[serde(default)]
    pub nodes: Vec<NodeInput>,
    #[serde(default)]
    pub edges: Vec<EdgeInput>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: String,
    pub position: DVec2,
    pub velocity: DVec2,
    pub fixed_x: Option<f64>,
    pub fixed_y: Option<f64>,
    pub degree: usize,
    /// `1 + degree`.
    pub mass: f64,
    pub category: Option<usize>,
    pub radial_value: Option<f64>,
}

impl Node {
    pub fn is_pinned(&self) -> bool {
        self.fixed_x.is_some() || self.fixed_y.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    pub weight: f64,
    pub kind: EdgeKind,
}

#[derive(Clone, Debug, Default)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub categories: Vec<String>,
    pub stats: IngestStats,
    index_by_id: HashMap<String, usize>,
}

impl Graph {
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|index| &self.nodes[index])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.index_of(id).map(|index| &mut self.nodes[index])
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_inputs(&self) -> Vec<NodeInput> {
        self.nodes
            .iter()
            .map(|node| NodeInput {
                id: node.id.clone(),
                x: Some(node.position.x),
                y: Some(node.position.y),
                category: node.category.map(|index| self.categories[index].clone()),
                radial_value: node.radial_value,
            })
            .collect()
    }

    pub fn edge_inputs(&self) -> Vec<EdgeInput> {
        self.edges
            .iter()
            .map(|edge| EdgeInput {
                source: self.nodes[edge.source].id.clone(),
                target: self.nodes[edge.target].id.clone(),
                weight: edge.weight,
                kind: edge.kind,
            })
            .collect()
    }

    /// Replaces the node set and/or the edge set. Nodes whose id survives keep
    /// their position, velocity and pin.
    pub fn updated(&self, nodes: Option<Vec<NodeInput>>, edges: Option<Vec<EdgeInput>>) -> Graph {
        let input = GraphInput {
            nodes: nodes.unwrap_or_else(|| self.node_inputs()),
            edges: edges.unwrap_or_else(|| self.edge_inputs()),
        };
        Self::ingest_with_prior(input, Some(self))
    }
}
