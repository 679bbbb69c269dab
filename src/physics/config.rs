use serde::{Deserialize, Deserializer, Serialize};

use crate::spatial::{DEFAULT_CAPACITY, DEFAULT_MAX_DEPTH};

pub const DEFAULT_THETA: f64 = 0.8;
pub const DEFAULT_ALPHA_MIN: f64 = 0.001;
pub const DEFAULT_ALPHA_DECAY_TICKS: f64 = 300.0;
pub const DEFAULT_VELOCITY_DECAY: f64 = 0.4;
pub const DEFAULT_MAX_ITERATIONS: u64 = 3000;

/// Places nodes on a ring whose radius follows a scalar attribute.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadialConfig {
    pub strength: f64,
    pub inner_radius: f64,
    pub outer_radius: f64,
}

impl Default for RadialConfig {
    fn default() -> Self {
        Self {
            strength: 0.05,
            inner_radius: 120.0,
            outer_radius: 600.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Barnes-Hut opening criterion: a cell is treated as one body when
    /// `width / distance < theta`. Zero means exact pairwise repulsion.
    pub theta: f64,
    /// Negative repels.
    pub charge: f64,
    /// Floor on inter-node distance inside the repulsion kernel.
    pub distance_min: f64,
    /// Bodies further than this exert no repulsion; `None` is unbounded.
    pub distance_max: Option<f64>,
    pub link_distance: f64,
    pub link_strength: f64,
    pub collision_base_radius: f64,
    pub collision_mass_radius: f64,
    pub collision_strength: f64,
    pub center_x: f64,
    pub center_y: f64,
    pub center_strength: f64,
    pub radial: Option<RadialConfig>,
    /// Pull toward the centroid of the node's category; zero disables.
    pub cluster_strength: f64,
    pub alpha_min: f64,
    pub alpha_decay: f64,
    pub velocity_decay: f64,
    /// Hard backstop; alpha convergence normally ends the run first.
    pub max_iterations: u64,
    pub quadtree_capacity: usize,
    pub quadtree_max_depth: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            theta: DEFAULT_THETA,
            charge: -30.0,
            distance_min: 1.0,
            distance_max: None,
            link_distance: 60.0,
            link_strength: 1.0,
            collision_base_radius: 6.0,
            collision_mass_radius: 2.0,
            collision_strength: 0.7,
            center_x: 0.0,
            center_y: 0.0,
            center_strength: 0.02,
            radial: None,
            cluster_strength: 0.0,
            alpha_min: DEFAULT_ALPHA_MIN,
            alpha_decay: 1.0 - DEFAULT_ALPHA_MIN.powf(1.0 / DEFAULT_ALPHA_DECAY_TICKS),
            velocity_decay: DEFAULT_VELOCITY_DECAY,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            quadtree_capacity: DEFAULT_CAPACITY,
            quadtree_max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl SimulationConfig {
    pub fn collision_radius(&self, mass: f64) -> f64 {
        self.collision_base_radius + self.collision_mass_radius * mass.max(0.0).sqrt()
    }

    pub fn apply(&mut self, patch: &ConfigPatch) {
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = patch.$field { self.$field = value; })*
            };
        }

        merge!(
            theta,
            charge,
            distance_min,
            link_distance,
            link_strength,
            collision_base_radius,
            collision_mass_radius,
            collision_strength,
            center_x,
            center_y,
            center_strength,
            cluster_strength,
            alpha_min,
            alpha_decay,
            velocity_decay,
            max_iterations,
            quadtree_capacity,
            quadtree_max_depth,
        );

        if let Some(distance_max) = patch.distance_max {
            self.distance_max = distance_max;
        }
        if let Some(radial) = patch.radial {
            self.radial = radial;
        }
        self.sanitize();
    }

    /// Pulls out-of-range values back into a usable range.
    pub fn sanitize(&mut self) {
        fn finite_or(value: f64, fallback: f64) -> f64 {
            if value.is_finite() { value } else { fallback }
        }

        let defaults = Self::default();
        self.theta = finite_or(self.theta, defaults.theta).max(0.0);
        self.charge = finite_or(self.charge, defaults.charge);
        self.distance_min = finite_or(self.distance_min, defaults.distance_min).max(1e-6);
        self.link_distance = finite_or(self.link_distance, defaults.link_distance).max(0.0);
        self.link_strength = finite_or(self.link_strength, defaults.link_strength).max(0.0);
        self.collision_strength = finite_or(self.collision_strength, 0.0).clamp(0.0, 1.0);
        self.alpha_min = finite_or(self.alpha_min, defaults.alpha_min).clamp(0.0, 1.0);
        self.alpha_decay = finite_or(self.alpha_decay, defaults.alpha_decay).clamp(0.0, 1.0);
        self.velocity_decay = finite_or(self.velocity_decay, defaults.velocity_decay).clamp(0.0, 1.0);
        self.quadtree_capacity = self.quadtree_capacity.max(1);
    }
}

/// Maps a field that is present in the input to `Some`, even when it is
/// `null`. Missing fields fall back to `None` through `#[serde(default)]`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial configuration; `None` leaves the current value untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub theta: Option<f64>,
    pub charge: Option<f64>,
    pub distance_min: Option<f64>,
    /// Present-but-null clears the cap.
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub distance_max: Option<Option<f64>>,
    pub link_distance: Option<f64>,
    pub link_strength: Option<f64>,
    pub collision_base_radius: Option<f64>,
    pub collision_mass_radius: Option<f64>,
    pub collision_strength: Option<f64>,
    pub center_x: Option<f64>,
    pub center_y: Option<f64>,
    pub center_strength: Option<f64>,
    /// Present-but-null turns the radial force off.
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub radial: Option<Option<RadialConfig>>,
    pub cluster_strength: Option<f64>,
    pub alpha_min: Option<f64>,
    pub alpha_decay: Option<f64>,
    pub velocity_decay: Option<f64>,
    pub max_iterations: Option<u64>,
    pub quadtree_capacity: Option<usize>,
    pub quadtree_max_depth: Option<usize>,
}
