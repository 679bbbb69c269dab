//! Camera, visibility and level-of-detail decisions for the draw layer.

pub mod clip;
mod culler;
mod lod;
mod viewport;

pub use culler::{CullConfig, FrustumCuller, VisibilityStats};
pub use lod::{LodConfig, LodPolicy, LodTier};
pub use viewport::{MAX_ZOOM, MIN_ZOOM, Viewport};
