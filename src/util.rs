use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Maps an id to a stable pair of values in `[-1, 1]`.
pub fn stable_pair(id: &str) -> (f64, f64) {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let hash = hasher.finish();

    let x = (hash & 0xffff_ffff) as f64 / u32::MAX as f64;
    let y = ((hash >> 32) & 0xffff_ffff) as f64 / u32::MAX as f64;
    ((x * 2.0) - 1.0, (y * 2.0) - 1.0)
}

/// Unit direction for pushing `from` away from `to` when the two coincide.
/// Swapping the arguments flips the direction.
pub fn spread_direction(from: usize, to: usize) -> (f64, f64) {
    let (low, high) = (from.min(to), from.max(to));
    let angle = ((low as f64) * 0.618_034 + (high as f64) * 0.414_214 + 0.37) * std::f64::consts::TAU;
    if from > to {
        (-angle.cos(), -angle.sin())
    } else {
        (angle.cos(), angle.sin())
    }
}
