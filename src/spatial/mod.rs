mod quadtree;
mod rect;

pub use quadtree::{Cell, CellId, DEFAULT_CAPACITY, DEFAULT_MAX_DEPTH, Entry, Quadtree};
pub use rect::Rect;
