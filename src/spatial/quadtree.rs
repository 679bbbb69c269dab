use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::DVec2;

use super::Rect;

pub const DEFAULT_CAPACITY: usize = 4;
pub const DEFAULT_MAX_DEPTH: usize = 16;

const FITTED_PADDING: f64 = 1.0;

/// A point stored in the index. `key` is the caller's node index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Entry {
    pub key: usize,
    pub position: DVec2,
    pub mass: f64,
}

impl Entry {
    pub fn new(key: usize, position: DVec2, mass: f64) -> Self {
        Self {
            key,
            position,
            mass,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellId(u32);

impl CellId {
    pub const ROOT: CellId = CellId(0);

    fn new(index: usize) -> Self {
        debug_assert!(index < u32::MAX as usize, "CellId overflow");
        CellId(index as u32)
    }

    fn index(self) -> usize {
        self.0 as usize
    }

    fn offset(self, quadrant: usize) -> Self {
        CellId(self.0 + quadrant as u32)
    }
}

#[derive(Clone, Debug)]
pub struct Cell {
    pub bounds: Rect,
    pub depth: usize,
    mass: f64,
    count: usize,
    mass_moment: DVec2,
    position_sum: DVec2,
    entries: Vec<Entry>,
    first_child: Option<CellId>,
}

impl Cell {
    fn empty(bounds: Rect, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            mass: 0.0,
            count: 0,
            mass_moment: DVec2::ZERO,
            position_sum: DVec2::ZERO,
            entries: Vec::new(),
            first_child: None,
        }
    }

    fn absorb(&mut self, entry: &Entry) {
        let mass = entry.mass.max(0.0);
        self.mass += mass;
        self.count += 1;
        self.mass_moment += entry.position * mass;
        self.position_sum += entry.position;
    }

    pub fn is_leaf(&self) -> bool {
        self.first_child.is_none()
    }

    /// Points stored directly in this cell; empty for internal cells.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn children(&self) -> Option<[CellId; 4]> {
        self.first_child
            .map(|first| std::array::from_fn(|quadrant| first.offset(quadrant)))
    }

    /// Total mass of the subtree.
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Number of points in the subtree.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Mass-weighted centroid of the subtree; falls back to the plain mean
    /// when every point is massless.
    pub fn center_of_mass(&self) -> DVec2 {
        if self.mass > 0.0 {
            self.mass_moment / self.mass
        } else if self.count > 0 {
            self.position_sum / self.count as f64
        } else {
            self.bounds.center()
        }
    }
}

/// Capacity-splitting point quadtree stored as an arena of cells.
///
/// Children of a cell occupy four consecutive slots, so the tree has no
/// parent pointers and `clear` is a truncate.
#[derive(Clone, Debug)]
pub struct Quadtree {
    cells: Vec<Cell>,
    capacity: usize,
    max_depth: usize,
    len: usize,
}

impl Default for Quadtree {
    fn default() -> Self {
        Self::new(
            Rect::new(DVec2::ZERO, 1.0, 1.0),
            DEFAULT_CAPACITY,
            DEFAULT_MAX_DEPTH,
        )
    }
}

impl Quadtree {
    pub fn new(boundary: Rect, capacity: usize, max_depth: usize) -> Self {
        Self {
            cells: vec![Cell::empty(boundary, 0)],
            capacity: capacity.max(1),
            max_depth,
            len: 0,
        }
    }

    /// Builds a tree whose root is fitted around `entries`.
    pub fn fitted(entries: &[Entry], capacity: usize, max_depth: usize) -> Self {
        let boundary = Rect::fitted(entries.iter().map(|entry| entry.position), FITTED_PADDING)
            .unwrap_or_else(|| Rect::new(DVec2::ZERO, 1.0, 1.0));
        let mut tree = Self::new(boundary, capacity, max_depth);
        tree.extend(entries.iter().copied());
        tree
    }

    /// Replaces the content with `entries` under a new root boundary.
    /// Returns how many entries were accepted.
    pub fn build(&mut self, entries: impl IntoIterator<Item = Entry>, boundary: Rect) -> usize {
        self.cells.clear();
        self.cells.push(Cell::empty(boundary, 0));
        self.len = 0;
        self.extend(entries)
    }

    /// Like `build`, refitting the boundary around the new entries.
    pub fn rebuild_fitted(&mut self, entries: &[Entry]) -> usize {
        let boundary = Rect::fitted(entries.iter().map(|entry| entry.position), FITTED_PADDING)
            .unwrap_or_else(|| Rect::new(DVec2::ZERO, 1.0, 1.0));
        self.build(entries.iter().copied(), boundary)
    }

    fn extend(&mut self, entries: impl IntoIterator<Item = Entry>) -> usize {
        let mut accepted = 0;
        for entry in entries {
            if self.insert(entry) {
                accepted += 1;
            }
        }
        accepted
    }

    /// Drops every point, keeping the root boundary.
    pub fn clear(&mut self) {
        let boundary = self.cells[0].bounds;
        self.cells.clear();
        self.cells.push(Cell::empty(boundary, 0));
        self.len = 0;
    }

    pub fn boundary(&self) -> Rect {
        self.cells[0].bounds
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn root(&self) -> &Cell {
        &self.cells[0]
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.index()]
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|cell| cell.is_leaf())
    }

    /// Deepest level reached by any cell.
    pub fn depth(&self) -> usize {
        self.cells.iter().map(|cell| cell.depth).max().unwrap_or(0)
    }

    /// Returns false when the point is non-finite or outside the root boundary.
    pub fn insert(&mut self, entry: Entry) -> bool {
        if !entry.position.is_finite() || !self.cells[0].bounds.contains(entry.position) {
            return false;
        }

        let mut id = CellId::ROOT;
        self.cells[0].absorb(&entry);
        loop {
            if let Some(first) = self.cells[id.index()].first_child {
                let quadrant = self.cells[id.index()].bounds.quadrant_for(entry.position);
                id = first.offset(quadrant);
                self.cells[id.index()].absorb(&entry);
                continue;
            }

            let cell = &self.cells[id.index()];
            if cell.entries.len() < self.capacity || cell.depth >= self.max_depth {
                self.cells[id.index()].entries.push(entry);
                break;
            }

            self.subdivide(id);
        }

        self.len += 1;
        true
    }

    fn subdivide(&mut self, id: CellId) {
        let bounds = self.cells[id.index()].bounds;
        let depth = self.cells[id.index()].depth;
        let first = CellId::new(self.cells.len());
        for quadrant in 0..4 {
            self.cells.push(Cell::empty(bounds.child(quadrant), depth + 1));
        }

        let entries = std::mem::take(&mut self.cells[id.index()].entries);
        for entry in entries {
            let child = &mut self.cells[first.offset(bounds.quadrant_for(entry.position)).index()];
            child.absorb(&entry);
            child.entries.push(entry);
        }
        self.cells[id.index()].first_child = Some(first);
    }

    /// Every stored point inside `rect`. Invalid rectangles match nothing.
    pub fn query_rect(&self, rect: &Rect) -> Vec<Entry> {
        let mut found = Vec::new();
        if !rect.is_valid() || self.is_empty() {
            return found;
        }

        let mut stack = vec![CellId::ROOT];
        while let Some(id) = stack.pop() {
            let cell = self.cell(id);
            if cell.count == 0 || !cell.bounds.intersects(rect) {
                continue;
            }

            match cell.children() {
                Some(children) => stack.extend(children),
                None => found.extend(
                    cell.entries
                        .iter()
                        .filter(|entry| rect.contains(entry.position))
                        .copied(),
                ),
            }
        }
        found
    }

    /// Calls `visit` for every stored point within `radius` of `center`.
    pub fn for_each_in_circle(&self, center: DVec2, radius: f64, mut visit: impl FnMut(&Entry)) {
        if !center.is_finite() || !radius.is_finite() || radius < 0.0 || self.is_empty() {
            return;
        }

        let radius_sq = radius * radius;
        let mut stack = vec![CellId::ROOT];
        while let Some(id) = stack.pop() {
            let cell = self.cell(id);
            if cell.count == 0 || !cell.bounds.intersects_circle(center, radius) {
                continue;
            }

            match cell.children() {
                Some(children) => stack.extend(children),
                None => {
                    for entry in &cell.entries {
                        if entry.position.distance_squared(center) <= radius_sq {
                            visit(entry);
                        }
                    }
                }
            }
        }
    }

    pub fn query_circle(&self, center: DVec2, radius: f64) -> Vec<Entry> {
        let mut found = Vec::new();
        self.for_each_in_circle(center, radius, |entry| found.push(*entry));
        found
    }

    /// Closest stored point within `max_distance` (inclusive), best-first.
    pub fn find_nearest(&self, point: DVec2, max_distance: f64) -> Option<Entry> {
        if !point.is_finite() || max_distance.is_nan() || max_distance < 0.0 || self.is_empty() {
            return None;
        }

        let mut best: Option<Entry> = None;
        let mut best_sq = max_distance * max_distance;
        let mut frontier = BinaryHeap::new();
        frontier.push(Candidate {
            distance_sq: self.root().bounds.distance_sq_to_point(point),
            id: CellId::ROOT,
        });

        while let Some(Candidate { distance_sq, id }) = frontier.pop() {
            if distance_sq > best_sq {
                break;
            }

            let cell = self.cell(id);
            match cell.children() {
                Some(children) => {
                    for child in children {
                        let child_cell = self.cell(child);
                        if child_cell.count == 0 {
                            continue;
                        }
                        let child_distance_sq = child_cell.bounds.distance_sq_to_point(point);
                        if child_distance_sq <= best_sq {
                            frontier.push(Candidate {
                                distance_sq: child_distance_sq,
                                id: child,
                            });
                        }
                    }
                }
                None => {
                    for entry in &cell.entries {
                        let entry_sq = entry.position.distance_squared(point);
                        if entry_sq < best_sq || (best.is_none() && entry_sq <= best_sq) {
                            best_sq = entry_sq;
                            best = Some(*entry);
                        }
                    }
                }
            }
        }

        best
    }
}

/// Min-heap ordering on distance.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    distance_sq: f64,
    id: CellId,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance_sq
            .total_cmp(&self.distance_sq)
            .then_with(|| other.id.0.cmp(&self.id.0))
    }
}
