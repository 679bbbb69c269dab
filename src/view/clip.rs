//! Cohen-Sutherland segment clipping.

use glam::DVec2;

use crate::spatial::Rect;

pub const INSIDE: u8 = 0;
pub const LEFT: u8 = 1;
pub const RIGHT: u8 = 1 << 1;
pub const BOTTOM: u8 = 1 << 2;
pub const TOP: u8 = 1 << 3;

// An endpoint needs at most two clips (one per axis); the rest is slack for
// rounding at corners.
const MAX_PASSES: usize = 8;

pub fn outcode(rect: &Rect, point: DVec2) -> u8 {
    let mut code = INSIDE;
    if point.x < rect.min.x {
        code |= LEFT;
    } else if point.x > rect.max.x {
        code |= RIGHT;
    }
    if point.y < rect.min.y {
        code |= BOTTOM;
    } else if point.y > rect.max.y {
        code |= TOP;
    }
    code
}

/// The part of segment `start..end` inside `rect`, if any.
pub fn clip_segment(rect: &Rect, start: DVec2, end: DVec2) -> Option<(DVec2, DVec2)> {
    if !rect.is_valid() || !start.is_finite() || !end.is_finite() {
        return None;
    }

    let (mut a, mut b) = (start, end);
    let mut code_a = outcode(rect, a);
    let mut code_b = outcode(rect, b);

    for _ in 0..MAX_PASSES {
        if code_a | code_b == INSIDE {
            return Some((a, b));
        }
        if code_a & code_b != INSIDE {
            return None;
        }

        let outside = if code_a != INSIDE { code_a } else { code_b };
        let delta = b - a;
        let point = if outside & TOP != 0 {
            DVec2::new(a.x + delta.x * (rect.max.y - a.y) / delta.y, rect.max.y)
        } else if outside & BOTTOM != 0 {
            DVec2::new(a.x + delta.x * (rect.min.y - a.y) / delta.y, rect.min.y)
        } else if outside & RIGHT != 0 {
            DVec2::new(rect.max.x, a.y + delta.y * (rect.max.x - a.x) / delta.x)
        } else {
            DVec2::new(rect.min.x, a.y + delta.y * (rect.min.x - a.x) / delta.x)
        };

        if outside == code_a {
            a = point;
            code_a = outcode(rect, a);
        } else {
            b = point;
            code_b = outcode(rect, b);
        }
    }

    None
}

pub fn segment_crosses(rect: &Rect, start: DVec2, end: DVec2) -> bool {
    clip_segment(rect, start, end).is_some()
}
