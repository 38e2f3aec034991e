//! In-plane rotation of a detected box relative to the image axes.
//!
//! The result is the angle of the box's longest edge folded into `[0, 90]`,
//! measured on corners truncated to whole pixels. Rectangles without
//! derivable corners fall back to folding the raw angle reported by the
//! backend.

use crate::geometry::{BoxCorners, RotatedRect};
use crate::image_impl::Primitives;

pub fn calculate_orientation<P: Primitives>(prims: &P, rect: &RotatedRect) -> f32 {
    match prims.box_points(rect) {
        Some(corners) => orientation_from_corners(&corners.truncated()),
        None => orientation_from_raw_angle(rect.angle),
    }
}

/// Angle of the first longest edge, folded into `[0, 90]`.
pub fn orientation_from_corners(corners: &BoxCorners) -> f32 {
    let edges = corners.edges();
    let mut longest = 0;
    let mut longest_len = f32::NEG_INFINITY;
    for (i, (dx, dy)) in edges.iter().enumerate() {
        let len = dx.hypot(*dy);
        if len > longest_len {
            longest = i;
            longest_len = len;
        }
    }

    let (dx, dy) = edges[longest];
    let mut angle = dy.atan2(dx).to_degrees().abs();
    if angle > 90.0 {
        angle = 180.0 - angle;
    }
    angle.clamp(0.0, 90.0)
}

/// Folds a raw rectangle angle. Not clamped.
pub fn orientation_from_raw_angle(raw: f32) -> f32 {
    let angle = raw.abs();
    if angle > 90.0 {
        90.0 - (angle - 90.0)
    } else {
        angle
    }
}
