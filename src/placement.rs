//! Where on a detected box the decal goes.

use tracing::trace;

use crate::error::Result;
use crate::geometry::{Point, Point2f, RotatedRect};
use crate::image_impl::Primitives;
use crate::types::Face;

/// Pixel position of the decal centre.
pub type Position = Point;

/// Smallest fraction of the corner-to-centre vector tried before giving up.
pub const MIN_OFFSET_RATIO: f32 = 0.05;
/// Number of ratios tried between `offset_percent` and [`MIN_OFFSET_RATIO`].
pub const SEARCH_STEPS: usize = 30;

/// `steps` evenly spaced values from `start` to `end`, both inclusive.
fn linspace(start: f32, end: f32, steps: usize) -> impl Iterator<Item = f32> {
    let step = if steps > 1 {
        (end - start) / (steps - 1) as f32
    } else {
        0.0
    };
    (0..steps).map(move |i| if i + 1 == steps && steps > 1 { end } else { start + step * i as f32 })
}

/// A point inside the box, pulled from the centre towards its top-most corner.
///
/// Starts `offset_percent` of the way to the corner and backs off towards
/// the centre until the point lies inside or on the box outline. Corners are
/// truncated to whole pixels first. Returns the truncated centre when the box
/// has no usable corners or no candidate fits.
pub fn calculate_decal_position<P: Primitives>(
    prims: &P,
    rect: &RotatedRect,
    offset_percent: f32,
) -> Result<Position> {
    let center = rect.center_px();
    let Some(corners) = prims.box_points(rect) else {
        return Ok(center);
    };

    let corners = corners.truncated();
    let polygon = corners.points();
    let mut anchor = polygon[0];
    for corner in &polygon[1..] {
        if corner.y < anchor.y {
            anchor = *corner;
        }
    }

    let dx = anchor.x - center.x as f32;
    let dy = anchor.y - center.y as f32;
    if dx.hypot(dy) < 1.0 {
        return Ok(center);
    }

    for ratio in linspace(offset_percent, MIN_OFFSET_RATIO, SEARCH_STEPS) {
        let candidate = Point::new(
            (center.x as f32 + dx * ratio) as i32,
            (center.y as f32 + dy * ratio) as i32,
        );
        if prims.point_polygon_test(polygon, Point2f::from(candidate))? >= 0.0 {
            trace!(ratio, x = candidate.x, y = candidate.y, "placement found");
            return Ok(candidate);
        }
    }

    Ok(center)
}

/// Fixed offset from the centre towards one face, without a containment check.
pub fn calculate_decal_position_on_face(rect: &RotatedRect, face: Face, offset_percent: f32) -> Position {
    let center = rect.center_px();
    let offset = (rect.size.width.max(rect.size.height) * offset_percent) as i32;
    match face {
        Face::Top => Point::new(center.x, center.y - offset),
        Face::Bottom => Point::new(center.x, center.y + offset),
        Face::Left => Point::new(center.x - offset, center.y),
        Face::Right => Point::new(center.x + offset, center.y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{box_points, point_polygon_test, Size2f};
    use crate::image_impl::RustPrimitives;
    use proptest::prelude::*;

    fn rect(cx: f32, cy: f32, w: f32, h: f32, angle: f32) -> RotatedRect {
        RotatedRect::new(Point2f::new(cx, cy), Size2f::new(w, h), angle)
    }

    #[test]
    fn test_linspace_endpoints() {
        let values: Vec<f32> = linspace(0.1, 0.05, 30).collect();
        assert_eq!(values.len(), 30);
        assert_eq!(values[0], 0.1);
        assert_eq!(values[29], 0.05);
        assert!(values.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_square_moves_towards_top_corner() {
        let pos = calculate_decal_position(&RustPrimitives, &rect(100.0, 100.0, 80.0, 80.0, 0.0), 0.1).unwrap();
        assert_eq!(pos, Point::new(96, 96));
    }

    #[test]
    fn test_large_offset_backs_off_inside() {
        let r = rect(100.0, 100.0, 80.0, 80.0, 0.0);
        // 1.5x the corner vector lands outside; the search walks back in
        let pos = calculate_decal_position(&RustPrimitives, &r, 1.5).unwrap();
        let corners = box_points(&r).unwrap().truncated();
        assert!(point_polygon_test(corners.points(), Point2f::from(pos)) >= 0.0);
        assert_ne!(pos, Point::new(100, 100));
    }

    #[test]
    fn test_fractional_center_tests_pixel_corners() {
        let r = rect(101.7, 87.3, 23.0, 61.0, -17.0);
        assert_eq!(calculate_decal_position(&RustPrimitives, &r, 0.1).unwrap(), Point::new(101, 83));

        // top corner (103.78, 54.77) truncates to (103, 54), which is on the outline
        let pixel_corners = box_points(&r).unwrap().truncated();
        assert_eq!(pixel_corners.0[1], Point2f::new(103.0, 54.0));
        let pos = calculate_decal_position(&RustPrimitives, &r, 1.0).unwrap();
        assert_eq!(pos, Point::new(103, 54));
        assert_eq!(point_polygon_test(pixel_corners.points(), Point2f::from(pos)), 0.0);
    }

    #[test]
    fn test_degenerate_rect_returns_center() {
        let pos = calculate_decal_position(&RustPrimitives, &rect(50.7, 20.2, 0.5, 0.5, 0.0), 0.1).unwrap();
        assert_eq!(pos, Point::new(50, 20));
    }

    #[test]
    fn test_missing_corners_returns_center() {
        let pos = calculate_decal_position(&RustPrimitives, &rect(30.0, 40.0, f32::INFINITY, 10.0, 0.0), 0.1).unwrap();
        assert_eq!(pos, Point::new(30, 40));
    }

    #[test]
    fn test_face_offsets() {
        let r = rect(100.0, 100.0, 80.0, 40.0, -10.0);
        assert_eq!(calculate_decal_position_on_face(&r, Face::Top, 0.1), Point::new(100, 92));
        assert_eq!(calculate_decal_position_on_face(&r, Face::Bottom, 0.1), Point::new(100, 108));
        assert_eq!(calculate_decal_position_on_face(&r, Face::Left, 0.1), Point::new(92, 100));
        assert_eq!(calculate_decal_position_on_face(&r, Face::Right, 0.1), Point::new(108, 100));
        assert_eq!(calculate_decal_position_on_face(&r, Face::from("nowhere"), 0.1), Point::new(100, 92));
    }

    proptest! {
        #[test]
        fn prop_position_inside_box(
            cx in 50.0f32..400.0,
            cy in 50.0f32..400.0,
            w in 0.0f32..200.0,
            h in 0.0f32..200.0,
            angle in -90.0f32..0.0,
            offset in 0.0f32..1.0,
        ) {
            let r = rect(cx, cy, w, h, angle);
            let pos = calculate_decal_position(&RustPrimitives, &r, offset).unwrap();
            if pos != r.center_px() {
                let corners = box_points(&r).unwrap().truncated();
                prop_assert!(point_polygon_test(corners.points(), Point2f::from(pos)) >= 0.0);
            }
        }
    }
}
