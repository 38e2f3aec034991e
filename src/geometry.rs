//! Geometric value types and the pure Rust algorithms behind the default backend.
//!
//! Everything here works on plain coordinates; raster access lives in
//! `image_impl`.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// Integer pixel coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2f {
    pub x: f32,
    pub y: f32,
}

impl Point2f {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<Point> for Point2f {
    fn from(p: Point) -> Self {
        Point2f::new(p.x as f32, p.y as f32)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size2f {
    pub width: f32,
    pub height: f32,
}

impl Size2f {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Minimum-area bounding rectangle of a contour.
///
/// `angle` is in degrees and follows the convention of the backend that
/// produced the rectangle. The pure Rust backend reports angles in
/// `[-90, 0)`, swapping width and height as needed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RotatedRect {
    pub center: Point2f,
    pub size: Size2f,
    pub angle: f32,
}

impl RotatedRect {
    pub fn new(center: Point2f, size: Size2f, angle: f32) -> Self {
        Self {
            center,
            size,
            angle,
        }
    }

    /// Center truncated towards zero to a pixel coordinate.
    pub fn center_px(&self) -> Point {
        Point::new(self.center.x as i32, self.center.y as i32)
    }

    fn is_finite(&self) -> bool {
        self.center.x.is_finite()
            && self.center.y.is_finite()
            && self.size.width.is_finite()
            && self.size.height.is_finite()
            && self.angle.is_finite()
    }
}

/// The four corners of a rotated rectangle in cyclic order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxCorners(pub [Point2f; 4]);

impl BoxCorners {
    pub fn points(&self) -> &[Point2f; 4] {
        &self.0
    }

    /// Corners truncated towards zero, as used when drawing the outline.
    pub fn to_pixels(&self) -> [Point; 4] {
        self.0.map(|p| Point::new(p.x as i32, p.y as i32))
    }

    /// Same corners with each coordinate truncated towards zero.
    pub fn truncated(&self) -> BoxCorners {
        BoxCorners(self.0.map(|p| Point2f::new(p.x.trunc(), p.y.trunc())))
    }

    /// Edge vectors `corner[(i + 1) % 4] - corner[i]`.
    pub fn edges(&self) -> [(f32, f32); 4] {
        let c = &self.0;
        [0, 1, 2, 3].map(|i| {
            let a = c[i];
            let b = c[(i + 1) % 4];
            (b.x - a.x, b.y - a.y)
        })
    }
}

/// Closed boundary of integer points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contour {
    pub points: Vec<Point>,
}

impl Contour {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Absolute polygon area using the shoelace formula.
pub fn contour_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let n = points.len();
    let mut area = 0.0f64;
    for i in 0..n {
        let j = (i + 1) % n;
        let (x1, y1) = (points[i].x as f64, points[i].y as f64);
        let (x2, y2) = (points[j].x as f64, points[j].y as f64);
        area += x1 * y2 - x2 * y1;
    }

    (area * 0.5).abs()
}

/// Convex hull via Andrew's monotone chain. Collinear points are dropped.
fn convex_hull(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    });
    pts.dedup();

    if pts.len() <= 2 {
        return pts;
    }

    let cross = |o: (f64, f64), a: (f64, f64), b: (f64, f64)| {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    };

    let mut lower: Vec<(f64, f64)> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<(f64, f64)> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Brings an angle into `[-90, 0)`, swapping the sides once per quarter turn.
fn normalize_rect(center: (f64, f64), width: f64, height: f64, angle: f64) -> RotatedRect {
    let (mut w, mut h, mut a) = (width, height, angle);
    while a >= 0.0 {
        a -= 90.0;
        std::mem::swap(&mut w, &mut h);
    }
    while a < -90.0 {
        a += 90.0;
        std::mem::swap(&mut w, &mut h);
    }

    RotatedRect::new(
        Point2f::new(center.0 as f32, center.1 as f32),
        Size2f::new(w as f32, h as f32),
        a as f32,
    )
}

/// Minimum-area rotated rectangle around a point set (rotating calipers over
/// the convex hull). Returns `None` for an empty set.
pub fn min_area_rect(points: &[Point]) -> Option<RotatedRect> {
    if points.is_empty() {
        return None;
    }

    let pts: Vec<(f64, f64)> = points.iter().map(|p| (p.x as f64, p.y as f64)).collect();
    let hull = convex_hull(&pts);

    match hull.len() {
        0 => None,
        1 => Some(normalize_rect(hull[0], 0.0, 0.0, 0.0)),
        2 => {
            let (a, b) = (hull[0], hull[1]);
            let (dx, dy) = (b.0 - a.0, b.1 - a.1);
            let center = ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0);
            Some(normalize_rect(
                center,
                dx.hypot(dy),
                0.0,
                dy.atan2(dx).to_degrees(),
            ))
        }
        n => {
            let mut best: Option<(f64, RotatedRect)> = None;

            for i in 0..n {
                let p1 = hull[i];
                let p2 = hull[(i + 1) % n];
                let (ex, ey) = (p2.0 - p1.0, p2.1 - p1.1);
                let len = ex.hypot(ey);
                if len < 1e-12 {
                    continue;
                }

                let (ux, uy) = (ex / len, ey / len);
                let (vx, vy) = (-uy, ux);

                let mut min_u = f64::MAX;
                let mut max_u = f64::MIN;
                let mut min_v = f64::MAX;
                let mut max_v = f64::MIN;
                for &(x, y) in &hull {
                    let u = x * ux + y * uy;
                    let v = x * vx + y * vy;
                    min_u = min_u.min(u);
                    max_u = max_u.max(u);
                    min_v = min_v.min(v);
                    max_v = max_v.max(v);
                }

                let width = max_u - min_u;
                let height = max_v - min_v;
                let area = width * height;

                if best.as_ref().map_or(true, |(best_area, _)| area < *best_area) {
                    let cu = (min_u + max_u) / 2.0;
                    let cv = (min_v + max_v) / 2.0;
                    let center = (cu * ux + cv * vx, cu * uy + cv * vy);
                    let angle = uy.atan2(ux).to_degrees();
                    best = Some((area, normalize_rect(center, width, height, angle)));
                }
            }

            best.map(|(_, rect)| rect)
        }
    }
}

/// Corners of a rotated rectangle: the local corners (-w,-h), (w,-h), (w,h),
/// (-w,h) (half sizes) rotated by `angle` about the center.
///
/// Returns `None` when any field of the rectangle is not finite.
pub fn box_points(rect: &RotatedRect) -> Option<BoxCorners> {
    if !rect.is_finite() {
        return None;
    }

    let angle = (rect.angle as f64).to_radians();
    let (sin_a, cos_a) = angle.sin_cos();
    let w = rect.size.width as f64 / 2.0;
    let h = rect.size.height as f64 / 2.0;
    let cx = rect.center.x as f64;
    let cy = rect.center.y as f64;

    let corners = [(-w, -h), (w, -h), (w, h), (-w, h)];

    Some(BoxCorners(corners.map(|(dx, dy)| {
        Point2f::new(
            (cx + dx * cos_a - dy * sin_a) as f32,
            (cy + dx * sin_a + dy * cos_a) as f32,
        )
    })))
}

fn segment_distance(px: f64, py: f64, ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    (px - cx).hypot(py - cy)
}

const EDGE_EPSILON: f64 = 1e-7;

/// Signed distance from `point` to the polygon boundary: positive inside,
/// zero on an edge, negative outside.
pub fn point_polygon_test(polygon: &[Point2f], point: Point2f) -> f64 {
    if polygon.is_empty() {
        return f64::NEG_INFINITY;
    }

    let (px, py) = (point.x as f64, point.y as f64);
    let mut inside = false;
    let mut min_dist = f64::INFINITY;

    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (xi, yi) = (polygon[i].x as f64, polygon[i].y as f64);
        let (xj, yj) = (polygon[j].x as f64, polygon[j].y as f64);

        if ((yi > py) != (yj > py)) && (px < (xj - xi) * (py - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        min_dist = min_dist.min(segment_distance(px, py, xi, yi, xj, yj));
        j = i;
    }

    if min_dist <= EDGE_EPSILON {
        0.0
    } else if inside {
        min_dist
    } else {
        -min_dist
    }
}

/// Rotation about `center` by `angle` degrees (counter-clockwise on screen)
/// with uniform `scale`, as a homogeneous 2D affine matrix.
#[rustfmt::skip]
pub fn rotation_matrix_2d(center: (f64, f64), angle: f64, scale: f64) -> Matrix3<f64> {
    let (sin_a, cos_a) = angle.to_radians().sin_cos();
    let alpha = scale * cos_a;
    let beta = scale * sin_a;
    let (cx, cy) = center;

    Matrix3::new(
        alpha, beta, (1.0 - alpha) * cx - beta * cy,
        -beta, alpha, beta * cx + (1.0 - alpha) * cy,
        0.0, 0.0, 1.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_points(x0: i32, y0: i32, x1: i32, y1: i32) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    #[test]
    fn test_contour_area_rectangle() {
        assert_eq!(contour_area(&rect_points(0, 0, 10, 20)), 200.0);
        assert_eq!(contour_area(&[Point::new(0, 0), Point::new(5, 5)]), 0.0);
    }

    #[test]
    fn test_min_area_rect_axis_aligned() {
        let rect = min_area_rect(&rect_points(10, 20, 110, 70)).unwrap();
        assert!((rect.center.x - 60.0).abs() < 1e-4);
        assert!((rect.center.y - 45.0).abs() < 1e-4);
        assert!(rect.angle >= -90.0 && rect.angle < 0.0);

        let mut sides = [rect.size.width, rect.size.height];
        sides.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((sides[0] - 50.0).abs() < 1e-3);
        assert!((sides[1] - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_min_area_rect_rotated_square() {
        // Diamond with diagonals of 40 px
        let pts = vec![
            Point::new(50, 30),
            Point::new(70, 50),
            Point::new(50, 70),
            Point::new(30, 50),
        ];
        let rect = min_area_rect(&pts).unwrap();
        let side = 20.0 * std::f32::consts::SQRT_2;
        assert!((rect.size.width - side).abs() < 1e-3);
        assert!((rect.size.height - side).abs() < 1e-3);
        assert!((rect.angle + 45.0).abs() < 1e-3);
    }

    #[test]
    fn test_min_area_rect_degenerate_inputs() {
        assert!(min_area_rect(&[]).is_none());

        let single = min_area_rect(&[Point::new(3, 4)]).unwrap();
        assert_eq!(single.center, Point2f::new(3.0, 4.0));
        assert_eq!(single.size, Size2f::new(0.0, 0.0));

        let line = min_area_rect(&[Point::new(0, 0), Point::new(5, 0), Point::new(10, 0)]).unwrap();
        assert!((line.size.width.max(line.size.height) - 10.0).abs() < 1e-4);
        assert_eq!(line.size.width.min(line.size.height), 0.0);
    }

    #[test]
    fn test_box_points_roundtrip_through_min_area_rect() {
        let rect = min_area_rect(&rect_points(0, 0, 100, 50)).unwrap();
        let corners = box_points(&rect).unwrap();
        for p in corners.points() {
            let on_x = p.x.abs() < 1e-3 || (p.x - 100.0).abs() < 1e-3;
            let on_y = p.y.abs() < 1e-3 || (p.y - 50.0).abs() < 1e-3;
            assert!(on_x && on_y, "unexpected corner {:?}", p);
        }
    }

    #[test]
    fn test_truncated_corners_round_towards_zero() {
        let corners = BoxCorners([
            Point2f::new(3.9, -0.5),
            Point2f::new(-2.7, 8.2),
            Point2f::new(10.0, 0.99),
            Point2f::new(-0.1, -7.8),
        ]);
        assert_eq!(
            corners.truncated(),
            BoxCorners([
                Point2f::new(3.0, 0.0),
                Point2f::new(-2.0, 8.0),
                Point2f::new(10.0, 0.0),
                Point2f::new(0.0, -7.0),
            ])
        );
    }

    #[test]
    fn test_box_points_rejects_non_finite() {
        let rect = RotatedRect::new(Point2f::new(0.0, 0.0), Size2f::new(f32::NAN, 1.0), 0.0);
        assert!(box_points(&rect).is_none());
    }

    #[test]
    fn test_point_polygon_test_signs() {
        let square = [
            Point2f::new(0.0, 0.0),
            Point2f::new(10.0, 0.0),
            Point2f::new(10.0, 10.0),
            Point2f::new(0.0, 10.0),
        ];
        assert!((point_polygon_test(&square, Point2f::new(5.0, 5.0)) - 5.0).abs() < 1e-9);
        assert_eq!(point_polygon_test(&square, Point2f::new(10.0, 4.0)), 0.0);
        assert_eq!(point_polygon_test(&square, Point2f::new(0.0, 0.0)), 0.0);
        assert!((point_polygon_test(&square, Point2f::new(13.0, 5.0)) + 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_rotation_matrix_keeps_center_fixed() {
        let m = rotation_matrix_2d((20.0, 10.0), 33.0, 1.0);
        let p = m * nalgebra::Vector3::new(20.0, 10.0, 1.0);
        assert!((p.x - 20.0).abs() < 1e-9);
        assert!((p.y - 10.0).abs() < 1e-9);

        // 90 degrees maps +x onto -y (counter-clockwise on screen)
        let q = rotation_matrix_2d((0.0, 0.0), 90.0, 1.0) * nalgebra::Vector3::new(1.0, 0.0, 1.0);
        assert!(q.x.abs() < 1e-9);
        assert!((q.y + 1.0).abs() < 1e-9);
    }
}
