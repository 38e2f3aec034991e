use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

use crate::compositor::{composite, Decal};
use crate::error::Result;
use crate::geometry::{BoxCorners, Point, RotatedRect};
use crate::image_impl::Primitives;
use crate::placement::Position;
use crate::types::CompositeConfig;

pub const AXIS_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const OUTLINE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const LINE_THICKNESS: i32 = 2;

/// Line of `thickness` pixels, stacked across the dominant direction.
fn draw_thick_line(canvas: &mut RgbImage, start: Point, end: Point, thickness: i32, color: Rgb<u8>) {
    let horizontal = (end.x - start.x).abs() >= (end.y - start.y).abs();
    let first = -(thickness / 2);
    for offset in first..first + thickness.max(1) {
        let (ox, oy) = if horizontal { (0, offset) } else { (offset, 0) };
        draw_line_segment_mut(
            canvas,
            ((start.x + ox) as f32, (start.y + oy) as f32),
            ((end.x + ox) as f32, (end.y + oy) as f32),
            color,
        );
    }
}

/// Horizontal and vertical lines through `center`, spanning the image.
pub fn draw_axes(canvas: &mut RgbImage, center: Point) {
    let (w, h) = (canvas.width() as i32, canvas.height() as i32);
    draw_thick_line(canvas, Point::new(0, center.y), Point::new(w, center.y), LINE_THICKNESS, AXIS_COLOR);
    draw_thick_line(canvas, Point::new(center.x, 0), Point::new(center.x, h), LINE_THICKNESS, AXIS_COLOR);
}

/// Closed outline through the truncated corners.
pub fn draw_box_outline(canvas: &mut RgbImage, corners: &BoxCorners) {
    let pixels = corners.to_pixels();
    for i in 0..pixels.len() {
        let next = pixels[(i + 1) % pixels.len()];
        draw_thick_line(canvas, pixels[i], next, LINE_THICKNESS, OUTLINE_COLOR);
    }
}

/// Copy of `image` with axes, box outline and the decal (or marker) drawn on.
pub fn annotate_image<P: Primitives>(
    prims: &P,
    image: &RgbImage,
    rect: &RotatedRect,
    position: Position,
    angle: f32,
    decal: Option<&Decal>,
    cfg: &CompositeConfig,
) -> Result<RgbImage> {
    let mut annotated = image.clone();

    if cfg.draw_axes {
        draw_axes(&mut annotated, rect.center_px());
    }
    if cfg.draw_outline {
        if let Some(corners) = prims.box_points(rect) {
            draw_box_outline(&mut annotated, &corners);
        }
    }

    let rotation = cfg.rotate_decal.then_some(angle);
    composite(prims, &mut annotated, decal, position, rotation, cfg.decal_scale)?;

    Ok(annotated)
}
