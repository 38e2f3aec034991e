//! Decal preparation and alpha compositing.

use std::path::Path;

use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut};
use tracing::warn;

use crate::error::{DecalError, Result};
use crate::geometry::rotation_matrix_2d;
use crate::image_impl::{BorderMode, Primitives};
use crate::placement::Position;

pub const MARKER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const MARKER_RADIUS: i32 = 8;
pub const MARKER_RING_RADIUS: i32 = 12;

/// Decal image with colour and alpha kept as separate planes of equal size.
#[derive(Debug, Clone, PartialEq)]
pub struct Decal {
    rgb: RgbImage,
    alpha: Option<GrayImage>,
}

impl Decal {
    pub fn new(rgb: RgbImage, alpha: Option<GrayImage>) -> Result<Self> {
        if let Some(a) = &alpha {
            if a.dimensions() != rgb.dimensions() {
                return Err(DecalError::ImageError(format!(
                    "decal alpha is {:?} but colour is {:?}",
                    a.dimensions(),
                    rgb.dimensions()
                )));
            }
        }
        Ok(Self { rgb, alpha })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|source| DecalError::InputUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_dynamic(img))
    }

    pub fn from_dynamic(img: DynamicImage) -> Self {
        if !img.color().has_alpha() {
            return Self {
                rgb: img.to_rgb8(),
                alpha: None,
            };
        }

        let rgba = img.to_rgba8();
        let (w, h) = rgba.dimensions();
        let mut rgb = RgbImage::new(w, h);
        let mut alpha = GrayImage::new(w, h);
        for (x, y, px) in rgba.enumerate_pixels() {
            rgb.put_pixel(x, y, Rgb([px[0], px[1], px[2]]));
            alpha.put_pixel(x, y, image::Luma([px[3]]));
        }
        Self {
            rgb,
            alpha: Some(alpha),
        }
    }

    pub fn rgb(&self) -> &RgbImage {
        &self.rgb
    }

    pub fn alpha(&self) -> Option<&GrayImage> {
        self.alpha.as_ref()
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }
}

/// Open the decal at `path`, or `None` with a warning when it is missing or
/// unreadable.
pub fn load_decal(path: Option<&Path>) -> Option<Decal> {
    let path = path?;
    if !path.exists() {
        warn!(path = %path.display(), "decal not found, using default marker");
        return None;
    }
    match Decal::open(path) {
        Ok(decal) => Some(decal),
        Err(err) => {
            warn!(error = %err, "could not read decal, using default marker");
            None
        }
    }
}

/// Size of the canvas that holds a `width` x `height` image rotated by
/// `angle` degrees without cropping.
pub fn rotated_bounds(width: u32, height: u32, angle: f32) -> (u32, u32) {
    let theta = (angle as f64).to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let (w, h) = (width as f64, height as f64);
    let new_w = (h * sin + w * cos) as u32;
    let new_h = (h * cos + w * sin) as u32;
    (new_w.max(1), new_h.max(1))
}

/// Scale and rotate a decal. Positive angles turn counter-clockwise on screen.
pub fn prepare_decal<P: Primitives>(prims: &P, decal: &Decal, scale: f32, angle: Option<f32>) -> Result<Decal> {
    let mut rgb = decal.rgb.clone();
    let mut alpha = decal.alpha.clone();

    if scale != 1.0 {
        let w = ((rgb.width() as f32 * scale) as u32).max(1);
        let h = ((rgb.height() as f32 * scale) as u32).max(1);
        rgb = prims.resize_rgb(&rgb, (w, h))?;
        alpha = alpha.map(|a| prims.resize_luma(&a, (w, h))).transpose()?;
    }

    if let Some(theta) = angle.filter(|a| *a != 0.0) {
        let (w, h) = rgb.dimensions();
        let (cx, cy) = ((w / 2) as f64, (h / 2) as f64);
        let (new_w, new_h) = rotated_bounds(w, h, theta);

        let mut m = rotation_matrix_2d((cx, cy), theta as f64, 1.0);
        m[(0, 2)] += new_w as f64 / 2.0 - cx;
        m[(1, 2)] += new_h as f64 / 2.0 - cy;

        let border = BorderMode::Constant(0);
        rgb = prims.warp_affine_rgb(&rgb, &m, (new_w, new_h), border)?;
        alpha = alpha
            .map(|a| prims.warp_affine_luma(&a, &m, (new_w, new_h), border))
            .transpose()?;
    }

    Decal::new(rgb, alpha)
}

/// Paste `decal` centred at `position`, clipped to the canvas.
pub fn blend_at(canvas: &mut RgbImage, decal: &Decal, position: Position) {
    let (sw, sh) = (decal.width() as i64, decal.height() as i64);
    let (img_w, img_h) = (canvas.width() as i64, canvas.height() as i64);
    let x1 = position.x as i64 - sw / 2;
    let y1 = position.y as i64 - sh / 2;
    let x2 = x1 + sw;
    let y2 = y1 + sh;

    if x2 < 0 || y2 < 0 || x1 >= img_w || y1 >= img_h {
        return;
    }

    for y in y1.max(0)..y2.min(img_h) {
        for x in x1.max(0)..x2.min(img_w) {
            let (dx, dy) = ((x - x1) as u32, (y - y1) as u32);
            let fg = decal.rgb.get_pixel(dx, dy);
            let bg = canvas.get_pixel_mut(x as u32, y as u32);
            match &decal.alpha {
                Some(alpha) => {
                    let a = alpha.get_pixel(dx, dy)[0] as f32 / 255.0;
                    for c in 0..3 {
                        bg[c] = (bg[c] as f32 * (1.0 - a) + fg[c] as f32 * a) as u8;
                    }
                }
                None => *bg = *fg,
            }
        }
    }
}

/// Red filled disc with a surrounding ring.
pub fn draw_fallback_marker(canvas: &mut RgbImage, position: Position) {
    let center = (position.x, position.y);
    draw_filled_circle_mut(canvas, center, MARKER_RADIUS, MARKER_COLOR);
    // 2 px stroke straddling the ring radius
    for radius in MARKER_RING_RADIUS - 1..=MARKER_RING_RADIUS + 1 {
        draw_hollow_circle_mut(canvas, center, radius, MARKER_COLOR);
    }
}

/// Composite `decal` onto `canvas`, or draw the fallback marker without one.
pub fn composite<P: Primitives>(
    prims: &P,
    canvas: &mut RgbImage,
    decal: Option<&Decal>,
    position: Position,
    angle: Option<f32>,
    scale: f32,
) -> Result<()> {
    match decal {
        Some(decal) => {
            let prepared = prepare_decal(prims, decal, scale, angle)?;
            blend_at(canvas, &prepared, position);
        }
        None => draw_fallback_marker(canvas, position),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::image_impl::RustPrimitives;
    use image::{Luma, Rgba, RgbaImage};

    fn solid_decal(w: u32, h: u32, color: [u8; 3], alpha: Option<u8>) -> Decal {
        Decal::new(
            RgbImage::from_pixel(w, h, Rgb(color)),
            alpha.map(|a| GrayImage::from_pixel(w, h, Luma([a]))),
        )
        .unwrap()
    }

    #[test]
    fn test_opaque_decal_replaces_pixels() {
        let mut canvas = RgbImage::from_pixel(50, 50, Rgb([10, 20, 30]));
        let decal = solid_decal(10, 6, [200, 100, 50], Some(255));
        composite(&RustPrimitives, &mut canvas, Some(&decal), Point::new(25, 25), None, 1.0).unwrap();

        // top-left = (25 - 5, 25 - 3)
        assert_eq!(*canvas.get_pixel(20, 22), Rgb([200, 100, 50]));
        assert_eq!(*canvas.get_pixel(29, 27), Rgb([200, 100, 50]));
        assert_eq!(*canvas.get_pixel(19, 22), Rgb([10, 20, 30]));
        assert_eq!(*canvas.get_pixel(30, 27), Rgb([10, 20, 30]));
    }

    #[test]
    fn test_transparent_decal_leaves_background() {
        let original = RgbImage::from_fn(40, 40, |x, y| Rgb([x as u8, y as u8, 7]));
        let mut canvas = original.clone();
        let decal = solid_decal(12, 12, [255, 255, 255], Some(0));
        composite(&RustPrimitives, &mut canvas, Some(&decal), Point::new(20, 20), Some(33.0), 1.0).unwrap();
        assert_eq!(canvas, original);
    }

    #[test]
    fn test_partial_alpha_truncates() {
        let mut canvas = RgbImage::from_pixel(10, 10, Rgb([100, 100, 100]));
        let decal = solid_decal(2, 2, [201, 201, 201], Some(128));
        blend_at(&mut canvas, &decal, Point::new(5, 5));
        // 100 * (1 - 128/255) + 201 * 128/255 = 150.698...
        assert_eq!(*canvas.get_pixel(4, 4), Rgb([150, 150, 150]));
    }

    #[test]
    fn test_decal_without_alpha_is_copied() {
        let mut canvas = RgbImage::new(20, 20);
        let decal = solid_decal(4, 4, [9, 8, 7], None);
        blend_at(&mut canvas, &decal, Point::new(10, 10));
        assert_eq!(*canvas.get_pixel(8, 8), Rgb([9, 8, 7]));
        assert_eq!(*canvas.get_pixel(11, 11), Rgb([9, 8, 7]));
        assert_eq!(*canvas.get_pixel(12, 12), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_out_of_bounds_is_ignored() {
        let original = RgbImage::from_pixel(20, 20, Rgb([1, 2, 3]));
        let mut canvas = original.clone();
        let decal = solid_decal(4, 4, [255, 0, 0], None);
        blend_at(&mut canvas, &decal, Point::new(100, 5));
        blend_at(&mut canvas, &decal, Point::new(5, -50));
        assert_eq!(canvas, original);
    }

    #[test]
    fn test_clipped_at_canvas_corner() {
        let mut canvas = RgbImage::new(20, 20);
        let decal = solid_decal(10, 10, [255, 255, 255], Some(255));
        blend_at(&mut canvas, &decal, Point::new(0, 0));
        // covers x, y in -5..5
        assert_eq!(*canvas.get_pixel(0, 0), Rgb([255, 255, 255]));
        assert_eq!(*canvas.get_pixel(4, 4), Rgb([255, 255, 255]));
        assert_eq!(*canvas.get_pixel(5, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_rotated_bounds() {
        assert_eq!(rotated_bounds(100, 50, 90.0), (50, 100));
        assert_eq!(rotated_bounds(100, 50, 45.0), (106, 106));
        assert_eq!(rotated_bounds(100, 50, 0.0), (100, 50));
    }

    #[test]
    fn test_prepare_scales_and_rotates_both_planes() {
        let decal = solid_decal(40, 20, [50, 60, 70], Some(255));
        let prepared = prepare_decal(&RustPrimitives, &decal, 0.5, Some(90.0)).unwrap();
        assert_eq!(prepared.rgb().dimensions(), (10, 20));
        let alpha = prepared.alpha().unwrap();
        assert_eq!(alpha.dimensions(), (10, 20));
        assert_eq!(alpha.get_pixel(5, 10)[0], 255);
    }

    #[test]
    fn test_prepare_rotation_pads_with_transparent_black() {
        let decal = solid_decal(20, 20, [255, 255, 255], Some(255));
        let prepared = prepare_decal(&RustPrimitives, &decal, 1.0, Some(45.0)).unwrap();
        assert_eq!(prepared.rgb().dimensions(), (28, 28));
        assert_eq!(*prepared.rgb().get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(prepared.alpha().unwrap().get_pixel(0, 0)[0], 0);
        assert_eq!(prepared.alpha().unwrap().get_pixel(14, 14)[0], 255);
    }

    #[test]
    fn test_prepare_scale_never_collapses() {
        let decal = solid_decal(2, 2, [1, 1, 1], None);
        let prepared = prepare_decal(&RustPrimitives, &decal, 0.1, None).unwrap();
        assert_eq!(prepared.rgb().dimensions(), (1, 1));
    }

    #[test]
    fn test_missing_decal_draws_marker() {
        let mut canvas = RgbImage::new(60, 60);
        composite(&RustPrimitives, &mut canvas, None, Point::new(30, 30), Some(10.0), 0.3).unwrap();
        assert_eq!(*canvas.get_pixel(30, 30), MARKER_COLOR);
        assert_eq!(*canvas.get_pixel(30 + 10, 30), Rgb([0, 0, 0]));
        for r in 11..=13 {
            assert_eq!(*canvas.get_pixel(30 + r, 30), MARKER_COLOR, "radius {}", r);
            assert_eq!(*canvas.get_pixel(30, 30 - r), MARKER_COLOR, "radius {}", r);
        }
        assert_eq!(*canvas.get_pixel(30 + 14, 30), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_mismatched_alpha_is_rejected() {
        let err = Decal::new(RgbImage::new(10, 6), Some(GrayImage::new(6, 10))).unwrap_err();
        assert!(matches!(err, DecalError::ImageError(_)));
        assert!(Decal::new(RgbImage::new(10, 6), Some(GrayImage::new(10, 6))).is_ok());
        assert!(Decal::new(RgbImage::new(10, 6), None).is_ok());
    }

    #[test]
    fn test_from_dynamic_splits_alpha() {
        let rgba = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4]));
        let decal = Decal::from_dynamic(DynamicImage::ImageRgba8(rgba));
        assert_eq!(*decal.rgb().get_pixel(2, 1), Rgb([1, 2, 3]));
        assert_eq!(decal.alpha().unwrap().get_pixel(2, 1)[0], 4);

        let rgb = Decal::from_dynamic(DynamicImage::ImageRgb8(RgbImage::new(3, 2)));
        assert!(rgb.alpha().is_none());
    }

    #[test]
    fn test_load_decal_missing_path() {
        assert!(load_decal(None).is_none());
        assert!(load_decal(Some(Path::new("/definitely/not/here/decal.png"))).is_none());
    }
}
