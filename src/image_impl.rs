//! Image primitives abstraction supporting both pure Rust and OpenCV backends
//!
//! The four core stages only talk to raster data through [`Primitives`], so a
//! different image-processing library can be swapped in without touching them.

use image::{GrayImage, RgbImage};
use nalgebra::Matrix3;

use crate::error::Result;
use crate::geometry::{BoxCorners, Contour, Point2f, RotatedRect};

#[cfg(feature = "use-opencv")]
pub use opencv_impl::OpenCvPrimitives;
pub use rust_impl::RustPrimitives;

/// Backend selected by the `use-opencv` feature.
#[cfg(feature = "use-opencv")]
pub type DefaultPrimitives = OpenCvPrimitives;
#[cfg(not(feature = "use-opencv"))]
pub type DefaultPrimitives = RustPrimitives;

/// How pixels sampled outside the source are filled during a warp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderMode {
    /// Every channel takes this value.
    Constant(u8),
    /// Nearest edge pixel.
    Replicate,
}

/// Raster and geometry operations the pipeline depends on.
pub trait Primitives: Send + Sync {
    fn to_grayscale(&self, image: &RgbImage) -> Result<GrayImage>;

    /// `sigma <= 0` derives sigma from the kernel size.
    fn gaussian_blur(&self, image: &GrayImage, kernel_size: u32, sigma: f32) -> Result<GrayImage>;

    /// Binary (0/255) edge map.
    fn canny(&self, image: &GrayImage, low: f32, high: f32) -> Result<GrayImage>;

    /// Outermost boundaries only; holes and nested shapes are dropped.
    fn external_contours(&self, edges: &GrayImage) -> Result<Vec<Contour>>;

    fn approx_polygon(&self, contour: &Contour, epsilon: f64, closed: bool) -> Result<Contour>;

    fn contour_area(&self, contour: &Contour) -> Result<f64>;

    fn arc_length(&self, contour: &Contour, closed: bool) -> Result<f64>;

    fn min_area_rect(&self, contour: &Contour) -> Result<Option<RotatedRect>>;

    /// `None` when corners cannot be derived from the rectangle.
    fn box_points(&self, rect: &RotatedRect) -> Option<BoxCorners>;

    /// Signed distance: positive inside, zero on the boundary, negative outside.
    fn point_polygon_test(&self, polygon: &[Point2f], point: Point2f) -> Result<f64>;

    /// `matrix` maps source coordinates to destination coordinates.
    fn warp_affine_rgb(
        &self,
        image: &RgbImage,
        matrix: &Matrix3<f64>,
        size: (u32, u32),
        border: BorderMode,
    ) -> Result<RgbImage>;

    fn warp_affine_luma(
        &self,
        image: &GrayImage,
        matrix: &Matrix3<f64>,
        size: (u32, u32),
        border: BorderMode,
    ) -> Result<GrayImage>;

    /// Bilinear resize.
    fn resize_rgb(&self, image: &RgbImage, size: (u32, u32)) -> Result<RgbImage>;

    fn resize_luma(&self, image: &GrayImage, size: (u32, u32)) -> Result<GrayImage>;
}

/// OpenCV's sigma for a given kernel size when none is specified.
pub(crate) fn sigma_for_kernel(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

// Pure Rust implementation
mod rust_impl {
    use super::{sigma_for_kernel, BorderMode, Primitives};
    use crate::error::{DecalError, Result};
    use crate::geometry::{self, BoxCorners, Contour, Point, Point2f, RotatedRect};
    use image::imageops::FilterType;
    use image::{GrayImage, ImageBuffer, Pixel, RgbImage};
    use imageproc::contours::{find_contours, BorderType};
    use imageproc::geometry::{approximate_polygon_dp, arc_length};
    use nalgebra::Matrix3;

    /// Backend built on `image`, `imageproc` and `nalgebra`.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct RustPrimitives;

    fn to_ip_points(contour: &Contour) -> Vec<imageproc::point::Point<i32>> {
        contour
            .points
            .iter()
            .map(|p| imageproc::point::Point::new(p.x, p.y))
            .collect()
    }

    fn from_ip_points(points: &[imageproc::point::Point<i32>]) -> Contour {
        Contour::from_points(points.iter().map(|p| Point::new(p.x, p.y)).collect())
    }

    fn invert_affine(m: &Matrix3<f64>) -> Result<Matrix3<f64>> {
        m.try_inverse()
            .ok_or_else(|| DecalError::ImageError("Matrix is not invertible".to_string()))
    }

    /// Inverse-mapped bilinear warp over any 8-bit pixel type.
    fn warp_affine<P>(
        src: &ImageBuffer<P, Vec<u8>>,
        matrix: &Matrix3<f64>,
        size: (u32, u32),
        border: BorderMode,
    ) -> Result<ImageBuffer<P, Vec<u8>>>
    where
        P: Pixel<Subpixel = u8>,
    {
        let m_inv = invert_affine(matrix)?;
        let (m00, m01, m02) = (m_inv[(0, 0)], m_inv[(0, 1)], m_inv[(0, 2)]);
        let (m10, m11, m12) = (m_inv[(1, 0)], m_inv[(1, 1)], m_inv[(1, 2)]);

        let channels = P::CHANNEL_COUNT as usize;
        let src_w = src.width() as i64;
        let src_h = src.height() as i64;
        let mut out = ImageBuffer::<P, Vec<u8>>::new(size.0, size.1);

        if src_w == 0 || src_h == 0 {
            if let BorderMode::Constant(value) = border {
                out.iter_mut().for_each(|c| *c = value);
            }
            return Ok(out);
        }

        let sample = |x: i64, y: i64, c: usize| -> f64 {
            if x >= 0 && x < src_w && y >= 0 && y < src_h {
                return src.get_pixel(x as u32, y as u32).channels()[c] as f64;
            }
            match border {
                BorderMode::Constant(value) => value as f64,
                BorderMode::Replicate => {
                    let cx = x.clamp(0, src_w - 1) as u32;
                    let cy = y.clamp(0, src_h - 1) as u32;
                    src.get_pixel(cx, cy).channels()[c] as f64
                }
            }
        };

        let mut buf = [0u8; 4];
        for y in 0..size.1 {
            let y_f = y as f64;
            for x in 0..size.0 {
                let x_f = x as f64;
                let sx = m00 * x_f + m01 * y_f + m02;
                let sy = m10 * x_f + m11 * y_f + m12;

                let x0 = sx.floor() as i64;
                let y0 = sy.floor() as i64;
                let fx = sx - x0 as f64;
                let fy = sy - y0 as f64;

                for (c, slot) in buf.iter_mut().enumerate().take(channels) {
                    let v = (1.0 - fx) * (1.0 - fy) * sample(x0, y0, c)
                        + fx * (1.0 - fy) * sample(x0 + 1, y0, c)
                        + (1.0 - fx) * fy * sample(x0, y0 + 1, c)
                        + fx * fy * sample(x0 + 1, y0 + 1, c);
                    *slot = v.round().clamp(0.0, 255.0) as u8;
                }

                out.put_pixel(x, y, *P::from_slice(&buf[..channels]));
            }
        }

        Ok(out)
    }

    impl Primitives for RustPrimitives {
        fn to_grayscale(&self, image: &RgbImage) -> Result<GrayImage> {
            Ok(image::imageops::grayscale(image))
        }

        fn gaussian_blur(&self, image: &GrayImage, kernel_size: u32, sigma: f32) -> Result<GrayImage> {
            let sigma = if sigma > 0.0 {
                sigma
            } else {
                sigma_for_kernel(kernel_size)
            };
            if sigma <= 0.0 {
                return Ok(image.clone());
            }
            Ok(imageproc::filter::gaussian_blur_f32(image, sigma))
        }

        fn canny(&self, image: &GrayImage, low: f32, high: f32) -> Result<GrayImage> {
            Ok(imageproc::edges::canny(image, low, high))
        }

        fn external_contours(&self, edges: &GrayImage) -> Result<Vec<Contour>> {
            Ok(find_contours::<i32>(edges)
                .into_iter()
                .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
                .map(|c| from_ip_points(&c.points))
                .collect())
        }

        fn approx_polygon(&self, contour: &Contour, epsilon: f64, closed: bool) -> Result<Contour> {
            if contour.len() < 3 || !(epsilon > 0.0) {
                return Ok(contour.clone());
            }
            let points = to_ip_points(contour);
            if !closed {
                return Ok(from_ip_points(&approximate_polygon_dp(&points, epsilon, false)));
            }

            // Split the loop at the vertex farthest from the start and simplify both chains.
            let start = points[0];
            let dist2 = |p: &imageproc::point::Point<i32>| {
                let dx = (p.x - start.x) as i64;
                let dy = (p.y - start.y) as i64;
                dx * dx + dy * dy
            };
            let split = (1..points.len())
                .max_by_key(|&i| dist2(&points[i]))
                .unwrap_or(0);
            if split == 0 {
                return Ok(Contour::from_points(vec![contour.points[0]]));
            }

            let mut tail = points[split..].to_vec();
            tail.push(start);
            let mut approx = approximate_polygon_dp(&points[..=split], epsilon, false);
            approx.pop();
            approx.extend(approximate_polygon_dp(&tail, epsilon, false));
            approx.dedup();
            if approx.len() > 1 && approx.first() == approx.last() {
                approx.pop();
            }
            Ok(from_ip_points(&approx))
        }

        fn contour_area(&self, contour: &Contour) -> Result<f64> {
            Ok(geometry::contour_area(&contour.points))
        }

        fn arc_length(&self, contour: &Contour, closed: bool) -> Result<f64> {
            if contour.len() < 2 {
                return Ok(0.0);
            }
            Ok(arc_length(&to_ip_points(contour), closed))
        }

        fn min_area_rect(&self, contour: &Contour) -> Result<Option<RotatedRect>> {
            Ok(geometry::min_area_rect(&contour.points))
        }

        fn box_points(&self, rect: &RotatedRect) -> Option<BoxCorners> {
            geometry::box_points(rect)
        }

        fn point_polygon_test(&self, polygon: &[Point2f], point: Point2f) -> Result<f64> {
            Ok(geometry::point_polygon_test(polygon, point))
        }

        fn warp_affine_rgb(
            &self,
            image: &RgbImage,
            matrix: &Matrix3<f64>,
            size: (u32, u32),
            border: BorderMode,
        ) -> Result<RgbImage> {
            warp_affine(image, matrix, size, border)
        }

        fn warp_affine_luma(
            &self,
            image: &GrayImage,
            matrix: &Matrix3<f64>,
            size: (u32, u32),
            border: BorderMode,
        ) -> Result<GrayImage> {
            warp_affine(image, matrix, size, border)
        }

        fn resize_rgb(&self, image: &RgbImage, size: (u32, u32)) -> Result<RgbImage> {
            Ok(image::imageops::resize(image, size.0, size.1, FilterType::Triangle))
        }

        fn resize_luma(&self, image: &GrayImage, size: (u32, u32)) -> Result<GrayImage> {
            Ok(image::imageops::resize(image, size.0, size.1, FilterType::Triangle))
        }
    }
}

// OpenCV implementation
#[cfg(feature = "use-opencv")]
mod opencv_impl {
    use super::{BorderMode, Primitives};
    use crate::error::Result;
    use crate::geometry::{BoxCorners, Contour, Point, Point2f, RotatedRect, Size2f};
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use nalgebra::Matrix3;
    use opencv::core::{self, Mat, Vector};
    use opencv::{imgproc, prelude::*};

    /// Backend delegating to OpenCV's `imgproc`.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct OpenCvPrimitives;

    fn gray_to_mat(image: &GrayImage) -> opencv::Result<Mat> {
        let (w, h) = image.dimensions();
        let mut mat =
            Mat::new_rows_cols_with_default(h as i32, w as i32, core::CV_8UC1, core::Scalar::all(0.0))?;
        for (x, y, px) in image.enumerate_pixels() {
            *mat.at_2d_mut::<u8>(y as i32, x as i32)? = px[0];
        }
        Ok(mat)
    }

    fn rgb_to_mat(image: &RgbImage) -> opencv::Result<Mat> {
        let (w, h) = image.dimensions();
        let mut mat =
            Mat::new_rows_cols_with_default(h as i32, w as i32, core::CV_8UC3, core::Scalar::all(0.0))?;
        for (x, y, px) in image.enumerate_pixels() {
            *mat.at_2d_mut::<core::Vec3b>(y as i32, x as i32)? = core::VecN([px[0], px[1], px[2]]);
        }
        Ok(mat)
    }

    fn mat_to_gray(mat: &Mat) -> opencv::Result<GrayImage> {
        let mut out = GrayImage::new(mat.cols() as u32, mat.rows() as u32);
        for y in 0..mat.rows() {
            for x in 0..mat.cols() {
                let v = *mat.at_2d::<u8>(y, x)?;
                out.put_pixel(x as u32, y as u32, Luma([v]));
            }
        }
        Ok(out)
    }

    fn mat_to_rgb(mat: &Mat) -> opencv::Result<RgbImage> {
        let mut out = RgbImage::new(mat.cols() as u32, mat.rows() as u32);
        for y in 0..mat.rows() {
            for x in 0..mat.cols() {
                let px = mat.at_2d::<core::Vec3b>(y, x)?;
                out.put_pixel(x as u32, y as u32, Rgb([px[0], px[1], px[2]]));
            }
        }
        Ok(out)
    }

    fn to_cv_contour(contour: &Contour) -> Vector<core::Point> {
        contour
            .points
            .iter()
            .map(|p| core::Point::new(p.x, p.y))
            .collect()
    }

    fn from_cv_contour(contour: &Vector<core::Point>) -> Contour {
        Contour::from_points(contour.iter().map(|p| Point::new(p.x, p.y)).collect())
    }

    fn affine_to_mat(m: &Matrix3<f64>) -> opencv::Result<Mat> {
        Mat::from_slice_2d(&[
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        ])
    }

    fn border_args(border: BorderMode) -> (i32, core::Scalar) {
        match border {
            BorderMode::Constant(v) => (core::BORDER_CONSTANT, core::Scalar::all(v as f64)),
            BorderMode::Replicate => (core::BORDER_REPLICATE, core::Scalar::all(0.0)),
        }
    }

    fn warp(src: &Mat, matrix: &Matrix3<f64>, size: (u32, u32), border: BorderMode) -> opencv::Result<Mat> {
        let m = affine_to_mat(matrix)?;
        let (border_mode, border_value) = border_args(border);
        let mut dst = Mat::default();
        imgproc::warp_affine(
            src,
            &mut dst,
            &m,
            core::Size::new(size.0 as i32, size.1 as i32),
            imgproc::INTER_LINEAR,
            border_mode,
            border_value,
        )?;
        Ok(dst)
    }

    fn resize(src: &Mat, size: (u32, u32)) -> opencv::Result<Mat> {
        let mut dst = Mat::default();
        imgproc::resize(
            src,
            &mut dst,
            core::Size::new(size.0 as i32, size.1 as i32),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;
        Ok(dst)
    }

    impl Primitives for OpenCvPrimitives {
        fn to_grayscale(&self, image: &RgbImage) -> Result<GrayImage> {
            let src = rgb_to_mat(image)?;
            let mut dst = Mat::default();
            imgproc::cvt_color_def(&src, &mut dst, imgproc::COLOR_RGB2GRAY)?;
            Ok(mat_to_gray(&dst)?)
        }

        fn gaussian_blur(&self, image: &GrayImage, kernel_size: u32, sigma: f32) -> Result<GrayImage> {
            let src = gray_to_mat(image)?;
            let mut dst = Mat::default();
            let k = kernel_size as i32;
            imgproc::gaussian_blur_def(&src, &mut dst, core::Size::new(k, k), sigma.max(0.0) as f64)?;
            Ok(mat_to_gray(&dst)?)
        }

        fn canny(&self, image: &GrayImage, low: f32, high: f32) -> Result<GrayImage> {
            let src = gray_to_mat(image)?;
            let mut dst = Mat::default();
            imgproc::canny_def(&src, &mut dst, low as f64, high as f64)?;
            Ok(mat_to_gray(&dst)?)
        }

        fn external_contours(&self, edges: &GrayImage) -> Result<Vec<Contour>> {
            let src = gray_to_mat(edges)?;
            let mut contours = Vector::<Vector<core::Point>>::new();
            imgproc::find_contours(
                &src,
                &mut contours,
                imgproc::RETR_EXTERNAL,
                imgproc::CHAIN_APPROX_SIMPLE,
                core::Point::new(0, 0),
            )?;
            Ok(contours.iter().map(|c| from_cv_contour(&c)).collect())
        }

        fn approx_polygon(&self, contour: &Contour, epsilon: f64, closed: bool) -> Result<Contour> {
            let curve = to_cv_contour(contour);
            let mut approx = Vector::<core::Point>::new();
            imgproc::approx_poly_dp(&curve, &mut approx, epsilon, closed)?;
            Ok(from_cv_contour(&approx))
        }

        fn contour_area(&self, contour: &Contour) -> Result<f64> {
            Ok(imgproc::contour_area(&to_cv_contour(contour), false)?)
        }

        fn arc_length(&self, contour: &Contour, closed: bool) -> Result<f64> {
            Ok(imgproc::arc_length(&to_cv_contour(contour), closed)?)
        }

        fn min_area_rect(&self, contour: &Contour) -> Result<Option<RotatedRect>> {
            if contour.is_empty() {
                return Ok(None);
            }
            let rect = imgproc::min_area_rect(&to_cv_contour(contour))?;
            Ok(Some(RotatedRect::new(
                Point2f::new(rect.center.x, rect.center.y),
                Size2f::new(rect.size.width, rect.size.height),
                rect.angle,
            )))
        }

        fn box_points(&self, rect: &RotatedRect) -> Option<BoxCorners> {
            let cv_rect = core::RotatedRect {
                center: core::Point2f::new(rect.center.x, rect.center.y),
                size: core::Size2f::new(rect.size.width, rect.size.height),
                angle: rect.angle,
            };
            let mut pts = [core::Point2f::default(); 4];
            cv_rect.points(&mut pts).ok()?;
            Some(BoxCorners(pts.map(|p| Point2f::new(p.x, p.y))))
        }

        fn point_polygon_test(&self, polygon: &[Point2f], point: Point2f) -> Result<f64> {
            let contour: Vector<core::Point2f> = polygon
                .iter()
                .map(|p| core::Point2f::new(p.x, p.y))
                .collect();
            Ok(imgproc::point_polygon_test(
                &contour,
                core::Point2f::new(point.x, point.y),
                true,
            )?)
        }

        fn warp_affine_rgb(
            &self,
            image: &RgbImage,
            matrix: &Matrix3<f64>,
            size: (u32, u32),
            border: BorderMode,
        ) -> Result<RgbImage> {
            let dst = warp(&rgb_to_mat(image)?, matrix, size, border)?;
            Ok(mat_to_rgb(&dst)?)
        }

        fn warp_affine_luma(
            &self,
            image: &GrayImage,
            matrix: &Matrix3<f64>,
            size: (u32, u32),
            border: BorderMode,
        ) -> Result<GrayImage> {
            let dst = warp(&gray_to_mat(image)?, matrix, size, border)?;
            Ok(mat_to_gray(&dst)?)
        }

        fn resize_rgb(&self, image: &RgbImage, size: (u32, u32)) -> Result<RgbImage> {
            let dst = resize(&rgb_to_mat(image)?, size)?;
            Ok(mat_to_rgb(&dst)?)
        }

        fn resize_luma(&self, image: &GrayImage, size: (u32, u32)) -> Result<GrayImage> {
            let dst = resize(&gray_to_mat(image)?, size)?;
            Ok(mat_to_gray(&dst)?)
        }
    }
}
