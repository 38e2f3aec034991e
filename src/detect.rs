use image::{GrayImage, RgbImage};
use tracing::debug;

use crate::error::Result;
use crate::geometry::{Contour, RotatedRect};
use crate::image_impl::Primitives;
use crate::types::DetectConfig;

/// The contour picked as the box together with its fitted rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub contour: Contour,
    pub rect: RotatedRect,
    /// `false` when no contour simplified to four vertices and the largest
    /// contour was used instead.
    pub is_quadrilateral: bool,
}

/// Finds the single most box-like outline in an image.
#[derive(Debug, Clone, Default)]
pub struct BoxDetector {
    pub cfg: DetectConfig,
}

impl BoxDetector {
    pub fn new(cfg: DetectConfig) -> Self {
        Self { cfg }
    }

    /// Grayscale, blur and Canny.
    pub fn edge_map<P: Primitives>(&self, prims: &P, image: &RgbImage) -> Result<GrayImage> {
        let gray = prims.to_grayscale(image)?;
        let blurred = prims.gaussian_blur(&gray, self.cfg.blur_kernel_size, self.cfg.blur_sigma)?;
        prims.canny(&blurred, self.cfg.canny_low, self.cfg.canny_high)
    }

    pub fn detect<P: Primitives>(&self, prims: &P, image: &RgbImage) -> Result<Option<Detection>> {
        let edges = self.edge_map(prims, image)?;
        self.detect_in_edges(prims, &edges)
    }

    pub fn detect_in_edges<P: Primitives>(&self, prims: &P, edges: &GrayImage) -> Result<Option<Detection>> {
        let contours = prims.external_contours(edges)?;
        let Some((contour, is_quadrilateral)) = self.find_box_contour(prims, contours)? else {
            return Ok(None);
        };
        let Some(rect) = prims.min_area_rect(&contour)? else {
            return Ok(None);
        };

        debug!(
            points = contour.len(),
            is_quadrilateral,
            cx = rect.center.x,
            cy = rect.center.y,
            angle = rect.angle,
            "box contour selected"
        );

        Ok(Some(Detection {
            contour,
            rect,
            is_quadrilateral,
        }))
    }

    /// Largest-first scan for a sufficiently large quadrilateral, otherwise
    /// the largest contour.
    pub fn find_box_contour<P: Primitives>(
        &self,
        prims: &P,
        contours: Vec<Contour>,
    ) -> Result<Option<(Contour, bool)>> {
        let mut by_area = contours
            .into_iter()
            .map(|c| prims.contour_area(&c).map(|area| (area, c)))
            .collect::<Result<Vec<_>>>()?;
        // stable, so equal areas keep tracing order
        by_area.sort_by(|a, b| b.0.total_cmp(&a.0));

        for (area, contour) in &by_area {
            let perimeter = prims.arc_length(contour, true)?;
            let approx = prims.approx_polygon(contour, self.cfg.approx_epsilon_ratio * perimeter, true)?;
            if approx.len() == 4 && *area > self.cfg.min_box_area {
                return Ok(Some((contour.clone(), true)));
            }
        }

        Ok(by_area.into_iter().next().map(|(_, c)| (c, false)))
    }
}
