//! Single-image and directory entry points.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ImageReader, RgbImage};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::annotate::annotate_image;
use crate::compositor::{load_decal, Decal};
use crate::detect::BoxDetector;
use crate::error::{DecalError, Result};
use crate::geometry::RotatedRect;
use crate::image_impl::{DefaultPrimitives, Primitives};
use crate::orientation::calculate_orientation;
use crate::placement::{calculate_decal_position, calculate_decal_position_on_face, Position};
use crate::types::{has_image_extension, PipelineConfig, PlacementStrategy};

/// Result of processing one decoded image.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub angle: f32,
    pub position: Position,
    pub rect: RotatedRect,
    pub annotated: RgbImage,
}

/// Summary of one processed file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageReport {
    pub input: PathBuf,
    /// Where the annotated image was written, if anywhere.
    pub output: Option<PathBuf>,
    pub angle: f32,
    pub position: Position,
    pub rect: RotatedRect,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkipReport {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a directory run, in sorted input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub annotated: Vec<ImageReport>,
    /// Readable images in which no box was found.
    pub misses: Vec<PathBuf>,
    pub skipped: Vec<SkipReport>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.annotated.len() + self.misses.len() + self.skipped.len()
    }
}

/// Image files directly inside `dir`, sorted by path.
pub fn collect_images<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_image_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn read_image(path: &Path) -> Result<RgbImage> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|source| DecalError::InputUnreadable {
            path: path.to_path_buf(),
            source,
        })
}

/// Decode an in-memory image, guessing its format from the content.
pub fn read_image_bytes(data: &[u8]) -> Result<RgbImage> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()
        .map_err(|e| DecalError::ImageError(e.to_string()))?;
    Ok(img.to_rgb8())
}

pub struct DecalPipeline<P: Primitives = DefaultPrimitives> {
    pub cfg: PipelineConfig,
    detector: BoxDetector,
    prims: P,
}

impl<P: Primitives + Default> DecalPipeline<P> {
    pub fn new(cfg: PipelineConfig) -> Self {
        Self::with_primitives(cfg, P::default())
    }
}

impl<P: Primitives> DecalPipeline<P> {
    pub fn with_primitives(cfg: PipelineConfig, prims: P) -> Self {
        let detector = BoxDetector::new(cfg.detect.clone());
        Self { cfg, detector, prims }
    }

    /// Detect, measure, place and annotate. `Ok(None)` when no box is found.
    pub fn process(&self, image: &RgbImage, decal: Option<&Decal>) -> Result<Option<ProcessOutput>> {
        let Some(detection) = self.detector.detect(&self.prims, image)? else {
            return Ok(None);
        };
        let rect = detection.rect;

        let angle = calculate_orientation(&self.prims, &rect);
        let placement = &self.cfg.placement;
        let position = match placement.strategy {
            PlacementStrategy::Corner => calculate_decal_position(&self.prims, &rect, placement.offset_percent)?,
            PlacementStrategy::Face(face) => calculate_decal_position_on_face(&rect, face, placement.offset_percent),
        };
        debug!(angle, x = position.x, y = position.y, "box measured");

        let annotated = annotate_image(&self.prims, image, &rect, position, angle, decal, &self.cfg.composite)?;

        Ok(Some(ProcessOutput {
            angle,
            position,
            rect,
            annotated,
        }))
    }

    /// Process one file with the configured decal, writing the result into
    /// `output_dir` when given.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn process_path(&self, path: &Path, output_dir: Option<&Path>) -> Result<Option<ImageReport>> {
        let decal = load_decal(self.cfg.decal_path.as_deref());
        self.process_file(path, decal.as_ref(), output_dir)
    }

    /// Process every image in `input_dir` in parallel. Failures on single
    /// files are recorded and do not stop the batch.
    #[instrument(skip_all, fields(input = %input_dir.display(), output = %output_dir.display()))]
    pub fn process_directory(&self, input_dir: &Path, output_dir: &Path) -> Result<BatchReport> {
        let files = collect_images(input_dir)?;
        if files.is_empty() {
            warn!("no images found");
            return Ok(BatchReport::default());
        }
        info!(count = files.len(), "processing images");

        let decal = load_decal(self.cfg.decal_path.as_deref());
        let outcomes: Vec<(PathBuf, Result<Option<ImageReport>>)> = files
            .into_par_iter()
            .map(|path| {
                let outcome = self.process_file(&path, decal.as_ref(), Some(output_dir));
                (path, outcome)
            })
            .collect();

        let mut report = BatchReport::default();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(Some(image_report)) => report.annotated.push(image_report),
                Ok(None) => {
                    warn!(path = %path.display(), "no box detected");
                    report.misses.push(path);
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping image");
                    report.skipped.push(SkipReport {
                        path,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            annotated = report.annotated.len(),
            misses = report.misses.len(),
            skipped = report.skipped.len(),
            "batch finished"
        );
        Ok(report)
    }

    fn process_file(&self, path: &Path, decal: Option<&Decal>, output_dir: Option<&Path>) -> Result<Option<ImageReport>> {
        let image = read_image(path)?;
        let Some(out) = self.process(&image, decal)? else {
            return Ok(None);
        };

        let output = match output_dir {
            Some(dir) => Some(self.write_output(path, dir, &out.annotated)?),
            None => None,
        };

        Ok(Some(ImageReport {
            input: path.to_path_buf(),
            output,
            angle: out.angle,
            position: out.position,
            rect: out.rect,
        }))
    }

    fn write_output(&self, input: &Path, output_dir: &Path, annotated: &RgbImage) -> Result<PathBuf> {
        fs::create_dir_all(output_dir)?;
        let file_name = input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target = output_dir.join(format!("{}{}", self.cfg.output_prefix, file_name));
        annotated
            .save(&target)
            .map_err(|source| DecalError::OutputWrite {
                path: target.clone(),
                source,
            })?;
        debug!(path = %target.display(), "annotated image written");
        Ok(target)
    }
}
