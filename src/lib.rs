//! # DecalBox - box detection and decal placement
//!
//! DecalBox finds the dominant rectangular object in a photo, measures how far
//! it is rotated from the image axes, picks a stable point on it and pastes a
//! decal there, rotated to match.
//!
//! ## Features
//!
//! - **Pure Rust**: `image` + `imageproc` by default, no native dependencies
//! - **Optional OpenCV backend**: enable the `use-opencv` feature
//! - **Batch mode**: whole directories processed in parallel with `rayon`
//! - **C bindings**: enable the `ffi` feature
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use decalbox::{resolve_default_decal, DecalPipeline, PipelineConfig};
//! use std::path::Path;
//!
//! let config = PipelineConfig {
//!     decal_path: resolve_default_decal("."),
//!     ..PipelineConfig::default()
//! };
//! let pipeline: DecalPipeline = DecalPipeline::new(config);
//!
//! if let Some(report) = pipeline.process_path(Path::new("box.jpg"), Some(Path::new("out")))? {
//!     println!("angle {:.1} at ({}, {})", report.angle, report.position.x, report.position.y);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod annotate;
pub mod compositor;
pub mod detect;
pub mod error;
pub mod geometry;
pub mod image_impl;
pub mod orientation;
pub mod pipeline;
pub mod placement;
pub mod types;

// FFI module for C bindings
#[cfg(feature = "ffi")]
pub mod ffi;

// Public API exports
pub use crate::compositor::{composite, load_decal, Decal};
pub use crate::detect::{BoxDetector, Detection};
pub use crate::error::{DecalError, Result};
pub use crate::geometry::{BoxCorners, Contour, Point, Point2f, RotatedRect, Size2f};
pub use crate::image_impl::{BorderMode, DefaultPrimitives, Primitives, RustPrimitives};
pub use crate::orientation::calculate_orientation;
pub use crate::pipeline::{BatchReport, DecalPipeline, ImageReport, ProcessOutput, SkipReport};
pub use crate::placement::{calculate_decal_position, calculate_decal_position_on_face, Position};
pub use crate::types::{
    resolve_default_decal, CompositeConfig, DetectConfig, Face, PipelineConfig, PlacementConfig,
    PlacementStrategy,
};

#[cfg(feature = "use-opencv")]
pub use crate::image_impl::OpenCvPrimitives;
