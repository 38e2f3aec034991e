use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Image extensions accepted for inputs and decals.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Sub-directory searched by [`resolve_default_decal`].
pub const DEFAULT_DECAL_DIR: &str = "decals";

/// Side of the box a face-relative placement moves towards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Face {
    #[default]
    Top,
    Bottom,
    Left,
    Right,
}

impl From<&str> for Face {
    /// Unknown names fall back to `Top`.
    fn from(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "bottom" => Face::Bottom,
            "left" => Face::Left,
            "right" => Face::Right,
            _ => Face::Top,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementStrategy {
    /// Walk from the top-most corner towards the centre until inside the box.
    #[default]
    Corner,
    /// Fixed offset from the centre towards one face.
    Face(Face),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    pub blur_kernel_size: u32,
    /// `0.0` derives sigma from the kernel size.
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Polygon approximation tolerance as a fraction of the perimeter.
    pub approx_epsilon_ratio: f64,
    /// Contour area a quadrilateral must exceed to be accepted.
    pub min_box_area: f64,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            blur_kernel_size: 5,
            blur_sigma: 0.0,
            canny_low: 50.0,
            canny_high: 150.0,
            approx_epsilon_ratio: 0.02,
            min_box_area: 1000.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub strategy: PlacementStrategy,
    pub offset_percent: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            strategy: PlacementStrategy::Corner,
            offset_percent: 0.1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeConfig {
    pub decal_scale: f32,
    /// Rotate the decal by the estimated box orientation.
    pub rotate_decal: bool,
    pub draw_axes: bool,
    pub draw_outline: bool,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            decal_scale: 0.3,
            rotate_decal: true,
            draw_axes: true,
            draw_outline: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub detect: DetectConfig,
    pub placement: PlacementConfig,
    pub composite: CompositeConfig,
    /// Decal loaded for every processed image; `None` draws the marker.
    pub decal_path: Option<PathBuf>,
    /// Prepended to the input file name when writing results.
    pub output_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detect: DetectConfig::default(),
            placement: PlacementConfig::default(),
            composite: CompositeConfig::default(),
            decal_path: None,
            output_prefix: "annotated_".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

pub(crate) fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Look for a decal under `<dir>/decals/`: `decal.png` first, then
/// `decal.{jpg,jpeg,png,bmp}` in that order.
pub fn resolve_default_decal<P: AsRef<Path>>(dir: P) -> Option<PathBuf> {
    let decal_dir = dir.as_ref().join(DEFAULT_DECAL_DIR);
    std::iter::once("png")
        .chain(IMAGE_EXTENSIONS)
        .map(|ext| decal_dir.join(format!("decal.{}", ext)))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("decalbox-types-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.detect.blur_kernel_size, 5);
        assert_eq!(cfg.detect.canny_low, 50.0);
        assert_eq!(cfg.detect.canny_high, 150.0);
        assert_eq!(cfg.detect.min_box_area, 1000.0);
        assert_eq!(cfg.placement.strategy, PlacementStrategy::Corner);
        assert!((cfg.placement.offset_percent - 0.1).abs() < f32::EPSILON);
        assert!((cfg.composite.decal_scale - 0.3).abs() < f32::EPSILON);
        assert_eq!(cfg.output_prefix, "annotated_");
        assert!(cfg.decal_path.is_none());
    }

    #[test]
    fn test_face_from_str() {
        assert_eq!(Face::from("bottom"), Face::Bottom);
        assert_eq!(Face::from("LEFT"), Face::Left);
        assert_eq!(Face::from("right"), Face::Right);
        assert_eq!(Face::from("top"), Face::Top);
        assert_eq!(Face::from("diagonal"), Face::Top);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: PipelineConfig = serde_json::from_str(
            r#"{"placement": {"strategy": {"face": "left"}}, "composite": {"decal_scale": 0.5}}"#,
        )
        .unwrap();
        assert_eq!(cfg.placement.strategy, PlacementStrategy::Face(Face::Left));
        assert!((cfg.placement.offset_percent - 0.1).abs() < f32::EPSILON);
        assert!((cfg.composite.decal_scale - 0.5).abs() < f32::EPSILON);
        assert!(cfg.composite.draw_axes);
        assert_eq!(cfg.detect, DetectConfig::default());
    }

    #[test]
    fn test_from_json_file_rejects_garbage() {
        let dir = scratch_dir("garbage");
        let path = dir.join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            PipelineConfig::from_json_file(&path),
            Err(crate::error::DecalError::Config(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json_file(dir.join("missing.json")),
            Err(crate::error::DecalError::Io(_))
        ));
    }

    #[test]
    fn test_has_image_extension() {
        assert!(has_image_extension(Path::new("a/photo.JPG")));
        assert!(has_image_extension(Path::new("b.jpeg")));
        assert!(has_image_extension(Path::new("c.Png")));
        assert!(has_image_extension(Path::new("d.bmp")));
        assert!(!has_image_extension(Path::new("e.gif")));
        assert!(!has_image_extension(Path::new("noext")));
    }

    #[test]
    fn test_resolve_default_decal_prefers_png() {
        let dir = scratch_dir("resolve");
        assert_eq!(resolve_default_decal(&dir), None);

        let decals = dir.join(DEFAULT_DECAL_DIR);
        fs::create_dir_all(&decals).unwrap();
        fs::write(decals.join("decal.jpg"), b"x").unwrap();
        assert_eq!(resolve_default_decal(&dir), Some(decals.join("decal.jpg")));

        fs::write(decals.join("decal.png"), b"x").unwrap();
        assert_eq!(resolve_default_decal(&dir), Some(decals.join("decal.png")));
    }
}
