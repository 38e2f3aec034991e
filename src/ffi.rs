// FFI bindings for C/C++/C#
use std::ffi::CStr;
use std::os::raw::{c_char, c_float, c_int};
use std::path::{Path, PathBuf};
use std::slice;

use crate::compositor::{load_decal, Decal};
use crate::pipeline::{read_image_bytes, ImageReport, ProcessOutput};
use crate::{DecalPipeline, PipelineConfig};

/// Opaque handle to a pipeline and its loaded decal
pub struct DbxHandle {
    inner: DecalPipeline,
    decal: Option<Decal>,
}

/// C-compatible measurement of one image
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DbxResult {
    /// Box orientation in degrees, `[0, 90]`
    pub angle: c_float,
    pub x: c_int,
    pub y: c_int,
    pub center_x: c_float,
    pub center_y: c_float,
    pub width: c_float,
    pub height: c_float,
    /// Raw rectangle angle reported by the backend
    pub rect_angle: c_float,
}

impl DbxResult {
    fn new(angle: f32, position: crate::Position, rect: &crate::RotatedRect) -> Self {
        Self {
            angle,
            x: position.x,
            y: position.y,
            center_x: rect.center.x,
            center_y: rect.center.y,
            width: rect.size.width,
            height: rect.size.height,
            rect_angle: rect.angle,
        }
    }
}

impl From<&ImageReport> for DbxResult {
    fn from(r: &ImageReport) -> Self {
        Self::new(r.angle, r.position, &r.rect)
    }
}

impl From<&ProcessOutput> for DbxResult {
    fn from(r: &ProcessOutput) -> Self {
        Self::new(r.angle, r.position, &r.rect)
    }
}

unsafe fn optional_path(ptr: *const c_char) -> Result<Option<PathBuf>, ()> {
    if ptr.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(|s| Some(PathBuf::from(s)))
        .map_err(|_| ())
}

/// Create a new pipeline
///
/// Both arguments may be null: a null config uses the defaults and a null
/// decal draws the fallback marker.
///
/// # Safety
/// Non-null pointers must be valid null-terminated UTF-8 strings
#[no_mangle]
pub unsafe extern "C" fn dbx_new(config_path: *const c_char, decal_path: *const c_char) -> *mut DbxHandle {
    let (config_path, decal_path) = match (optional_path(config_path), optional_path(decal_path)) {
        (Ok(c), Ok(d)) => (c, d),
        _ => return std::ptr::null_mut(),
    };

    let mut config = match config_path {
        Some(path) => match PipelineConfig::from_json_file(path) {
            Ok(cfg) => cfg,
            Err(_) => return std::ptr::null_mut(),
        },
        None => PipelineConfig::default(),
    };
    if decal_path.is_some() {
        config.decal_path = decal_path;
    }

    let decal = load_decal(config.decal_path.as_deref());
    Box::into_raw(Box::new(DbxHandle {
        inner: DecalPipeline::new(config),
        decal,
    }))
}

/// Process an image file
///
/// Returns 0 on success, 1 when no box was found, and a negative value on
/// error. When `output_dir` is non-null the annotated image is written there.
///
/// # Safety
/// - handle must be a valid pointer returned from dbx_new
/// - image_path must be a valid null-terminated UTF-8 string
/// - output_dir must be null or a valid null-terminated UTF-8 string
/// - result_out must point to writable memory for one DbxResult
#[no_mangle]
pub unsafe extern "C" fn dbx_process_file(
    handle: *mut DbxHandle,
    image_path: *const c_char,
    output_dir: *const c_char,
    result_out: *mut DbxResult,
) -> c_int {
    if handle.is_null() || image_path.is_null() || result_out.is_null() {
        return -1;
    }

    let pipeline = &(*handle).inner;

    let path = match CStr::from_ptr(image_path).to_str() {
        Ok(s) => s,
        Err(_) => return -2,
    };
    let output_dir = match optional_path(output_dir) {
        Ok(dir) => dir,
        Err(_) => return -2,
    };

    match pipeline.process_path(Path::new(path), output_dir.as_deref()) {
        Ok(Some(report)) => {
            *result_out = DbxResult::from(&report);
            0
        }
        Ok(None) => 1,
        Err(_) => -3,
    }
}

/// Measure an encoded image held in memory; nothing is written to disk
///
/// # Safety
/// - handle must be a valid pointer returned from dbx_new
/// - image_data must point to valid image bytes of length image_len
/// - result_out must point to writable memory for one DbxResult
#[no_mangle]
pub unsafe extern "C" fn dbx_process_data(
    handle: *mut DbxHandle,
    image_data: *const u8,
    image_len: usize,
    result_out: *mut DbxResult,
) -> c_int {
    if handle.is_null() || image_data.is_null() || result_out.is_null() {
        return -1;
    }

    let handle = &*handle;
    let data = slice::from_raw_parts(image_data, image_len);

    let image = match read_image_bytes(data) {
        Ok(img) => img,
        Err(_) => return -3,
    };

    match handle.inner.process(&image, handle.decal.as_ref()) {
        Ok(Some(out)) => {
            *result_out = DbxResult::from(&out);
            0
        }
        Ok(None) => 1,
        Err(_) => -3,
    }
}

/// Free a pipeline
///
/// # Safety
/// handle must be a valid pointer returned from dbx_new
#[no_mangle]
pub unsafe extern "C" fn dbx_free(handle: *mut DbxHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Get library version
#[no_mangle]
pub extern "C" fn dbx_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}
