use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum DecalError {
    #[error("could not read image {}: {source}", path.display())]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("could not write image {}: {source}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[cfg(feature = "use-opencv")]
    #[error("OpenCV error: {0}")]
    OpenCvError(#[from] opencv::Error),

    #[error("Image processing error: {0}")]
    ImageError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DecalError>;
