use std::path::PathBuf;

/// Errors raised while loading pictures, configuration or uploads.
///
/// None of these reach the user as a crash: the wizard turns them into a
/// message and the gallery into a failure indicator on one thumbnail.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The chosen file is not one of the accepted image types.
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// The file was accepted but could not be decoded.
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The background loader went away without sending a result.
    #[error("image loader stopped before finishing")]
    LoaderStopped,

    /// A resize-step operation ran without a loaded image.
    #[error("no image is loaded")]
    NoResizer,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
