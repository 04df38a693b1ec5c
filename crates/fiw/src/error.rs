use std::path::PathBuf;

/// Errors raised while indexing, parsing or decoding FIW data.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// Filesystem error on a specific path.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Image could not be decoded.
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Malformed line in a pair list.
    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Relationship tag not in the FIW vocabulary.
    #[error("unknown kin relation: {0:?}")]
    UnknownRelation(String),

    /// No family with at least one image was found.
    #[error("no family images found under {0}")]
    EmptyIndex(PathBuf),
}
