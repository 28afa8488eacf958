use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("model weights not found at {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("camera calibration read failed: {0}")]
    Calibration(String),

    #[error("frame source error: {0}")]
    FrameSource(String),

    #[error("frame buffer holds {got} bytes, expected {expected} for {width}x{height} BGR")]
    FrameSize {
        width: usize,
        height: usize,
        expected: usize,
        got: usize,
    },

    #[error("input controller unavailable: {0}")]
    InputUnavailable(String),

    #[error("innovation covariance is singular")]
    Singular,

    #[error("malformed detection record on line {line}: {source}")]
    DetectionRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
