use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DotplotError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line_no}: {reason}: `{line}`")]
    Parse {
        path: String,
        line_no: usize,
        line: String,
        reason: String,
    },

    #[error("invalid --remove value `{0}` (expected a combination of `q` and `s`)")]
    InvalidRemove(String),

    #[error("axis length overflows at sequence `{0}`")]
    AxisTooLong(String),

    #[error("PNG encoding failed: {0}")]
    Png(#[from] png::EncodingError),

    #[error("PDF output failed: {0}")]
    Pdf(String),
}

impl DotplotError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DotplotError::Io { path: path.into(), source }
    }

    pub fn parse(path: &str, line_no: usize, line: &str, reason: impl Into<String>) -> Self {
        DotplotError::Parse {
            path: path.to_string(),
            line_no,
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DotplotError>;
