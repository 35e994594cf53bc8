use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("batch size must be greater than zero")]
    ZeroBatchSize,

    #[error("index {index} out of range for dataset of size {len} when {op}")]
    IndexOutOfRange {
        index: usize,
        len: usize,
        op: &'static str,
    },

    #[error("use 0 to split dataset")]
    ZeroSplit,

    #[error("split ratio {0} is not within [0, 1]")]
    InvalidRatio(f64),

    #[error("failed to scan directory {}", path.display())]
    ScanDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid loader config: {0}")]
    Config(#[from] serde_json::Error),
}

pub type DatasetResult<T> = std::result::Result<T, DatasetError>;
