use thiserror::Error;

/// Errors raised while loading data, validating parameters or evaluating genomes
#[derive(Error, Debug)]
pub enum GaKnnError {
    /// A mask and a feature vector do not have the same length
    #[error("dimension mismatch: mask has {expected} bits but the vector has {found} values")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("{0} dataset is empty")]
    EmptyDataset(String),

    #[error("{path}:{line}:{column}: cannot parse '{value}' as a number")]
    Parse {
        path: String,
        line: usize,
        column: usize,
        value: String,
    },

    #[error("{path}:{line}: a row needs at least one feature and a label")]
    MissingLabel { path: String, line: usize },

    #[error("{path}:{line}: expected {expected} features, found {found}")]
    InconsistentFeatures {
        path: String,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("invalid parameters: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, GaKnnError>;
