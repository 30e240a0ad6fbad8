use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read {path}: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("container '{container}': field '{field}' {message}")]
    InvalidField {
        container: String,
        field: String,
        message: String,
    },

    #[error("container '{0}' is declared more than once")]
    DuplicateContainer(String),

    #[error("container '{0}' has no image url")]
    MissingImage(String),

    #[error("container '{0}' has no memory size")]
    MissingMemory(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
