use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration directory not found")]
    ConfigDirNotFound,

    #[error(
        "container file not found. Looked in:\n\
        - current directory: container.local.kdl, .container.local.kdl, container.kdl, .container.kdl\n\
        - ./.containerflow/\n\
        - ~/.config/containerflow/container.kdl\n\
        Set CONTAINERFLOW_CONFIG_PATH to point at a file directly"
    )]
    ContainerFileNotFound,

    #[error("invalid settings file {path}: {source}")]
    InvalidSettings {
        path: std::path::PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
