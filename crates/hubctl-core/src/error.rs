//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Values merge error: {message}")]
    ValuesMerge { message: String },

    #[error("Cluster '{name}' is already registered in {path}")]
    DuplicateCluster { name: String, path: String },

    #[error("Cluster '{name}' is not registered in {path}")]
    UnknownCluster { name: String, path: String },

    #[error("Invalid kubeconfig {path}: {message}")]
    InvalidKubeconfig { path: String, message: String },

    #[error("Failed to run `{program}`: {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;
