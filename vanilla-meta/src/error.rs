use std::process::ExitStatus;
use thiserror::Error;
use vanilla_appstream_silo::CompileError;
use vanilla_appstream_silo::SiloError;

/// Failure to bring the remote metadata document into the cache.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error fetching {url}: {message}")]
    Transport { url: String, message: String },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("IO error while storing download: {0}")]
    Io(#[from] std::io::Error),

    #[error("download cancelled")]
    Cancelled,
}

/// Failure of a container runtime command.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("`{command}` cancelled")]
    Cancelled { command: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum VanillaMetaError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Silo error: {0}")]
    Silo(#[from] SiloError),

    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),

    #[error("Cannot resolve install parameters for {app}: {reason}")]
    InstallParams { app: String, reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("metadata worker has shut down")]
    WorkerGone,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, VanillaMetaError>;
