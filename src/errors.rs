// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedError {
    #[error("The process '{0}' does not support running in its own thread")]
    UnsupportedProcess(String),

    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Duplicate process name: {0}")]
    DuplicateProcessName(String),

    #[error("Process '{process}' has no port named '{port}'")]
    PortNotFound { process: String, port: String },

    #[error("Input port '{port}' of process '{process}' is already connected")]
    PortAlreadyConnected { process: String, port: String },

    #[error("Required input port '{port}' of process '{process}' is not connected")]
    MissingConnection { process: String, port: String },

    #[error("Unknown {kind} type: {name}")]
    NotRegistered { kind: &'static str, name: String },

    #[error("The {kind} type '{name}' is already registered")]
    AlreadyRegistered { kind: &'static str, name: String },

    #[error("No such config value: {0}")]
    NoSuchConfigValue(String),

    #[error("Bad config value for '{key}': {reason}")]
    BadConfigValue { key: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cycle detected in pipeline: {0}")]
    PipelineCycle(String),

    #[error("Unexpected datum: {0}")]
    BadDatum(String),

    #[error("Schedule has already been started")]
    AlreadyStarted,

    #[error("Worker for process '{process}' failed: {source}")]
    WorkerFailed {
        process: String,
        #[source]
        source: Box<SchedError>,
    },

    #[error("Worker for process '{0}' panicked")]
    WorkerPanicked(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SchedError>;
