//! Error types surfaced by the host.
//!
//! Sandbox-level failures live in [`crate::sandbox::SandboxError`] and loader failures in
//! [`crate::loader::LoaderError`]; this module holds the errors a caller of the host sees.

use crate::sandbox::SandboxError;
use thiserror::Error;

/// Failure to list or fetch modules from a source.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("source `{location}` is unreachable: {reason}")]
    Unreachable { location: String, reason: String },

    #[error("invalid module manifest at `{location}`: {reason}")]
    InvalidManifest { location: String, reason: String },

    #[error("source `{location}` lists modules but none of them are valid")]
    NoValidModules { location: String },

    #[error("module `{name}` is not listed at `{location}`")]
    ModuleNotFound { location: String, name: String },

    #[error("invalid bundle for module `{name}`: {reason}")]
    InvalidBundle { name: String, reason: String },
}

/// Failure to construct a module instance.
#[derive(Error, Debug)]
pub enum CreationError {
    #[error("module `{name}` not found at `{location}`")]
    NotFound { location: String, name: String },

    #[error("module `{name}` failed to load: {reason}")]
    LoadFailed { name: String, reason: String },
}

impl CreationError {
    pub(crate) fn from_catalog(name: &str, err: CatalogError) -> Self {
        match err {
            CatalogError::ModuleNotFound { location, name } => {
                CreationError::NotFound { location, name }
            }
            other => CreationError::LoadFailed {
                name: name.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Recoverable failures of control-thread operations on a live instance.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("event queue is full; the audio thread is not draining it")]
    QueueFull,

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    #[error("module reports unsupported channel shape {inputs} in / {outputs} out")]
    UnsupportedShape { inputs: i32, outputs: i32 },

    #[error("sandbox call failed: {0}")]
    Sandbox(#[from] SandboxError),
}

pub type Result<T> = std::result::Result<T, HostError>;
