use thiserror::Error;

/// Errors surfaced to an operator: configuration, startup, and bind failures.
///
/// Per-packet and per-flow errors (malformed wire data, pairing timeouts, PAF
/// protocol errors) are deliberately *not* routed through this type — they
/// are swallowed locally and counted on the fast path. `DpiError` is for the
/// things that stop the process.
#[derive(Error, Debug)]
pub enum DpiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("bind failed: {0}")]
    Bind(std::io::Error),

    #[error("missing required argument: {0}")]
    MissingArg(&'static str),

    #[error("invalid CLI token: {0}")]
    InvalidArg(String),
}

pub type Result<T> = std::result::Result<T, DpiError>;
