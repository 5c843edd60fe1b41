//! Custom error types for the recording pipeline.
//!
//! This module defines the primary error type, `PipelineError`, for the whole
//! crate. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the different kinds of errors that can occur,
//! from I/O and configuration issues to storage failures.
//!
//! Note that per-frame persistence failures are deliberately *not* part of
//! this type: a single bad frame is logged and skipped by the writer so the
//! frame-index sequence stays aligned with the timestamp log. Only errors
//! that prevent a recording session from starting, or that indicate a
//! misconfigured host, surface through `PipelineError`.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Recording session error: {0}")]
    Session(String),

    #[error("Writer thread failed to start: {0}")]
    WriterSpawn(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert_via_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such directory");
        let err: PipelineError = io.into();
        assert!(err.to_string().contains("no such directory"));
    }

    #[test]
    fn configuration_error_message() {
        let err = PipelineError::Configuration("image_quality must be 1..=100".into());
        assert_eq!(
            err.to_string(),
            "Configuration validation error: image_quality must be 1..=100"
        );
    }
}
