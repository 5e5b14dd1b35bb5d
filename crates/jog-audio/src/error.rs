//! Audio output error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio output device found")]
    NoDevice,

    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    #[error("Failed to build stream: {0}")]
    StreamBuildError(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Audio worker thread failed: {0}")]
    WorkerError(String),

    #[error("Engine has been shut down")]
    ShutDown,
}

pub type AudioResult<T> = Result<T, AudioError>;
