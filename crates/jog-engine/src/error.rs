//! Error types for the scrub controller.
//!
//! Only engine bring-up and file-open failures surface as errors; a file
//! whose payload cannot be decoded still loads with degraded metadata and
//! is reported through the log.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrubError {
    #[error("audio engine error: {0}")]
    Engine(#[from] jog_audio::AudioError),

    #[error("file error: {0}")]
    File(#[from] jog_file::FileError),
}

pub type ScrubResult<T> = Result<T, ScrubError>;
