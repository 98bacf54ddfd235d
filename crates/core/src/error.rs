use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NarratorError {
    #[error("Missing configuration: {env_var} environment variable is not set")]
    MissingConfig { env_var: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Input file does not exist: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Input path exists but is not a file: {path}")]
    InputNotAFile { path: PathBuf },

    #[error("Input file is not valid UTF-8: {path}")]
    InputNotUtf8 { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy input into {path}: {source}")]
    InputCopyFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Loop video does not exist: {path}")]
    LoopVideoNotFound { path: PathBuf },

    #[error("Loop video path exists but is not a file: {path}")]
    LoopVideoNotAFile { path: PathBuf },

    #[error("The '{path}' path exists but is not a directory. Please check")]
    RunPathNotADirectory { path: PathBuf },

    #[error("Run directory already exists: {path}")]
    RunDirectoryExists { path: PathBuf },

    #[error("Failed to create run directory {path}: {source}")]
    RunDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write audio output {path}: {source}")]
    AudioOutputFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Synthesis incomplete: {skipped} of {total} paragraphs were skipped")]
    SynthesisIncomplete { skipped: usize, total: usize },

    #[error("No audio was synthesized into {audio_path}")]
    NoAudioSynthesized { audio_path: PathBuf },

    #[error("Failed to write manifest {path}: {source}")]
    ManifestWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Transcoder not found: {tool}")]
    ToolNotFound { tool: PathBuf },

    #[error("Failed to run transcoder {tool}: {source}")]
    TranscoderSpawnFailed {
        tool: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Transcode failed for {output_path} with exit code {}. {stderr_tail}", describe_exit_code(.exit_code))]
    TranscodeFailed {
        output_path: PathBuf,
        exit_code: Option<i32>,
        stderr_tail: String,
    },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),
}

impl NarratorError {
    /// Category of the failure, as reported to the shell.
    pub fn run_exit(&self) -> RunExit {
        match self {
            NarratorError::MissingConfig { .. }
            | NarratorError::InvalidConfig { .. }
            | NarratorError::InputNotFound { .. }
            | NarratorError::InputNotAFile { .. }
            | NarratorError::InputNotUtf8 { .. }
            | NarratorError::InputUnreadable { .. }
            | NarratorError::InputCopyFailed { .. }
            | NarratorError::LoopVideoNotFound { .. }
            | NarratorError::LoopVideoNotAFile { .. }
            | NarratorError::RunPathNotADirectory { .. }
            | NarratorError::RunDirectoryExists { .. }
            | NarratorError::RunDirectoryFailed { .. } => RunExit::BadInput,
            NarratorError::AudioOutputFailed { .. }
            | NarratorError::SynthesisIncomplete { .. }
            | NarratorError::NoAudioSynthesized { .. }
            | NarratorError::ManifestWriteFailed { .. }
            | NarratorError::JsonError(_)
            | NarratorError::ApiError(_) => RunExit::SynthesisFailure,
            NarratorError::ToolNotFound { .. }
            | NarratorError::TranscoderSpawnFailed { .. }
            | NarratorError::TranscodeFailed { .. } => RunExit::TranscodeFailure,
        }
    }

    pub fn is_input_path_error(&self) -> bool {
        matches!(
            self,
            NarratorError::InputNotFound { .. }
                | NarratorError::InputNotAFile { .. }
                | NarratorError::InputNotUtf8 { .. }
        )
    }

    pub fn is_run_directory_conflict(&self) -> bool {
        matches!(
            self,
            NarratorError::RunPathNotADirectory { .. } | NarratorError::RunDirectoryExists { .. }
        )
    }
}

fn describe_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}

/// Exit code category of a run, as reported to the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunExit {
    Success = 0,
    BadInput = 1,
    SynthesisFailure = 2,
    TranscodeFailure = 3,
}

impl RunExit {
    pub fn code(self) -> u8 {
        self as u8
    }
}

pub type Result<T> = std::result::Result<T, NarratorError>;
