//! Speech service seam: the outcome types a synthesis call produces and the
//! client trait the pipeline drives.

mod azure;
mod output;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use azure::{AzureSpeechClient, build_ssml, classify_status};
pub use output::{AttemptOutcome, AudioOutput, BoundSynthesizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancellationReason {
    Error,
    CancelledByUser,
    EndOfStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancellationErrorCode {
    AuthenticationFailure,
    BadRequest,
    Forbidden,
    TooManyRequests,
    ConnectionFailure,
    ServiceTimeout,
    ServiceError,
    ServiceUnavailable,
    RuntimeError,
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for CancellationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationDetails {
    pub reason: CancellationReason,
    /// Only set when `reason` is `Error`.
    pub error_code: Option<CancellationErrorCode>,
    pub error_details: Option<String>,
}

impl CancellationDetails {
    pub fn error(code: CancellationErrorCode, details: impl Into<String>) -> Self {
        Self {
            reason: CancellationReason::Error,
            error_code: Some(code),
            error_details: Some(details.into()),
        }
    }

    pub fn without_error(reason: CancellationReason) -> Self {
        Self {
            reason,
            error_code: None,
            error_details: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.reason == CancellationReason::Error
    }
}

impl fmt::Display for CancellationDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cancelled ({})", self.reason)?;
        if let Some(code) = self.error_code {
            write!(f, " {}", code)?;
        }
        if let Some(details) = &self.error_details {
            write!(f, ": {}", details)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    Completed { audio: Vec<u8> },
    Cancelled(CancellationDetails),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisResult {
    pub result_id: String,
    pub outcome: SynthesisOutcome,
}

/// A speech service that turns one paragraph into audio.
///
/// `Err` means the request never produced a result (transport failure);
/// the service declining a request is `Ok` with a `Cancelled` outcome.
pub trait SpeechClient {
    fn voice(&self) -> &str;

    async fn synthesize(&self, text: &str) -> Result<SynthesisResult>;
}
