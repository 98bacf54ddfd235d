use std::path::{Path, PathBuf};

use tokio::{fs::File, io::AsyncWriteExt};

use crate::{
    error::{NarratorError, Result},
    speech::{CancellationDetails, SpeechClient, SynthesisOutcome},
};

/// The run's single audio file. Every completed paragraph is appended to it
/// in call order.
pub struct AudioOutput {
    path: PathBuf,
    file: File,
    bytes_written: u64,
    segments: usize,
}

impl AudioOutput {
    /// Create (or truncate) the file at `path`.
    pub async fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .await
            .map_err(|source| NarratorError::AudioOutputFailed {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            bytes_written: 0,
            segments: 0,
        })
    }

    pub async fn append(&mut self, audio: &[u8]) -> Result<()> {
        self.file
            .write_all(audio)
            .await
            .map_err(|source| NarratorError::AudioOutputFailed {
                path: self.path.clone(),
                source,
            })?;
        self.bytes_written += audio.len() as u64;
        self.segments += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn segments(&self) -> usize {
        self.segments
    }

    /// Flush and sync to disk. Returns the total bytes written.
    pub async fn finish(mut self) -> Result<u64> {
        let path = self.path.clone();
        let io_err = |source| NarratorError::AudioOutputFailed {
            path: path.clone(),
            source,
        };
        self.file.flush().await.map_err(io_err)?;
        self.file.sync_all().await.map_err(io_err)?;
        Ok(self.bytes_written)
    }
}

/// What a single call through a [`BoundSynthesizer`] amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Completed { result_id: String, bytes: usize },
    Cancelled {
        result_id: String,
        details: CancellationDetails,
    },
    TransportFailure { message: String },
}

impl AttemptOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, AttemptOutcome::Completed { .. })
    }

    /// One-line description of a failed attempt.
    pub fn failure_summary(&self) -> Option<String> {
        match self {
            AttemptOutcome::Completed { .. } => None,
            AttemptOutcome::Cancelled { details, .. } => Some(details.to_string()),
            AttemptOutcome::TransportFailure { message } => {
                Some(format!("transport failure: {}", message))
            }
        }
    }
}

/// A speech client bound to one audio output for the lifetime of a run.
pub struct BoundSynthesizer<C> {
    client: C,
    output: AudioOutput,
}

impl<C: SpeechClient> BoundSynthesizer<C> {
    pub fn new(client: C, output: AudioOutput) -> Self {
        Self { client, output }
    }

    pub fn voice(&self) -> &str {
        self.client.voice()
    }

    pub fn output(&self) -> &AudioOutput {
        &self.output
    }

    /// Speak `text` and append the audio on completion.
    ///
    /// Only a failure to write the output file is returned as `Err`.
    pub async fn speak_text(&mut self, text: &str) -> Result<AttemptOutcome> {
        let result = match self.client.synthesize(text).await {
            Ok(result) => result,
            Err(e) => {
                return Ok(AttemptOutcome::TransportFailure {
                    message: e.to_string(),
                });
            }
        };

        match result.outcome {
            SynthesisOutcome::Completed { audio } => {
                self.output.append(&audio).await?;
                Ok(AttemptOutcome::Completed {
                    result_id: result.result_id,
                    bytes: audio.len(),
                })
            }
            SynthesisOutcome::Cancelled(details) => Ok(AttemptOutcome::Cancelled {
                result_id: result.result_id,
                details,
            }),
        }
    }

    /// Release the client and close the output.
    pub async fn finish(self) -> Result<u64> {
        self.output.finish().await
    }
}
