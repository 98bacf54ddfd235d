//! In-process stand-ins for the speech service and the transcoder.

use std::{
    collections::HashMap,
    io::{self, Write},
    sync::{Arc, Mutex},
};

use tracing::subscriber::DefaultGuard;

use crate::{
    error::{NarratorError, Result},
    speech::{CancellationDetails, SpeechClient, SynthesisOutcome, SynthesisResult},
    transcode::{TranscodeJob, Transcoder},
};

#[derive(Debug, Clone)]
pub enum Step {
    /// Audio is `<text>`.
    Complete,
    Cancel(CancellationDetails),
    Transport,
}

type Rule = Box<dyn Fn(&str, u32, usize) -> Step>;

pub struct ScriptedClient {
    voice: String,
    rule: Rule,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedClient {
    /// Steps are taken in call order; the last one repeats.
    pub fn new(steps: Vec<Step>) -> Self {
        Self::from_fn(move |_, _, index| {
            steps
                .get(index)
                .or_else(|| steps.last())
                .cloned()
                .unwrap_or(Step::Complete)
        })
    }

    pub fn always(step: Step) -> Self {
        Self::from_fn(move |_, _, _| step.clone())
    }

    /// `rule(text, attempt_for_text, call_index)`; attempts start at 1.
    pub fn from_fn<F>(rule: F) -> Self
    where
        F: Fn(&str, u32, usize) -> Step + 'static,
    {
        Self {
            voice: "bn-IN-TanishaaNeural".to_string(),
            rule: Box::new(rule),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Texts passed to `synthesize`, in order. Stays valid after the client
    /// is moved.
    pub fn call_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

impl SpeechClient for ScriptedClient {
    fn voice(&self) -> &str {
        &self.voice
    }

    async fn synthesize(&self, text: &str) -> Result<SynthesisResult> {
        let (attempt, index) = {
            let mut calls = self.calls.lock().unwrap();
            let index = calls.len();
            calls.push(text.to_string());
            let attempt = calls.iter().filter(|t| t.as_str() == text).count() as u32;
            (attempt, index)
        };

        let result_id = format!("result-{}", index + 1);
        match (self.rule)(text, attempt, index) {
            Step::Complete => Ok(SynthesisResult {
                result_id,
                outcome: SynthesisOutcome::Completed {
                    audio: format!("<{}>", text).into_bytes(),
                },
            }),
            Step::Cancel(details) => Ok(SynthesisResult {
                result_id,
                outcome: SynthesisOutcome::Cancelled(details),
            }),
            // A relative URL fails inside reqwest before any connection is made.
            Step::Transport => {
                reqwest::Client::new().post("not-a-url").send().await?;
                unreachable!("request to a relative URL succeeded")
            }
        }
    }
}

/// Count attempts per paragraph text.
pub fn attempts_by_text(calls: &[String]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for text in calls {
        *counts.entry(text.clone()).or_insert(0) += 1;
    }
    counts
}

/// Records jobs; writes a placeholder video unless told to fail.
#[derive(Default)]
pub struct RecordingTranscoder {
    jobs: Arc<Mutex<Vec<TranscodeJob>>>,
    fail_with: Option<i32>,
}

impl RecordingTranscoder {
    pub fn failing(exit_code: i32) -> Self {
        Self {
            jobs: Arc::default(),
            fail_with: Some(exit_code),
        }
    }

    pub fn jobs(&self) -> Vec<TranscodeJob> {
        self.jobs.lock().unwrap().clone()
    }
}

impl Transcoder for RecordingTranscoder {
    async fn transcode(&self, job: &TranscodeJob) -> Result<()> {
        self.jobs.lock().unwrap().push(job.clone());

        if let Some(code) = self.fail_with {
            return Err(NarratorError::TranscodeFailed {
                output_path: job.output_video.clone(),
                exit_code: Some(code),
                stderr_tail: "Conversion failed!".to_string(),
            });
        }

        tokio::fs::write(&job.output_video, b"looped video")
            .await
            .map_err(|source| NarratorError::TranscoderSpawnFailed {
                tool: "recording-transcoder".into(),
                source,
            })
    }
}

/// Log lines emitted on the current thread while the guard is held.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    pub fn install() -> (Self, DefaultGuard) {
        let logs = Self::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .without_time()
            .with_target(false)
            .with_level(false)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (logs, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }

    /// Number of lines containing `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.contents()
            .lines()
            .filter(|line| line.contains(needle))
            .count()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
