//! Narrator Core Library
//!
//! Turns a plain-text script into narrated audio with a cloud speech
//! service, then loops a background video to the audio's length with ffmpeg.

pub mod config;
pub mod error;
pub mod format;
pub mod orchestrator;
pub mod run;
pub mod speech;
pub mod synthesis;
pub mod text;
pub mod transcode;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export commonly used items at crate root
pub use config::{RunConfig, SpeechSettings, load_dotenv};
pub use error::{NarratorError, Result, RunExit};
pub use format::{format_duration, format_run_summary};
pub use orchestrator::{PreparedRun, RunReport};
pub use run::{RunId, RunLayout};
pub use speech::{AzureSpeechClient, SpeechClient};
pub use text::{load_paragraphs, split_paragraphs};
pub use transcode::{Ffmpeg, TranscodeJob, Transcoder};
pub use types::{Paragraph, RunManifest, RunState, SkippedParagraph, SynthesisReport};
