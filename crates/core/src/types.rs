use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One non-blank line of the input script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    /// 1-based position among the script's paragraphs.
    pub number: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParagraphAttempts {
    pub number: usize,
    pub attempts: u32,
    pub completed: bool,
}

/// A paragraph whose audio is missing from the run's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedParagraph {
    pub number: usize,
    pub text: String,
    pub attempts: u32,
    pub last_failure: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisReport {
    pub paragraphs: usize,
    pub synthesized: usize,
    pub audio_bytes: u64,
    pub attempts: Vec<ParagraphAttempts>,
    pub skipped: Vec<SkippedParagraph>,
}

impl SynthesisReport {
    pub fn total_attempts(&self) -> u32 {
        self.attempts.iter().map(|a| a.attempts).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Init,
    DirectoryPrepared,
    InputCopied,
    AudioSynthesized,
    VideoProduced,
    Complete,
    Aborted,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::Init => "init",
            RunState::DirectoryPrepared => "directory prepared",
            RunState::InputCopied => "input copied",
            RunState::AudioSynthesized => "audio synthesized",
            RunState::VideoProduced => "video produced",
            RunState::Complete => "complete",
            RunState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Written to `manifest.json` in the run directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub started_at: String,
    pub voice: String,
    pub input: PathBuf,
    pub audio: PathBuf,
    pub video: Option<PathBuf>,
    pub state: RunState,
    pub synthesis: SynthesisReport,
}
