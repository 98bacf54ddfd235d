use std::path::{Path, PathBuf};

use crate::error::{NarratorError, Result};

pub const DEFAULT_VOICE: &str = "bn-IN-TanishaaNeural";
/// Azure's name for 16 kHz, 32 kbit/s mono MP3.
pub const DEFAULT_OUTPUT_FORMAT: &str = "audio-16khz-32kbitrate-mono-mp3";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

pub const AUDIO_FILE_NAME: &str = "mp3_output.mp3";
pub const VIDEO_FILE_NAME: &str = "final_opt.mp4";
pub const LOG_FILE_NAME: &str = "run.log";
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

pub const SPEECH_KEY_VAR: &str = "SPEECH_KEY";
pub const SPEECH_REGION_VAR: &str = "SPEECH_REGION";
pub const SPEECH_VOICE_VAR: &str = "SPEECH_VOICE";
pub const SPEECH_ENDPOINT_VAR: &str = "SPEECH_ENDPOINT";

/// Load a local `.env` file into the process environment, if there is one.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenv::dotenv().ok()
}

/// Credentials and voice settings for the speech service.
#[derive(Clone, Debug)]
pub struct SpeechSettings {
    pub subscription_key: String,
    pub region: String,
    pub voice: String,
    pub output_format: String,
    pub endpoint: Option<String>,
}

impl SpeechSettings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`. Key and region are required; blank
    /// values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let subscription_key = get(SPEECH_KEY_VAR).ok_or_else(|| NarratorError::MissingConfig {
            env_var: SPEECH_KEY_VAR.to_string(),
        })?;
        let region = get(SPEECH_REGION_VAR).ok_or_else(|| NarratorError::MissingConfig {
            env_var: SPEECH_REGION_VAR.to_string(),
        })?;

        Ok(Self {
            subscription_key,
            region,
            voice: get(SPEECH_VOICE_VAR).unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            endpoint: get(SPEECH_ENDPOINT_VAR),
        })
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    /// Synthesis URL: the override if set, otherwise the regional endpoint.
    pub fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!(
                "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
                self.region
            ),
        }
    }
}

/// Immutable per-process settings for a run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub input_text: PathBuf,
    pub loop_video: PathBuf,
    pub runs_dir: PathBuf,
    pub transcoder: PathBuf,
    pub audio_file_name: String,
    pub video_file_name: String,
    pub log_file_name: String,
    pub manifest_file_name: String,
    pub max_attempts: u32,
    /// Abort before transcoding when any paragraph was skipped.
    pub strict: bool,
    /// Stop after the audio phase.
    pub skip_video: bool,
}

impl RunConfig {
    /// Defaults laid out under `app_dir`: `data/input.txt`,
    /// `data/loops/sunset_and_the_couple.mov`, `runs/` and `bin/ffmpeg`.
    pub fn with_app_dir(app_dir: &Path) -> Self {
        let data_dir = app_dir.join("data");
        Self {
            input_text: data_dir.join("input.txt"),
            loop_video: data_dir.join("loops").join("sunset_and_the_couple.mov"),
            runs_dir: app_dir.join("runs"),
            transcoder: default_transcoder(app_dir),
            audio_file_name: AUDIO_FILE_NAME.to_string(),
            video_file_name: VIDEO_FILE_NAME.to_string(),
            log_file_name: LOG_FILE_NAME.to_string(),
            manifest_file_name: MANIFEST_FILE_NAME.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            strict: false,
            skip_video: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(NarratorError::InvalidConfig {
                reason: "max attempts must be at least 1".to_string(),
            });
        }

        let names = [
            &self.audio_file_name,
            &self.video_file_name,
            &self.log_file_name,
            &self.manifest_file_name,
        ];
        for name in names {
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(NarratorError::InvalidConfig {
                    reason: format!("'{}' is not a plain file name", name),
                });
            }
        }

        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::with_app_dir(Path::new("."))
    }
}

/// The bundled `bin/ffmpeg` when present, otherwise `ffmpeg` from `PATH`.
pub fn default_transcoder(app_dir: &Path) -> PathBuf {
    let bundled = app_dir.join("bin").join("ffmpeg");
    if bundled.is_file() {
        bundled
    } else {
        PathBuf::from("ffmpeg")
    }
}
