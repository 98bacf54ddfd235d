use std::{
    ffi::OsString,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{NarratorError, Result};

pub const TARGET_VIDEO_BITRATE_KBPS: u32 = 5000;
pub const VIDEO_CODEC: &str = "h264_nvenc";
pub const AUDIO_CODEC: &str = "aac";
/// Lines of transcoder stderr kept on failure.
pub const STDERR_TAIL_LINES: usize = 20;

/// Loop `input_video` for as long as `input_audio` plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeJob {
    pub input_video: PathBuf,
    pub input_audio: PathBuf,
    pub output_video: PathBuf,
}

impl TranscodeJob {
    /// Fixed ffmpeg argument list: infinite video loop, cut at the end of
    /// the audio, overwrite the output.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-stream_loop".into(), "-1".into(), "-i".into()];
        args.push(self.input_video.clone().into_os_string());
        args.push("-i".into());
        args.push(self.input_audio.clone().into_os_string());
        let bitrate = format!("{}k", TARGET_VIDEO_BITRATE_KBPS);
        for arg in [
            "-shortest",
            "-c:v",
            VIDEO_CODEC,
            "-b:v",
            bitrate.as_str(),
            "-c:a",
            AUDIO_CODEC,
            "-strict",
            "experimental",
            "-y",
        ] {
            args.push(arg.into());
        }
        args.push(self.output_video.clone().into_os_string());
        args
    }
}

pub trait Transcoder {
    async fn transcode(&self, job: &TranscodeJob) -> Result<()>;
}

/// ffmpeg run as a child process.
pub struct Ffmpeg {
    program: PathBuf,
}

impl Ffmpeg {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Transcoder for Ffmpeg {
    async fn transcode(&self, job: &TranscodeJob) -> Result<()> {
        let args = job.args();
        info!(
            "Running: {} {}",
            self.program.display(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => NarratorError::ToolNotFound {
                    tool: self.program.clone(),
                },
                _ => NarratorError::TranscoderSpawnFailed {
                    tool: self.program.clone(),
                    source: e,
                },
            })?;

        if !output.status.success() {
            return Err(NarratorError::TranscodeFailed {
                output_path: job.output_video.clone(),
                exit_code: output.status.code(),
                stderr_tail: stderr_tail(&output.stderr, STDERR_TAIL_LINES),
            });
        }

        debug!("Transcoder finished: {}", stderr_tail(&output.stderr, 1));
        Ok(())
    }
}

/// Last `lines` non-empty lines of captured stderr.
pub fn stderr_tail(stderr: &[u8], lines: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let kept: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect();
    let start = kept.len().saturating_sub(lines);
    kept[start..].join("\n")
}
