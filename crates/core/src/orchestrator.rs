use std::{
    io::ErrorKind,
    path::PathBuf,
    time::{Duration, Instant},
};

use chrono::{DateTime, Local};
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::{
    config::RunConfig,
    error::{NarratorError, Result},
    run::{RunId, RunLayout, create_run_dir, ensure_runs_root},
    speech::{AudioOutput, BoundSynthesizer, SpeechClient},
    synthesis::synthesize_paragraphs,
    text::{check_input_path, load_paragraphs},
    transcode::{TranscodeJob, Transcoder},
    types::{RunManifest, RunState, SynthesisReport},
};

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    pub layout: RunLayout,
    pub synthesis: SynthesisReport,
    pub video: Option<PathBuf>,
    pub elapsed: Duration,
}

/// A run whose directory exists and is ready to execute.
pub struct PreparedRun {
    config: RunConfig,
    run_id: RunId,
    layout: RunLayout,
    started_at: DateTime<Local>,
    started: Instant,
    state: RunState,
    voice: String,
    synthesis: Option<SynthesisReport>,
}

impl PreparedRun {
    /// Validate inputs and create the run directory.
    ///
    /// Nothing is created on disk when the input path is bad.
    pub async fn prepare(config: RunConfig, run_id: RunId) -> Result<Self> {
        let layout = match prepare_layout(&config, &run_id).await {
            Ok(layout) => layout,
            Err(e) => {
                error!(
                    "Run {} aborted in state '{}': {}",
                    run_id,
                    aborted_from(&e),
                    e
                );
                return Err(e);
            }
        };
        debug!(
            "Run state: {} -> {}",
            RunState::Init,
            RunState::DirectoryPrepared
        );

        Ok(Self {
            config,
            run_id,
            layout,
            started_at: Local::now(),
            started: Instant::now(),
            state: RunState::DirectoryPrepared,
            voice: String::new(),
            synthesis: None,
        })
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Copy the input, synthesize every paragraph, then loop the video.
    pub async fn execute<C, T>(mut self, client: C, transcoder: &T) -> Result<RunReport>
    where
        C: SpeechClient,
        T: Transcoder,
    {
        match self.drive(client, transcoder).await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!("Run {} aborted in state '{}': {}", self.run_id, self.state, e);
                self.state = RunState::Aborted;
                if self.synthesis.is_some()
                    && let Err(manifest_err) = self.write_manifest(None).await
                {
                    warn!("Could not record manifest: {}", manifest_err);
                }
                Err(e)
            }
        }
    }

    async fn drive<C, T>(&mut self, client: C, transcoder: &T) -> Result<RunReport>
    where
        C: SpeechClient,
        T: Transcoder,
    {
        self.voice = client.voice().to_string();
        info!("Voice: {}", self.voice);

        fs::copy(&self.config.input_text, &self.layout.input_copy)
            .await
            .map_err(|source| NarratorError::InputCopyFailed {
                path: self.layout.input_copy.clone(),
                source,
            })?;
        self.advance(RunState::InputCopied);

        let paragraphs = load_paragraphs(&self.layout.input_copy).await?;
        info!(
            "Starting creation of MP3 audio file... ({} paragraphs)",
            paragraphs.len()
        );

        let output = AudioOutput::create(&self.layout.audio).await?;
        let mut synthesizer = BoundSynthesizer::new(client, output);
        let synthesis = synthesize_paragraphs(
            &mut synthesizer,
            &paragraphs,
            self.config.max_attempts,
            self.started,
        )
        .await?;
        synthesizer.finish().await?;

        self.synthesis = Some(synthesis.clone());
        self.advance(RunState::AudioSynthesized);
        self.write_manifest(None).await?;
        info!(
            "MP3 audio file completed. File saved at: {}",
            self.layout.audio.display()
        );

        if !synthesis.is_complete() {
            warn!(
                "{} of {} paragraphs were skipped, see {}",
                synthesis.skipped.len(),
                synthesis.paragraphs,
                self.layout.manifest.display()
            );
            if self.config.strict {
                return Err(NarratorError::SynthesisIncomplete {
                    skipped: synthesis.skipped.len(),
                    total: synthesis.paragraphs,
                });
            }
        }

        if synthesis.audio_bytes == 0 {
            return Err(NarratorError::NoAudioSynthesized {
                audio_path: self.layout.audio.clone(),
            });
        }

        let video = if self.config.skip_video {
            info!("Skipping creation of loop video");
            None
        } else {
            info!("Starting creation of loop video...");
            let job = TranscodeJob {
                input_video: self.config.loop_video.clone(),
                input_audio: self.layout.audio.clone(),
                output_video: self.layout.video.clone(),
            };
            transcoder.transcode(&job).await?;
            self.advance(RunState::VideoProduced);
            info!(
                "Video file completed. File saved at: {}",
                self.layout.video.display()
            );
            Some(self.layout.video.clone())
        };

        self.advance(RunState::Complete);
        // Video is already written; a manifest failure here is only warned.
        if let Err(e) = self.write_manifest(video.clone()).await {
            warn!("Could not record manifest: {}", e);
        }

        Ok(RunReport {
            run_id: self.run_id.clone(),
            layout: self.layout.clone(),
            synthesis,
            video,
            elapsed: self.started.elapsed(),
        })
    }

    fn advance(&mut self, next: RunState) {
        debug!("Run state: {} -> {}", self.state, next);
        self.state = next;
    }

    async fn write_manifest(&self, video: Option<PathBuf>) -> Result<()> {
        let manifest = RunManifest {
            run_id: self.run_id.to_string(),
            started_at: self.started_at.to_rfc3339(),
            voice: self.voice.clone(),
            input: self.layout.input_copy.clone(),
            audio: self.layout.audio.clone(),
            video,
            state: self.state,
            synthesis: self.synthesis.clone().unwrap_or_default(),
        };
        let pretty_json = serde_json::to_string_pretty(&manifest)?;
        fs::write(&self.layout.manifest, &pretty_json)
            .await
            .map_err(|source| NarratorError::ManifestWriteFailed {
                path: self.layout.manifest.clone(),
                source,
            })
    }
}

async fn prepare_layout(config: &RunConfig, run_id: &RunId) -> Result<RunLayout> {
    config.validate()?;
    check_input_path(&config.input_text).await?;
    if !config.skip_video {
        check_loop_video(config).await?;
    }

    ensure_runs_root(&config.runs_dir).await?;
    let layout = RunLayout::new(config, run_id);
    create_run_dir(&layout.dir).await?;
    Ok(layout)
}

/// State a run was in when `prepare` failed with `err`.
fn aborted_from(err: &NarratorError) -> RunState {
    if err.is_run_directory_conflict() {
        RunState::DirectoryPrepared
    } else {
        RunState::Init
    }
}

async fn check_loop_video(config: &RunConfig) -> Result<()> {
    match fs::metadata(&config.loop_video).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(NarratorError::LoopVideoNotAFile {
            path: config.loop_video.clone(),
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(NarratorError::LoopVideoNotFound {
            path: config.loop_video.clone(),
        }),
        Err(source) => Err(NarratorError::InputUnreadable {
            path: config.loop_video.clone(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{
        error::RunExit,
        speech::{CancellationDetails, CancellationErrorCode},
        testing::{CapturedLogs, RecordingTranscoder, ScriptedClient, Step},
    };

    const SCRIPT: &str = "First paragraph.\n\nSecond paragraph.\n";

    fn run_id() -> RunId {
        RunId::at(&Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())
    }

    fn app_dir(script: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir_all(data.join("loops")).unwrap();
        std::fs::write(data.join("input.txt"), script).unwrap();
        std::fs::write(data.join("loops").join("sunset_and_the_couple.mov"), b"mov").unwrap();
        dir
    }

    fn read_manifest(layout: &RunLayout) -> RunManifest {
        serde_json::from_str(&std::fs::read_to_string(&layout.manifest).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn successful_run_produces_all_artifacts() {
        let app = app_dir(SCRIPT);
        let config = RunConfig::with_app_dir(app.path());
        let transcoder = RecordingTranscoder::default();

        let run = PreparedRun::prepare(config, run_id()).await.unwrap();
        assert_eq!(run.state(), RunState::DirectoryPrepared);

        let report = run
            .execute(ScriptedClient::always(Step::Complete), &transcoder)
            .await
            .unwrap();

        let dir = app.path().join("runs").join("run_20240101_120000");
        assert_eq!(report.layout.dir, dir);
        assert_eq!(
            std::fs::read_to_string(dir.join("input.txt")).unwrap(),
            SCRIPT
        );
        assert_eq!(
            std::fs::read(dir.join("mp3_output.mp3")).unwrap(),
            b"<First paragraph.><Second paragraph.>"
        );
        assert!(dir.join("final_opt.mp4").is_file());
        assert_eq!(report.video, Some(dir.join("final_opt.mp4")));

        let jobs = transcoder.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(
            jobs[0].input_video,
            app.path().join("data/loops/sunset_and_the_couple.mov")
        );
        assert_eq!(jobs[0].input_audio, dir.join("mp3_output.mp3"));
        assert_eq!(jobs[0].output_video, dir.join("final_opt.mp4"));

        let manifest = read_manifest(&report.layout);
        assert_eq!(manifest.run_id, "run_20240101_120000");
        assert_eq!(manifest.state, RunState::Complete);
        assert_eq!(manifest.voice, "bn-IN-TanishaaNeural");
        assert_eq!(manifest.synthesis.synthesized, 2);
        assert!(manifest.synthesis.skipped.is_empty());
    }

    #[tokio::test]
    async fn missing_input_creates_nothing() {
        let app = tempfile::tempdir().unwrap();
        let config = RunConfig::with_app_dir(app.path());

        let err = PreparedRun::prepare(config, run_id()).await.err().unwrap();
        assert!(err.is_input_path_error());
        assert!(matches!(err, NarratorError::InputNotFound { .. }));
        assert_eq!(err.run_exit(), RunExit::BadInput);
        assert!(!app.path().join("runs").exists());
    }

    #[tokio::test]
    async fn input_directory_is_rejected() {
        let app = app_dir(SCRIPT);
        let config = RunConfig {
            input_text: app.path().join("data"),
            ..RunConfig::with_app_dir(app.path())
        };

        let err = PreparedRun::prepare(config, run_id()).await.err().unwrap();
        assert!(matches!(err, NarratorError::InputNotAFile { .. }));
        assert!(!app.path().join("runs").exists());
    }

    #[tokio::test]
    async fn missing_loop_video_is_rejected_up_front() {
        let app = app_dir(SCRIPT);
        let config = RunConfig {
            loop_video: app.path().join("data/loops/missing.mov"),
            ..RunConfig::with_app_dir(app.path())
        };

        let err = PreparedRun::prepare(config, run_id()).await.err().unwrap();
        assert!(matches!(err, NarratorError::LoopVideoNotFound { .. }));
        assert!(!app.path().join("runs").exists());
    }

    #[tokio::test]
    async fn run_path_that_is_a_file_conflicts() {
        let app = app_dir(SCRIPT);
        let runs = app.path().join("runs");
        std::fs::create_dir(&runs).unwrap();
        std::fs::write(runs.join("run_20240101_120000"), b"not a dir").unwrap();

        let config = RunConfig::with_app_dir(app.path());
        let err = PreparedRun::prepare(config, run_id()).await.err().unwrap();

        assert!(err.is_run_directory_conflict());
        assert!(matches!(err, NarratorError::RunPathNotADirectory { .. }));
        assert_eq!(err.run_exit(), RunExit::BadInput);
    }

    #[tokio::test]
    async fn second_run_in_same_second_conflicts() {
        let app = app_dir(SCRIPT);
        let config = RunConfig::with_app_dir(app.path());

        let _first = PreparedRun::prepare(config.clone(), run_id()).await.unwrap();
        let err = PreparedRun::prepare(config, run_id()).await.err().unwrap();
        assert!(matches!(err, NarratorError::RunDirectoryExists { .. }));
    }

    #[tokio::test]
    async fn empty_input_stops_before_transcoding() {
        let app = app_dir("\n   \n");
        let config = RunConfig::with_app_dir(app.path());
        let transcoder = RecordingTranscoder::default();
        let client = ScriptedClient::always(Step::Complete);
        let calls = client.call_log();

        let run = PreparedRun::prepare(config, run_id()).await.unwrap();
        let layout = run.layout().clone();
        let err = run.execute(client, &transcoder).await.unwrap_err();

        assert!(matches!(err, NarratorError::NoAudioSynthesized { .. }));
        assert_eq!(err.run_exit(), RunExit::SynthesisFailure);
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(std::fs::metadata(&layout.audio).unwrap().len(), 0);
        assert!(transcoder.jobs().is_empty());
        assert!(!layout.video.exists());

        let manifest = read_manifest(&layout);
        assert_eq!(manifest.state, RunState::Aborted);
        assert_eq!(manifest.synthesis.paragraphs, 0);
    }

    fn fails_on_second() -> ScriptedClient {
        ScriptedClient::from_fn(|text, _, _| {
            if text.starts_with("Second") {
                Step::Cancel(CancellationDetails::error(
                    CancellationErrorCode::ServiceError,
                    "HTTP 500",
                ))
            } else {
                Step::Complete
            }
        })
    }

    #[tokio::test]
    async fn skipped_paragraphs_are_recorded_and_run_continues() {
        let app = app_dir(SCRIPT);
        let config = RunConfig::with_app_dir(app.path());
        let transcoder = RecordingTranscoder::default();
        let client = fails_on_second();
        let calls = client.call_log();

        let run = PreparedRun::prepare(config, run_id()).await.unwrap();
        let report = run.execute(client, &transcoder).await.unwrap();

        assert_eq!(calls.lock().unwrap().len(), 1 + 10);
        assert_eq!(report.synthesis.skipped.len(), 1);
        assert_eq!(report.synthesis.skipped[0].text, "Second paragraph.");
        assert_eq!(transcoder.jobs().len(), 1);

        let manifest = read_manifest(&report.layout);
        assert_eq!(manifest.state, RunState::Complete);
        assert_eq!(manifest.synthesis.skipped[0].number, 2);
        assert_eq!(manifest.synthesis.skipped[0].attempts, 10);
    }

    #[tokio::test]
    async fn strict_mode_aborts_on_skipped_paragraphs() {
        let app = app_dir(SCRIPT);
        let config = RunConfig {
            strict: true,
            max_attempts: 2,
            ..RunConfig::with_app_dir(app.path())
        };
        let transcoder = RecordingTranscoder::default();

        let run = PreparedRun::prepare(config, run_id()).await.unwrap();
        let layout = run.layout().clone();
        let err = run.execute(fails_on_second(), &transcoder).await.unwrap_err();

        assert!(matches!(
            err,
            NarratorError::SynthesisIncomplete {
                skipped: 1,
                total: 2
            }
        ));
        assert_eq!(err.run_exit().code(), 2);
        assert!(transcoder.jobs().is_empty());

        let manifest = read_manifest(&layout);
        assert_eq!(manifest.state, RunState::Aborted);
        assert_eq!(manifest.synthesis.skipped.len(), 1);
        assert_eq!(manifest.synthesis.skipped[0].attempts, 2);
    }

    #[tokio::test]
    async fn transcode_failure_aborts_run() {
        let app = app_dir(SCRIPT);
        let config = RunConfig::with_app_dir(app.path());
        let transcoder = RecordingTranscoder::failing(1);

        let run = PreparedRun::prepare(config, run_id()).await.unwrap();
        let layout = run.layout().clone();
        let err = run
            .execute(ScriptedClient::always(Step::Complete), &transcoder)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            NarratorError::TranscodeFailed {
                exit_code: Some(1),
                ..
            }
        ));
        assert_eq!(err.run_exit(), RunExit::TranscodeFailure);
        assert!(layout.audio.is_file());
        assert_eq!(read_manifest(&layout).state, RunState::Aborted);
    }

    #[tokio::test]
    async fn skip_video_stops_after_audio() {
        let app = tempfile::tempdir().unwrap();
        std::fs::write(app.path().join("script.txt"), SCRIPT).unwrap();
        let config = RunConfig {
            input_text: app.path().join("script.txt"),
            skip_video: true,
            ..RunConfig::with_app_dir(app.path())
        };
        let transcoder = RecordingTranscoder::default();

        let run = PreparedRun::prepare(config, run_id()).await.unwrap();
        let report = run
            .execute(ScriptedClient::always(Step::Complete), &transcoder)
            .await
            .unwrap();

        assert!(report.video.is_none());
        assert!(transcoder.jobs().is_empty());
        assert!(report.layout.input_copy.ends_with(Path::new("script.txt")));
        assert!(report.layout.input_copy.is_file());
        assert_eq!(read_manifest(&report.layout).state, RunState::Complete);
    }

    #[tokio::test]
    async fn loop_video_directory_is_not_a_file() {
        let app = app_dir(SCRIPT);
        let config = RunConfig {
            loop_video: app.path().join("data/loops"),
            ..RunConfig::with_app_dir(app.path())
        };

        let err = PreparedRun::prepare(config, run_id()).await.err().unwrap();
        assert!(matches!(err, NarratorError::LoopVideoNotAFile { .. }));
        assert_eq!(err.run_exit(), RunExit::BadInput);
        assert!(!app.path().join("runs").exists());
    }

    #[tokio::test]
    async fn prepare_failures_log_the_state_they_abort_from() {
        let (logs, _guard) = CapturedLogs::install();

        let empty = tempfile::tempdir().unwrap();
        PreparedRun::prepare(RunConfig::with_app_dir(empty.path()), run_id())
            .await
            .err()
            .unwrap();
        assert_eq!(
            logs.count("Run run_20240101_120000 aborted in state 'init': Input file does not exist"),
            1
        );

        let app = app_dir(SCRIPT);
        let runs = app.path().join("runs");
        std::fs::create_dir(&runs).unwrap();
        std::fs::write(runs.join("run_20240101_120000"), b"not a dir").unwrap();
        PreparedRun::prepare(RunConfig::with_app_dir(app.path()), run_id())
            .await
            .err()
            .unwrap();
        assert_eq!(
            logs.count("Run run_20240101_120000 aborted in state 'directory prepared'"),
            1
        );
    }

    #[tokio::test]
    async fn input_copy_failure_is_bad_input() {
        let app = app_dir(SCRIPT);
        let config = RunConfig::with_app_dir(app.path());
        let client = ScriptedClient::always(Step::Complete);
        let calls = client.call_log();

        let run = PreparedRun::prepare(config, run_id()).await.unwrap();
        let layout = run.layout().clone();
        std::fs::create_dir(&layout.input_copy).unwrap();

        let err = run
            .execute(client, &RecordingTranscoder::default())
            .await
            .unwrap_err();
        assert!(matches!(err, NarratorError::InputCopyFailed { .. }));
        assert_eq!(err.run_exit(), RunExit::BadInput);
        assert!(calls.lock().unwrap().is_empty());
        assert!(!layout.manifest.exists());
    }

    #[tokio::test]
    async fn manifest_write_failure_is_a_synthesis_failure() {
        let app = app_dir(SCRIPT);
        let config = RunConfig::with_app_dir(app.path());
        let transcoder = RecordingTranscoder::default();

        let run = PreparedRun::prepare(config, run_id()).await.unwrap();
        let layout = run.layout().clone();
        std::fs::create_dir(&layout.manifest).unwrap();

        let err = run
            .execute(ScriptedClient::always(Step::Complete), &transcoder)
            .await
            .unwrap_err();
        assert!(matches!(err, NarratorError::ManifestWriteFailed { .. }));
        assert_eq!(err.run_exit(), RunExit::SynthesisFailure);
        assert!(layout.audio.is_file());
        assert!(transcoder.jobs().is_empty());
    }
}
