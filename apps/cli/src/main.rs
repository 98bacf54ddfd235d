use std::{path::PathBuf, process::ExitCode};

use anyhow::Result;
use clap::Parser;
use console::style;
use narrator_core::{
    AzureSpeechClient, Ffmpeg, NarratorError, PreparedRun, RunConfig, RunExit, RunId,
    SpeechSettings, format_duration, format_run_summary, load_dotenv,
};
use tracing::info;

mod logging;

#[derive(Parser)]
#[command(name = "narrator")]
#[command(about = "Narrate a text script with cloud TTS and loop a background video to its length")]
struct Cli {
    /// Script to narrate, one paragraph per non-blank line [default: data/input.txt]
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Background clip looped under the narration [default: data/loops/sunset_and_the_couple.mov]
    #[arg(short, long)]
    video: Option<PathBuf>,

    /// Directory holding one sub-directory per run [default: runs]
    #[arg(long)]
    runs_dir: Option<PathBuf>,

    /// Speech voice name (overrides SPEECH_VOICE)
    #[arg(long)]
    voice: Option<String>,

    /// Path to the ffmpeg binary [default: bin/ffmpeg, then ffmpeg on PATH]
    #[arg(long, env = "NARRATOR_FFMPEG")]
    ffmpeg: Option<PathBuf>,

    /// Synthesis attempts per paragraph
    #[arg(long, default_value_t = narrator_core::config::DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Fail the run if any paragraph could not be synthesized
    #[arg(long)]
    strict: bool,

    /// Only produce the audio file
    #[arg(long)]
    skip_video: bool,
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        let defaults = RunConfig::default();
        RunConfig {
            input_text: self.input.clone().unwrap_or(defaults.input_text),
            loop_video: self.video.clone().unwrap_or(defaults.loop_video),
            runs_dir: self.runs_dir.clone().unwrap_or(defaults.runs_dir),
            transcoder: self.ffmpeg.clone().unwrap_or(defaults.transcoder),
            max_attempts: self.max_attempts,
            strict: self.strict,
            skip_video: self.skip_video,
            ..defaults
        }
    }
}

fn fail(err: &NarratorError) -> ExitCode {
    eprintln!("{} {}", style("Error:").red().bold(), err);
    ExitCode::from(err.run_exit().code())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    load_dotenv();

    // Validate credentials early
    let settings = match SpeechSettings::from_env() {
        Ok(settings) => match &cli.voice {
            Some(voice) => settings.with_voice(voice),
            None => settings,
        },
        Err(e) => return Ok(fail(&e)),
    };

    let run = match PreparedRun::prepare(cli.run_config(), RunId::now()).await {
        Ok(run) => run,
        Err(e) => return Ok(fail(&e)),
    };

    let _log_guard = logging::init(&run.layout().log)?;

    println!(
        "\n{}  {}\n",
        style("narrator").cyan().bold(),
        style("Script to Video").dim()
    );
    info!("Starting run, Run ID: {}", run.run_id());
    info!("Run dir: {}", run.layout().dir.display());

    let client = match AzureSpeechClient::new(settings) {
        Ok(client) => client,
        Err(e) => return Ok(fail(&e)),
    };
    let ffmpeg = Ffmpeg::new(run.config().transcoder.clone());

    let report = match run.execute(client, &ffmpeg).await {
        Ok(report) => report,
        Err(e) => return Ok(fail(&e)),
    };

    println!("{}", style("─".repeat(60)).dim());
    print!("{}", format_run_summary(&report));
    println!(
        "\n{} {}\n",
        style("Total time:").dim(),
        style(format_duration(report.elapsed)).cyan().bold()
    );
    if !report.synthesis.is_complete() {
        println!(
            "{} {} paragraph(s) have no audio, see {}",
            style("Warning:").yellow().bold(),
            report.synthesis.skipped.len(),
            report.layout.manifest.display()
        );
    }

    Ok(ExitCode::from(RunExit::Success.code()))
}
