use std::{
    fmt,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local, TimeZone};
use tokio::fs;

use crate::{
    config::RunConfig,
    error::{NarratorError, Result},
};

/// `run_<YYYYMMDD_HHMMSS>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    pub fn now() -> Self {
        Self::at(&Local::now())
    }

    pub fn at<Tz>(time: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        Self(format!("run_{}", time.format("%Y%m%d_%H%M%S")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Paths of everything a run writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    pub dir: PathBuf,
    pub input_copy: PathBuf,
    pub audio: PathBuf,
    pub video: PathBuf,
    pub log: PathBuf,
    pub manifest: PathBuf,
}

impl RunLayout {
    pub fn new(config: &RunConfig, run_id: &RunId) -> Self {
        let dir = config.runs_dir.join(run_id.as_str());
        let input_name = config
            .input_text
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "input.txt".into());

        Self {
            input_copy: dir.join(input_name),
            audio: dir.join(&config.audio_file_name),
            video: dir.join(&config.video_file_name),
            log: dir.join(&config.log_file_name),
            manifest: dir.join(&config.manifest_file_name),
            dir,
        }
    }
}

/// Make sure the runs root is a directory, creating it if needed.
pub async fn ensure_runs_root(runs_dir: &Path) -> Result<()> {
    match fs::metadata(runs_dir).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(NarratorError::RunPathNotADirectory {
            path: runs_dir.to_path_buf(),
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => fs::create_dir_all(runs_dir)
            .await
            .map_err(|source| NarratorError::RunDirectoryFailed {
                path: runs_dir.to_path_buf(),
                source,
            }),
        Err(source) => Err(NarratorError::RunDirectoryFailed {
            path: runs_dir.to_path_buf(),
            source,
        }),
    }
}

/// Create a fresh run directory. An existing path of any kind is a conflict.
pub async fn create_run_dir(dir: &Path) -> Result<()> {
    match fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => {
            return Err(NarratorError::RunDirectoryExists {
                path: dir.to_path_buf(),
            });
        }
        Ok(_) => {
            return Err(NarratorError::RunPathNotADirectory {
                path: dir.to_path_buf(),
            });
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(source) => {
            return Err(NarratorError::RunDirectoryFailed {
                path: dir.to_path_buf(),
                source,
            });
        }
    }

    // A concurrent run may have won the race since the check.
    fs::create_dir(dir).await.map_err(|e| match e.kind() {
        ErrorKind::AlreadyExists => NarratorError::RunDirectoryExists {
            path: dir.to_path_buf(),
        },
        _ => NarratorError::RunDirectoryFailed {
            path: dir.to_path_buf(),
            source: e,
        },
    })
}
