use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::{
    metadata::{self, TrackInfo},
    tag,
};

use super::{PipelineStage, StageReport};

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("failed to read sidecar: {0}")]
    ReadSidecar(#[source] std::io::Error),
    #[error("malformed sidecar: {0}")]
    ParseSidecar(#[from] serde_json::Error),
    #[error("destination '{0}' already exists")]
    DestinationExists(PathBuf),
    #[error("failed to rename: {0}")]
    Rename(#[source] std::io::Error),
    #[error("failed to write tag: {0}")]
    Tag(#[from] id3::Error),
}

/// Renames every audio file after its sidecar metadata and tags it with title and artist.
#[derive(Debug, Default)]
pub struct RenameStage;

impl RenameStage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl PipelineStage for RenameStage {
    fn name(&self) -> &'static str {
        "rename"
    }

    async fn process(&self, work_dir: &Path) -> std::io::Result<StageReport> {
        let work_dir = work_dir.to_path_buf();
        tokio::task::spawn_blocking(move || rename_and_tag(&work_dir))
            .await
            .map_err(|err| std::io::Error::other(err.to_string()))?
    }
}

/// Rename and tag every `*.mp3` in `dir` that has a matching `*.info.json` sidecar.
///
/// Files without a sidecar are skipped. A failure on one file is logged and recorded in the
/// report, the remaining files are still processed. Only a failure to list `dir` is returned
/// as an error.
pub fn rename_and_tag(dir: &Path) -> std::io::Result<StageReport> {
    let mut report = StageReport::default();

    for audio in list_audio_files(dir, &mut report)? {
        let sidecar = sidecar_path(&audio);
        if !sidecar.is_file() {
            tracing::debug!("no sidecar for {}, skipping", audio.display());
            report.skipped.push(audio);
            continue;
        }

        match rename_and_tag_file(&audio, &sidecar) {
            Ok(renamed) => {
                tracing::info!("renamed and tagged: {}", file_name(&renamed));
                report.processed.push(renamed);
            }
            Err(err) => {
                tracing::error!("error processing metadata for {}: {}", file_name(&audio), err);
                report.failed.push((audio, err.to_string()));
            }
        }
    }

    Ok(report)
}

fn rename_and_tag_file(audio: &Path, sidecar: &Path) -> Result<PathBuf, TrackError> {
    let contents = std::fs::read(sidecar).map_err(TrackError::ReadSidecar)?;
    let info = TrackInfo::from_slice(&contents)?;

    let renamed = audio.with_file_name(info.display_name());
    if renamed != audio {
        if renamed.exists() {
            return Err(TrackError::DestinationExists(renamed));
        }
        std::fs::rename(audio, &renamed).map_err(TrackError::Rename)?;
    }

    tag::write_title_artist(&renamed, info.song_name(), info.artist_name())?;
    Ok(renamed)
}

/// Unreadable entries are recorded as failures in `report` and left out.
fn list_audio_files(dir: &Path, report: &mut StageReport) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::error!("error reading entry of {}: {}", dir.display(), err);
                report.failed.push((dir.to_path_buf(), err.to_string()));
                continue;
            }
        };
        let path = entry.path();
        if !path.extension().is_some_and(|ext| ext == metadata::AUDIO_EXTENSION) {
            continue;
        }
        match entry.file_type() {
            Ok(file_type) if file_type.is_dir() => {}
            Ok(_) => files.push(path),
            Err(err) => {
                tracing::error!("error inspecting {}: {}", file_name(&path), err);
                report.failed.push((path, err.to_string()));
            }
        }
    }
    // renaming while iterating the directory could yield renamed files again
    files.sort();
    Ok(files)
}

fn sidecar_path(audio: &Path) -> PathBuf {
    let mut name = audio
        .file_stem()
        .map(|stem| stem.to_os_string())
        .unwrap_or_else(OsString::new);
    name.push(metadata::SIDECAR_SUFFIX);
    audio.with_file_name(name)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
