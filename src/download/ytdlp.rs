use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use crate::{metadata, PlaylistId};

use super::{DownloadError, Downloader};

/// Downloads every track of a playlist with `yt-dlp`, extracting the audio to mp3 and writing
/// an info json sidecar next to each file.
#[derive(Debug)]
pub struct YtDlpDownloader {
    ytdlp_path: PathBuf,
    audio_quality: String,
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::new("yt-dlp", "192K")
    }
}

impl YtDlpDownloader {
    pub fn new(ytdlp_path: impl Into<PathBuf>, audio_quality: impl Into<String>) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            audio_quality: audio_quality.into(),
        }
    }

    fn args(&self, playlist: &PlaylistId, output_dir: &Path) -> Vec<OsString> {
        let template = output_dir.join("%(title)s.%(ext)s");
        vec![
            "--format".into(),
            "bestaudio/best".into(),
            "--extract-audio".into(),
            "--audio-format".into(),
            metadata::AUDIO_EXTENSION.into(),
            "--audio-quality".into(),
            self.audio_quality.clone().into(),
            "--write-info-json".into(),
            "--yes-playlist".into(),
            "--no-progress".into(),
            "--output".into(),
            template.into_os_string(),
            playlist.to_url().into(),
        ]
    }
}

#[async_trait::async_trait]
impl Downloader for YtDlpDownloader {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn download(
        &self,
        playlist: &PlaylistId,
        output_dir: &Path,
    ) -> Result<(), DownloadError> {
        let mut ytdlp = tokio::process::Command::new(&self.ytdlp_path);
        ytdlp
            .args(self.args(playlist, output_dir))
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped());

        tracing::debug!(
            "yt-dlp downloading {} to {}",
            playlist.to_url(),
            output_dir.display()
        );
        let output = ytdlp.output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            tracing::error!("yt-dlp stderr:\n{}", stderr);
            return Err(DownloadError::Failed {
                status: output.status,
                stderr,
            });
        }

        Ok(())
    }
}
