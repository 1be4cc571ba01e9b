use std::path::Path;

use thiserror::Error;

use crate::PlaylistId;

mod null;
pub use null::NullDownloader;

mod ytdlp;
pub use ytdlp::YtDlpDownloader;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("failed to run downloader: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("downloader exited with {status}: {stderr}")]
    Failed {
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Populates a directory with one audio file and one metadata sidecar per playlist track.
///
/// For a track downloaded as `<base>.mp3` the sidecar must be `<base>.info.json`.
#[async_trait::async_trait]
pub trait Downloader: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn download(&self, playlist: &PlaylistId, output_dir: &Path)
        -> Result<(), DownloadError>;
}
