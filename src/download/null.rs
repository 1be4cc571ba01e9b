use std::path::Path;

use crate::PlaylistId;

use super::{DownloadError, Downloader};

/// Downloads nothing, used to post-process a directory that is already populated.
#[derive(Debug, Default)]
pub struct NullDownloader;

#[async_trait::async_trait]
impl Downloader for NullDownloader {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn download(
        &self,
        _playlist: &PlaylistId,
        _output_dir: &Path,
    ) -> Result<(), DownloadError> {
        Ok(())
    }
}
