use crate::{metadata::Playlist, PlaylistId};

mod filesystem;
pub use filesystem::{FsCache, FsCachePlaylistFetcher, FsCachePlaylistFetcherParams};
mod null;
pub use null::NullPlaylistFetcher;
mod ytdlp;
pub use ytdlp::YtDlpPlaylistFetcher;

/// Looks up the title and track listing of a playlist.
#[async_trait::async_trait]
pub trait PlaylistFetcher: Send + Sync + 'static {
    async fn get_playlist(&self, id: &PlaylistId) -> std::io::Result<Playlist>;
}
