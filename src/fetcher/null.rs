use crate::{metadata::Playlist, PlaylistId};

use super::PlaylistFetcher;

#[derive(Debug)]
pub struct NullPlaylistFetcher;

#[async_trait::async_trait]
impl PlaylistFetcher for NullPlaylistFetcher {
    async fn get_playlist(&self, _id: &PlaylistId) -> std::io::Result<Playlist> {
        Err(std::io::Error::other("NullPlaylistFetcher::get_playlist"))
    }
}
