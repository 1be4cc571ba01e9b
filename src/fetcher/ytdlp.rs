use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::{
    metadata::{self, Playlist, PlaylistTrack},
    PlaylistId,
};

use super::PlaylistFetcher;

/// Fetches playlist listings with `yt-dlp --flat-playlist`.
#[derive(Debug)]
pub struct YtDlpPlaylistFetcher {
    ytdlp_path: PathBuf,
}

impl Default for YtDlpPlaylistFetcher {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl YtDlpPlaylistFetcher {
    pub fn new(ytdlp_path: impl Into<PathBuf>) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
        }
    }
}

#[async_trait::async_trait]
impl PlaylistFetcher for YtDlpPlaylistFetcher {
    async fn get_playlist(&self, id: &PlaylistId) -> std::io::Result<Playlist> {
        let mut ytdlp = tokio::process::Command::new(&self.ytdlp_path);
        ytdlp
            .arg("--flat-playlist")
            .arg("--dump-single-json")
            .arg("--no-warnings")
            .arg(id.to_url())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        tracing::debug!("fetching playlist {} with {}", id, self.ytdlp_path.display());
        let output = ytdlp.output().await?;
        if !output.status.success() {
            tracing::error!(
                "yt-dlp stderr:\n{}",
                String::from_utf8_lossy(&output.stderr)
            );
            return Err(std::io::Error::other(format!(
                "yt-dlp failed to fetch playlist {}",
                id
            )));
        }

        parse_playlist(id, &output.stdout).map_err(std::io::Error::other)
    }
}

#[derive(Debug, Deserialize)]
struct FlatPlaylist {
    title: Option<String>,
    #[serde(default)]
    entries: Vec<Option<FlatEntry>>,
}

#[derive(Debug, Deserialize)]
struct FlatEntry {
    title: Option<String>,
    #[serde(default)]
    artists: Option<Vec<String>>,
    artist: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    duration_string: Option<String>,
}

impl FlatEntry {
    fn into_track(self) -> PlaylistTrack {
        let artists = match self.artists {
            Some(artists) if !artists.is_empty() => artists,
            _ => self
                .artist
                .map(|artist| artist.split(", ").map(str::to_owned).collect())
                .or(self.uploader.map(|uploader| vec![uploader]))
                .or(self.channel.map(|channel| vec![channel]))
                .unwrap_or_default(),
        };
        let duration = match self.duration {
            Some(secs) if secs.is_finite() && secs >= 0.0 => {
                metadata::format_duration(Duration::from_secs_f64(secs))
            }
            _ => self.duration_string.unwrap_or_default(),
        };
        PlaylistTrack {
            title: self
                .title
                .unwrap_or_else(|| metadata::UNKNOWN_TITLE.to_string()),
            artists,
            duration,
        }
    }
}

fn parse_playlist(id: &PlaylistId, json: &[u8]) -> serde_json::Result<Playlist> {
    let flat: FlatPlaylist = serde_json::from_slice(json)?;
    Ok(Playlist {
        id: id.clone(),
        title: flat.title.unwrap_or_else(|| id.to_string()),
        // unavailable videos show up as null entries
        tracks: flat
            .entries
            .into_iter()
            .flatten()
            .map(FlatEntry::into_track)
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAT_PLAYLIST: &str = r#"{
        "_type": "playlist",
        "id": "PLtest",
        "title": "Road Trip",
        "entries": [
            {
                "_type": "url",
                "id": "a1",
                "title": "First Song",
                "artists": ["Band A", "Singer B"],
                "duration": 215.0
            },
            {
                "_type": "url",
                "id": "a2",
                "title": "Second Song",
                "uploader": "Some Channel",
                "duration": null,
                "duration_string": "4:01"
            },
            null,
            {
                "_type": "url",
                "id": "a3",
                "artist": "X, Y"
            }
        ]
    }"#;

    #[test]
    fn test_parse_playlist() {
        let id = PlaylistId::new("PLtest").unwrap();
        let playlist = parse_playlist(&id, FLAT_PLAYLIST.as_bytes()).unwrap();
        assert_eq!(playlist.title, "Road Trip");
        assert_eq!(playlist.tracks.len(), 3);

        assert_eq!(playlist.tracks[0].title, "First Song");
        assert_eq!(playlist.tracks[0].artists_joined(), "Band A, Singer B");
        assert_eq!(playlist.tracks[0].duration, "3:35");

        assert_eq!(playlist.tracks[1].artists, vec!["Some Channel".to_string()]);
        assert_eq!(playlist.tracks[1].duration, "4:01");

        assert_eq!(playlist.tracks[2].title, metadata::UNKNOWN_TITLE);
        assert_eq!(playlist.tracks[2].artists, vec!["X".to_string(), "Y".to_string()]);
        assert_eq!(playlist.tracks[2].duration, "");
    }

    #[test]
    fn test_parse_playlist_without_title() {
        let id = PlaylistId::new("PLempty").unwrap();
        let playlist = parse_playlist(&id, br#"{"entries": []}"#).unwrap();
        assert_eq!(playlist.title, "PLempty");
        assert!(playlist.tracks.is_empty());
    }
}
