use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::PlaylistId;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Extension of the final audio files.
pub const AUDIO_EXTENSION: &str = "mp3";
/// Suffix of the metadata sidecar written next to each audio file.
pub const SIDECAR_SUFFIX: &str = ".info.json";
/// Suffix of raw media left behind by the downloader before transcoding.
pub const INTERMEDIATE_SUFFIX: &str = ".webm";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    pub title: String,
    pub tracks: Vec<PlaylistTrack>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistTrack {
    pub title: String,
    pub artists: Vec<String>,
    /// Display duration, `m:ss` or `h:mm:ss`. Empty when unknown.
    pub duration: String,
}

impl PlaylistTrack {
    pub fn artists_joined(&self) -> String {
        self.artists.join(", ")
    }
}

/// The subset of a downloader sidecar document used for renaming and tagging.
///
/// Every other key in the document is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TrackInfo {
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl TrackInfo {
    pub fn from_slice(contents: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(contents)
    }

    pub fn artist_name(&self) -> &str {
        first_non_empty([&self.artist, &self.uploader, &self.channel]).unwrap_or(UNKNOWN_ARTIST)
    }

    pub fn song_name(&self) -> &str {
        first_non_empty([&self.track, &self.title]).unwrap_or(UNKNOWN_TITLE)
    }

    /// File name for the renamed audio file, `"{song} - {artist}.mp3"`.
    pub fn display_name(&self) -> String {
        display_name(self.song_name(), self.artist_name())
    }
}

fn first_non_empty<'a, const N: usize>(fields: [&'a Option<String>; N]) -> Option<&'a str> {
    fields
        .into_iter()
        .filter_map(|field| field.as_deref())
        .map(str::trim)
        .find(|value| !value.is_empty())
}

pub fn display_name(song: &str, artist: &str) -> String {
    format!(
        "{} - {}.{}",
        sanitize_component(song, UNKNOWN_TITLE),
        sanitize_component(artist, UNKNOWN_ARTIST),
        AUDIO_EXTENSION
    )
}

/// Upper bound, in bytes, of each sanitized name part.
///
/// Two parts plus `" - "` and the extension stay under the usual 255 byte file name limit.
pub const MAX_COMPONENT_BYTES: usize = 120;

/// Make `value` safe to use as part of a single path component.
///
/// Separators, characters reserved on common filesystems and control characters become `_`.
/// The result is cut to [`MAX_COMPONENT_BYTES`] on a char boundary.
/// Falls back to `fallback` if nothing usable is left.
pub fn sanitize_component(value: &str, fallback: &str) -> String {
    let replaced = value
        .chars()
        .map(|c| match c {
            '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>();
    let truncated = truncate_bytes(replaced.trim(), MAX_COMPONENT_BYTES);
    // no hidden files, no trailing dots
    let trimmed = truncated.trim().trim_matches('.').trim();
    if trimmed.is_empty() {
        return fallback.to_string();
    }
    trimmed.to_string()
}

fn truncate_bytes(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
