use serde::{Deserialize, Serialize};
use thiserror::Error;

type Result<T> = std::result::Result<T, IdParseError>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
#[error("Invalid playlist ID")]
pub struct IdParseError;

const PLAYLIST_URL: &str = "https://music.youtube.com/playlist?list=";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaylistId(String);

impl PlaylistId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || !id.chars().all(is_id_char) {
            return Err(IdParseError);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical YouTube Music URL for this playlist.
    pub fn to_url(&self) -> String {
        format!("{}{}", PLAYLIST_URL, self.0)
    }
}

impl std::fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PlaylistId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

pub fn parse(identifier: &str) -> Result<PlaylistId> {
    let identifier = identifier.trim();

    if let Ok(id) = parse_url(identifier) {
        return Ok(id);
    }

    // anything that looks like a link but has no list parameter is rejected
    if identifier.contains('/') || identifier.contains('?') {
        return Err(IdParseError);
    }

    PlaylistId::new(identifier)
}

pub fn parse_url(url: &str) -> Result<PlaylistId> {
    // https://music.youtube.com/playlist?list=PLrAXtmErZgOeiKm4sgNOknGvNjby9efdf
    // https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=OLAK5uy_kRwVmQ2fKXaGoqS&index=2
    let (_, query) = url.split_once('?').ok_or(IdParseError)?;
    query
        .split('&')
        .filter_map(|param| param.strip_prefix("list="))
        .find_map(|value| {
            let id_end = value.find(|c: char| !is_id_char(c)).unwrap_or(value.len());
            PlaylistId::new(&value[..id_end]).ok()
        })
        .ok_or(IdParseError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_music_url() {
        let url = "https://music.youtube.com/playlist?list=PLrAXtmErZgOeiKm4sgNOknGvNjby9efdf";
        let id = parse(url).unwrap();
        assert_eq!(id.as_str(), "PLrAXtmErZgOeiKm4sgNOknGvNjby9efdf");
    }

    #[test]
    fn test_parse_url_with_trailing_params() {
        let id = parse("https://www.youtube.com/watch?v=abc&list=OLAK5uy_k-Rw2&index=2").unwrap();
        assert_eq!(id.as_str(), "OLAK5uy_k-Rw2");
    }

    #[test]
    fn test_parse_url_list_parameter_only() {
        let id = parse("https://music.youtube.com/playlist?blacklist=&list=PLabc").unwrap();
        assert_eq!(id.as_str(), "PLabc");
        let id = parse("https://music.youtube.com/playlist?list=&list=PLdef#top").unwrap();
        assert_eq!(id.as_str(), "PLdef");
        assert_eq!(parse("https://music.youtube.com/playlist?blacklist=PLabc"), Err(IdParseError));
    }

    #[test]
    fn test_parse_bare_id() {
        let id = parse("  PLabc_DEF-123 ").unwrap();
        assert_eq!(id.to_url(), "https://music.youtube.com/playlist?list=PLabc_DEF-123");
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(parse("https://music.youtube.com/watch?v=abc"), Err(IdParseError));
        assert_eq!(parse("https://music.youtube.com/playlist?list="), Err(IdParseError));
        assert_eq!(parse("not an id"), Err(IdParseError));
        assert_eq!(parse(""), Err(IdParseError));
    }
}
