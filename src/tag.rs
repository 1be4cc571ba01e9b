use std::path::Path;

use id3::TagLike;

/// Tag version written to audio files.
pub const TAG_VERSION: id3::Version = id3::Version::Id3v24;

/// Read the existing tag of `path`, or an empty one if the file has none.
pub fn read_or_default(path: &Path) -> id3::Result<id3::Tag> {
    match id3::Tag::read_from_path(path) {
        Ok(tag) => Ok(tag),
        Err(err) if matches!(err.kind, id3::ErrorKind::NoTag) => Ok(id3::Tag::new()),
        Err(err) => Err(err),
    }
}

/// Set the title and artist frames of the file at `path`.
///
/// Prior title and artist frames are replaced. Other frames are kept.
pub fn write_title_artist(path: &Path, title: &str, artist: &str) -> id3::Result<()> {
    let mut tag = read_or_default(path)?;
    tag.set_title(title);
    tag.set_artist(artist);
    tracing::trace!("tag: {:?}", tag);
    tag.write_to_path(path, TAG_VERSION)
}
