use audiobook_core::DownloadMetadata;
use std::io::Cursor;

use id3::{Tag, TagLike, Version};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TagError {
    #[error("no audio follows the existing ID3v2 tag")]
    NoAudio,
    #[error("existing ID3v2 header is invalid: {0}")]
    InvalidHeader(String),
    #[error("{0}")]
    Encode(String),
}

/// Re-wraps an audio payload with tag frames.
pub trait TagWriter: Send + Sync {
    fn write_tags(&self, audio: &[u8], metadata: &DownloadMetadata) -> Result<Vec<u8>, TagError>;
}

/// Writes an ID3v2.3 tag in front of the audio, replacing any leading ID3v2 tag.
///
/// Frames: TIT2 title, TPE1 artist, TCOM author, TRCK track number and,
/// when present, TALB album.
#[derive(Debug, Default, Clone, Copy)]
pub struct Id3TagWriter;

impl TagWriter for Id3TagWriter {
    fn write_tags(&self, audio: &[u8], metadata: &DownloadMetadata) -> Result<Vec<u8>, TagError> {
        let body = strip_id3v2(audio)?;

        let mut tag = Tag::new();
        tag.set_title(metadata.title.as_str());
        tag.set_artist(metadata.artist.as_str());
        tag.set_text("TCOM", metadata.author.as_str());
        tag.set_text("TRCK", metadata.track_number.to_string());
        if let Some(album) = metadata.album.as_deref() {
            tag.set_album(album);
        }

        let mut out = Vec::with_capacity(body.len() + 1024);
        tag.write_to(&mut out, Version::Id3v23)
            .map_err(|err| TagError::Encode(err.to_string()))?;
        out.extend_from_slice(body);
        Ok(out)
    }
}

/// Returns the audio after a leading ID3v2 tag and its padding, or
/// everything when there is none.
pub(crate) fn strip_id3v2(audio: &[u8]) -> Result<&[u8], TagError> {
    let mut reader = Cursor::new(audio);
    let found =
        Tag::skip(&mut reader).map_err(|err| TagError::InvalidHeader(err.to_string()))?;
    if !found {
        return Ok(audio);
    }
    // A tag declaring more bytes than the payload holds swallows all of it.
    let body = usize::try_from(reader.position())
        .ok()
        .and_then(|offset| audio.get(offset..))
        .unwrap_or_default();
    if body.is_empty() {
        return Err(TagError::NoAudio);
    }
    Ok(body)
}
