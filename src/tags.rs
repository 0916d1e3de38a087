//! Writing artist/title tags into audio files.

use std::path::Path;

use anyhow::{Context, Result};
use id3::frame::ExtendedText;
use id3::{Tag, TagLike, Version};

/// Frames carried over from the existing tag. Everything else is dropped.
const KEPT_FRAMES: &[&str] = &["APIC", "USLT"];

/// Description of the user text frame holding the artist list.
pub const ARTISTS_FRAME_DESCRIPTION: &str = "ARTISTS";

/// Sink for derived metadata. Implementations must be shareable across threads.
pub trait TagWriter: Send + Sync {
    fn write_tags(&self, path: &Path, artists: &str, title: &str) -> Result<()>;
}

/// Replaces the file's ID3v2 tag with artist and title only, keeping cover art
/// and lyrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct Id3TagWriter;

impl Id3TagWriter {
    fn read_existing(path: &Path) -> Result<Option<Tag>> {
        match Tag::read_from_path(path) {
            Ok(tag) => Ok(Some(tag)),
            Err(id3::Error {
                kind: id3::ErrorKind::NoTag,
                ..
            }) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading ID3 tag of {}", path.display())),
        }
    }
}

impl TagWriter for Id3TagWriter {
    fn write_tags(&self, path: &Path, artists: &str, title: &str) -> Result<()> {
        let mut tag = Tag::new();
        if let Some(existing) = Self::read_existing(path)? {
            for frame in existing.frames() {
                if KEPT_FRAMES.contains(&frame.id()) {
                    tag.add_frame(frame.clone());
                }
            }
        }

        tag.set_artist(artists);
        tag.set_title(title);
        tag.add_frame(ExtendedText {
            description: ARTISTS_FRAME_DESCRIPTION.to_string(),
            value: artists.to_string(),
        });

        tag.write_to_path(path, Version::Id3v24)
            .with_context(|| format!("writing ID3 tag to {}", path.display()))?;
        Ok(())
    }
}
