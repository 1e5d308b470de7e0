use std::path::Path;

use lofty::config::{ParseOptions, ParsingMode, WriteOptions};
use lofty::file::{FileType, TaggedFile, TaggedFileExt};
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{Tag, TagType};
use tracing::debug;

use super::{TagError, TagStore, TrackTags, clean_value};
use crate::cover::{ImageFormat, sniff_image_format};

/// [`TagStore`] backed by `lofty`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTagStore;

fn parse_options(read_cover_art: bool) -> ParseOptions {
    ParseOptions::new()
        .read_cover_art(read_cover_art)
        .parsing_mode(ParsingMode::BestAttempt)
}

fn open(path: &Path, read_cover_art: bool) -> Result<TaggedFile, TagError> {
    Probe::open(path)
        .map_err(|e| TagError::Io(format!("Failed to open: {e}")))?
        .options(parse_options(read_cover_art))
        .read()
        .map_err(|e| TagError::Io(format!("Failed to read: {e}")))
}

fn front_cover(tag: &Tag) -> Option<&Picture> {
    tag.pictures()
        .iter()
        .find(|p| p.pic_type() == PictureType::CoverFront)
        .or_else(|| tag.pictures().first())
}

impl TagStore for LoftyTagStore {
    fn read(&self, path: &Path) -> TrackTags {
        let tagged = match open(path, false) {
            Ok(t) => t,
            Err(e) => {
                debug!("tags unreadable, treating as empty: {}: {e}", path.display());
                return TrackTags::default();
            }
        };
        let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) else {
            return TrackTags::default();
        };

        TrackTags {
            artist: clean_value(tag.artist().as_deref()),
            album: clean_value(tag.album().as_deref()),
            track: tag.track().map(|n| n.to_string()),
            title: clean_value(tag.title().as_deref()),
        }
    }

    fn embedded_cover(&self, path: &Path) -> Option<Vec<u8>> {
        let tagged = open(path, true).ok()?;
        // Primary tag first, then any other tag layer carrying art.
        let primary = tagged.primary_tag().and_then(front_cover);
        let picture = primary.or_else(|| tagged.tags().iter().find_map(front_cover))?;
        let data = picture.data();
        (!data.is_empty()).then(|| data.to_vec())
    }

    fn write_cover(&self, path: &Path, image: &[u8]) -> Result<(), TagError> {
        let mime = match sniff_image_format(image) {
            Some(ImageFormat::Png) => MimeType::Png,
            _ => MimeType::Jpeg,
        };
        let picture = Picture::unchecked(image.to_vec())
            .pic_type(PictureType::CoverFront)
            .mime_type(mime)
            .build();

        let mut tagged_file = open(path, true)?;
        let file_type = tagged_file.file_type();
        let tag_type = if file_type == FileType::Wav {
            TagType::Id3v2
        } else {
            file_type.primary_tag_type()
        };

        let tag = match tagged_file.tag_mut(tag_type) {
            Some(t) => t,
            None => {
                tagged_file.insert_tag(Tag::new(tag_type));
                tagged_file.tag_mut(tag_type).ok_or_else(|| {
                    TagError::Unsupported(format!("File does not support {tag_type:?} tags"))
                })?
            }
        };

        tag.remove_picture_type(PictureType::CoverFront);
        tag.push_picture(picture);

        tag.save_to_path(path, WriteOptions::default())
            .map_err(|e| TagError::Io(format!("Failed to write tag: {e}")))
    }
}
