//! Embedded metadata extraction.

use super::error::TagError;
use lofty::picture::PictureType;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag};
use std::io::{Read, Seek};

/// Everything read from one file's tags. Missing fields are empty or zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub year: u32,
    pub track_number: u32,
    pub duration_seconds: u32,
    pub picture: Option<Vec<u8>>,
}

/// Reads the tags of one audio stream.
///
/// The container is detected from the content, not from a file name. A
/// stream whose container cannot be parsed is [`TagError::Unreadable`]; a
/// parseable stream without any tag yields default values.
pub fn extract<R: Read + Seek>(reader: R) -> Result<TrackTags, TagError> {
    let tagged_file = Probe::new(reader).guess_file_type()?.read()?;

    let duration_seconds =
        u32::try_from(tagged_file.properties().duration().as_secs()).unwrap_or(u32::MAX);

    let tag = match tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
    {
        Some(tag) => tag,
        None => {
            return Ok(TrackTags {
                duration_seconds,
                ..Default::default()
            })
        }
    };

    Ok(TrackTags {
        title: tag.title().map(|s| s.into_owned()).unwrap_or_default(),
        artist: tag.artist().map(|s| s.into_owned()).unwrap_or_default(),
        album: tag.album().map(|s| s.into_owned()).unwrap_or_default(),
        genre: tag.genre().map(|s| s.into_owned()).unwrap_or_default(),
        year: year_of(tag).unwrap_or_default(),
        track_number: tag.track().unwrap_or_default(),
        duration_seconds,
        picture: cover_of(tag),
    })
}

fn year_of(tag: &Tag) -> Option<u32> {
    tag.year()
        .filter(|year| *year > 0)
        .or_else(|| tag.get_string(&ItemKey::Year).and_then(parse_year))
        .or_else(|| tag.get_string(&ItemKey::RecordingDate).and_then(parse_year))
}

/// "1999", "1999-04-01" and "1999/04" all give 1999.
fn parse_year(value: &str) -> Option<u32> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .take(4)
        .collect();
    if digits.len() == 4 {
        digits.parse().ok()
    } else {
        None
    }
}

fn cover_of(tag: &Tag) -> Option<Vec<u8>> {
    let pictures = tag.pictures();
    pictures
        .iter()
        .find(|p| p.pic_type() == PictureType::CoverFront)
        .or_else(|| pictures.first())
        .map(|p| p.data().to_vec())
}
