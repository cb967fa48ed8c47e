use anyhow::{Context, Result};
use nom_exif::*;
use std::path::Path;

// XP* tag IDs (IFD0)
const TAG_XP_TITLE: u16 = 0x9C9B;
const TAG_XP_COMMENT: u16 = 0x9C9C;

/// The Takeout-derived fields embedded in an image, as read back from its EXIF.
#[derive(Debug, Clone, Default)]
pub struct ExifData {
    pub title: Option<String>,
    pub description: Option<String>,
    pub create_date: Option<String>,
    pub date_time_original: Option<String>,
    pub user_comment: Option<String>,
    pub has_gps: bool,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
}

impl ExifData {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.create_date.is_none()
            && self.date_time_original.is_none()
            && self.user_comment.is_none()
            && !self.has_gps
    }
}

/// Read the embedded metadata of an image file.
///
/// Files without an EXIF block yield an empty [`ExifData`].
pub fn read_exif(path: &Path) -> Result<ExifData> {
    let mut parser = MediaParser::new();
    let ms = MediaSource::file_path(path).context("Failed to open image file")?;

    let iter: ExifIter = match parser.parse(ms) {
        Ok(iter) => iter,
        Err(_) => {
            log::debug!("No EXIF data found in {}", path.display());
            return Ok(ExifData::default());
        }
    };

    // Parse GPS info before converting to Exif (consumes the iterator)
    let gps_info = iter.parse_gps_info().ok().flatten();
    let exif: Exif = iter.into();

    let user_comment = exif
        .get(ExifTag::UserComment)
        .and_then(user_comment_to_string)
        // XPComment fallback
        .or_else(|| exif.get_by_ifd_tag_code(0, TAG_XP_COMMENT).and_then(xp_to_string));

    let mut data = ExifData {
        title: exif.get_by_ifd_tag_code(0, TAG_XP_TITLE).and_then(xp_to_string),
        description: exif.get(ExifTag::ImageDescription).and_then(entry_to_string),
        create_date: exif.get(ExifTag::CreateDate).and_then(entry_to_string),
        date_time_original: exif.get(ExifTag::DateTimeOriginal).and_then(entry_to_string),
        user_comment,
        ..Default::default()
    };

    if let Some(gps) = gps_info {
        data.has_gps = true;
        data.gps_latitude = Some(latlng_to_decimal(&gps.latitude, gps.latitude_ref));
        data.gps_longitude = Some(latlng_to_decimal(&gps.longitude, gps.longitude_ref));
    }

    Ok(data)
}

/// Convert an EntryValue to an Option<String>.
///
/// Dates come back in EXIF form (`YYYY:MM:DD HH:MM:SS`).
fn entry_to_string(val: &EntryValue) -> Option<String> {
    let s = match val.as_time_components() {
        Some((datetime, _)) => datetime.format("%Y:%m:%d %H:%M:%S").to_string(),
        None => val.to_string(),
    };
    let s = s.trim().trim_matches('"').to_string();
    if s.is_empty() { None } else { Some(s) }
}

/// Decode an XP* tag (UTF-16LE bytes, NUL terminated).
fn xp_to_string(val: &EntryValue) -> Option<String> {
    let bytes = match val {
        EntryValue::U8Array(bytes) | EntryValue::Undefined(bytes) => bytes,
        other => return entry_to_string(other),
    };
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();
    let s = String::from_utf16_lossy(&units).trim().to_string();
    if s.is_empty() { None } else { Some(s) }
}

/// Decode a UserComment, dropping its 8-byte character code header.
fn user_comment_to_string(val: &EntryValue) -> Option<String> {
    let bytes = match val {
        EntryValue::Undefined(bytes) | EntryValue::U8Array(bytes) => bytes,
        other => return entry_to_string(other),
    };
    let (header, body) = bytes.split_at(bytes.len().min(8));
    let s = if header.starts_with(b"UNICODE") {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(body).into_owned()
    };
    let s = s.trim_matches(|c: char| c == '\0' || c.is_whitespace()).to_string();
    if s.is_empty() { None } else { Some(s) }
}

/// Convert a nom-exif LatLng (3 URationals: deg, min, sec) to decimal degrees.
fn latlng_to_decimal(latlng: &LatLng, reference: char) -> f64 {
    let degrees = latlng.0.0 as f64 / latlng.0.1 as f64;
    let minutes = latlng.1.0 as f64 / latlng.1.1 as f64;
    let seconds = latlng.2.0 as f64 / latlng.2.1 as f64;

    let mut coord = degrees + minutes / 60.0 + seconds / 3600.0;

    if reference == 'S' || reference == 'W' {
        coord = -coord;
    }

    coord
}
