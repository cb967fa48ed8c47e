use anyhow::{Context, Result};
use img_parts::Bytes;
use img_parts::ImageEXIF;
use img_parts::jpeg::Jpeg;
use little_exif::endian::Endian;
use little_exif::exif_tag::{ExifTag, ExifTagGroup};
use little_exif::exif_tag_format::ExifTagFormat;
use little_exif::filetype::FileExtension;
use little_exif::metadata::Metadata;
use std::path::Path;

use super::MetadataEngine;
use crate::mapping::{FieldSet, MetadataField};

// EXIF tag IDs for tags not natively supported by little_exif
const TAG_XP_TITLE: u16 = 0x9C9B;
const TAG_XP_COMMENT: u16 = 0x9C9C;
const TAG_GPS_LATITUDE_REF: u16 = 0x0001;
const TAG_GPS_LATITUDE: u16 = 0x0002;
const TAG_GPS_LONGITUDE_REF: u16 = 0x0003;
const TAG_GPS_LONGITUDE: u16 = 0x0004;
const TAG_GPS_ALTITUDE_REF: u16 = 0x0005;
const TAG_GPS_ALTITUDE: u16 = 0x0006;

// little_exif as_u8_vec(JPEG) returns: [APP1 marker 2B][length 2B][Exif\0\0 6B][TIFF data]
// img-parts set_exif() expects just the TIFF data (after Exif\0\0)
const JPEG_EXIF_OVERHEAD: usize = 10; // 2 + 2 + 6

// img-parts set_exif() inserts the new segment at this index.
const JPEG_EXIF_INSERT_POS: usize = 3;

/// In-process [`MetadataEngine`] built on little_exif.
///
/// Writes EXIF into JPEG (keeping every other segment intact), PNG, TIFF and
/// WebP. HEIC, BMP and GIF are rejected; use [`ExifToolEngine`](super::ExifToolEngine)
/// for those.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEngine;

impl NativeEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl MetadataEngine for NativeEngine {
    fn name(&self) -> &str {
        "native"
    }

    async fn probe(&self) -> Result<String> {
        Ok("native EXIF writer (JPEG, PNG, TIFF, WebP)".to_string())
    }

    async fn write_fields(&self, path: &Path, fields: &FieldSet) -> Result<()> {
        let target = NativeTarget::from_path(path).with_context(|| {
            format!(
                "Native engine cannot write metadata into {}; use the exiftool engine",
                path.display()
            )
        })?;
        let tags = build_tags(fields)?;
        if tags.is_empty() {
            return Ok(());
        }

        let path = path.to_path_buf();
        // little_exif is synchronous; keep it off the async workers.
        tokio::task::spawn_blocking(move || match target {
            NativeTarget::Jpeg => write_tags_to_jpeg(&path, &tags),
            NativeTarget::Container => write_tags_with_little_exif(&path, &tags),
        })
        .await
        .context("Metadata write task failed")?
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum NativeTarget {
    /// Rewritten segment-by-segment with img-parts.
    Jpeg,
    /// PNG, TIFF and WebP, written by little_exif directly.
    Container,
}

impl NativeTarget {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" | "tif" | "tiff" | "webp" => Some(Self::Container),
            _ => None,
        }
    }
}

/// Translate a field set into little_exif tags.
///
/// `Title` goes to XPTitle, `Description` to ImageDescription and `UserComment`
/// to both UserComment and XPComment.
fn build_tags(fields: &FieldSet) -> Result<Vec<ExifTag>> {
    let mut tags = Vec::new();

    for (field, value) in fields.iter() {
        match field {
            MetadataField::Title => tags.extend(make_xp_tag(TAG_XP_TITLE, value)),
            MetadataField::Description => tags.push(ExifTag::ImageDescription(value.to_string())),
            MetadataField::CreateDate => tags.push(ExifTag::CreateDate(value.to_string())),
            MetadataField::DateTimeOriginal => {
                tags.push(ExifTag::DateTimeOriginal(value.to_string()))
            }
            MetadataField::UserComment => {
                let mut comment_bytes = b"ASCII\0\0\0".to_vec();
                comment_bytes.extend_from_slice(value.as_bytes());
                tags.push(ExifTag::UserComment(comment_bytes));
                tags.extend(make_xp_tag(TAG_XP_COMMENT, value));
            }
            // Written as a unit below.
            MetadataField::GpsLatitude
            | MetadataField::GpsLongitude
            | MetadataField::GpsAltitude => {}
        }
    }

    if let (Some(lat), Some(lon)) = (
        fields.get(MetadataField::GpsLatitude),
        fields.get(MetadataField::GpsLongitude),
    ) {
        let altitude = fields
            .get(MetadataField::GpsAltitude)
            .map(parse_coordinate)
            .transpose()?;
        collect_gps_tags(&mut tags, parse_coordinate(lat)?, parse_coordinate(lon)?, altitude);
    }

    Ok(tags)
}

fn parse_coordinate(value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .with_context(|| format!("Invalid GPS value: {value:?}"))
}

/// Encode a string as UTF-16LE bytes (used for XP* tags).
fn encode_utf16le(s: &str) -> Vec<u8> {
    let mut bytes: Vec<u8> = s
        .encode_utf16()
        .flat_map(|c| c.to_le_bytes())
        .collect();
    // Null terminator
    bytes.push(0);
    bytes.push(0);
    bytes
}

/// Create an XP* tag (UTF-16LE encoded, IFD0 group).
fn make_xp_tag(tag_id: u16, value: &str) -> Option<ExifTag> {
    let raw_data = encode_utf16le(value);
    ExifTag::from_u16_with_data(
        tag_id,
        &ExifTagFormat::INT8U,
        &raw_data,
        &Endian::Little,
        &ExifTagGroup::IFD0,
    )
    .ok()
}

/// Split a decimal coordinate into degrees, minutes and seconds × 10000.
fn to_dms(value: f64) -> (u32, u32, u32) {
    let abs = value.abs();
    let degrees = abs.floor() as u32;
    let minutes = ((abs - degrees as f64) * 60.0).floor() as u32;
    let seconds = ((abs - degrees as f64 - minutes as f64 / 60.0) * 3600.0 * 10000.0).round() as u32;
    (degrees, minutes, seconds)
}

/// Encode a GPS rational value as raw bytes (3 rationals = 24 bytes, little-endian).
fn encode_gps_rational(degrees: u32, minutes: u32, seconds_num: u32, seconds_den: u32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(24);
    bytes.extend_from_slice(&degrees.to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&minutes.to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&seconds_num.to_le_bytes());
    bytes.extend_from_slice(&seconds_den.to_le_bytes());
    bytes
}

fn gps_tag(tag_id: u16, format: ExifTagFormat, data: &Vec<u8>) -> Option<ExifTag> {
    ExifTag::from_u16_with_data(tag_id, &format, data, &Endian::Little, &ExifTagGroup::GPSIFD).ok()
}

/// Collect GPS tags (with N/S, E/W and sea-level refs) into the tag list.
fn collect_gps_tags(tags: &mut Vec<ExifTag>, lat: f64, lon: f64, altitude: Option<f64>) {
    let lat_ref = if lat >= 0.0 { "N" } else { "S" };
    let lon_ref = if lon >= 0.0 { "E" } else { "W" };
    let (lat_deg, lat_min, lat_sec) = to_dms(lat);
    let (lon_deg, lon_min, lon_sec) = to_dms(lon);

    tags.extend(gps_tag(
        TAG_GPS_LATITUDE_REF,
        ExifTagFormat::STRING,
        &format!("{lat_ref}\0").into_bytes(),
    ));
    tags.extend(gps_tag(
        TAG_GPS_LATITUDE,
        ExifTagFormat::RATIONAL64U,
        &encode_gps_rational(lat_deg, lat_min, lat_sec, 10000),
    ));
    tags.extend(gps_tag(
        TAG_GPS_LONGITUDE_REF,
        ExifTagFormat::STRING,
        &format!("{lon_ref}\0").into_bytes(),
    ));
    tags.extend(gps_tag(
        TAG_GPS_LONGITUDE,
        ExifTagFormat::RATIONAL64U,
        &encode_gps_rational(lon_deg, lon_min, lon_sec, 10000),
    ));

    if let Some(alt) = altitude {
        // 0 = above sea level, 1 = below
        let alt_ref: u8 = if alt >= 0.0 { 0 } else { 1 };
        let centimeters = (alt.abs() * 100.0).round() as u32;
        let mut alt_bytes = Vec::with_capacity(8);
        alt_bytes.extend_from_slice(&centimeters.to_le_bytes());
        alt_bytes.extend_from_slice(&100u32.to_le_bytes());

        tags.extend(gps_tag(TAG_GPS_ALTITUDE_REF, ExifTagFormat::INT8U, &vec![alt_ref]));
        tags.extend(gps_tag(TAG_GPS_ALTITUDE, ExifTagFormat::RATIONAL64U, &alt_bytes));
    }
}

/// Load existing EXIF metadata from a file path using little_exif.
/// Returns None if it can't parse.
fn load_existing_metadata(path: &Path) -> Option<Metadata> {
    let path_owned = path.to_path_buf();
    // Suppress panics from little_exif
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));
    let result = std::panic::catch_unwind(move || Metadata::new_from_path(&path_owned));
    std::panic::set_hook(prev_hook);

    match result {
        Ok(Ok(m)) if !m.data().is_empty() => {
            log::debug!("little_exif loaded {} existing EXIF tags", m.data().len());
            Some(m)
        }
        Ok(Ok(_)) => None,
        Ok(Err(e)) => {
            log::debug!("little_exif could not parse EXIF: {e}");
            None
        }
        Err(_) => {
            log::debug!("little_exif panicked parsing EXIF");
            None
        }
    }
}

/// Write tags into a JPEG, replacing only its APP1 EXIF segment.
fn write_tags_to_jpeg(path: &Path, tags: &[ExifTag]) -> Result<()> {
    let file_bytes = std::fs::read(path).context("Failed to read image file")?;

    let mut jpeg = Jpeg::from_bytes(Bytes::from(file_bytes))
        .map_err(|e| anyhow::anyhow!("Failed to parse JPEG: {e}"))?;

    if jpeg.segments().len() < JPEG_EXIF_INSERT_POS {
        anyhow::bail!("JPEG has too few segments to carry EXIF: {}", path.display());
    }

    let orig_exif_pos = find_exif_segment_pos(&jpeg);
    let has_original_exif = jpeg.exif().is_some_and(|exif| !exif.is_empty());

    let mut metadata = match load_existing_metadata(path) {
        Some(metadata) => metadata,
        // Rebuilding from scratch would drop the camera's EXIF.
        None if has_original_exif => anyhow::bail!(
            "Existing EXIF in {} could not be parsed; use the exiftool engine",
            path.display()
        ),
        None => Metadata::new(),
    };
    for tag in tags {
        metadata.set_tag(tag.clone());
    }

    let exif_bytes = metadata.as_u8_vec(FileExtension::JPEG);
    if exif_bytes.len() <= JPEG_EXIF_OVERHEAD {
        anyhow::bail!("little_exif produced an empty EXIF block");
    }
    jpeg.set_exif(Some(Bytes::from(exif_bytes[JPEG_EXIF_OVERHEAD..].to_vec())));

    // set_exif() inserts at position 3, which may be after XMP APP1.
    // Move the EXIF segment back to its original position so EXIF comes
    // before XMP (required for many EXIF parsers).
    if let Some(new_pos) = find_exif_segment_pos(&jpeg) {
        let target_pos = orig_exif_pos.unwrap_or(1); // default: right after APP0
        if target_pos < new_pos {
            let segments = jpeg.segments_mut();
            let seg = segments.remove(new_pos);
            segments.insert(target_pos, seg);
        }
    }

    let output = jpeg.encoder().bytes();
    std::fs::write(path, &output).context("Failed to write JPEG file")?;
    Ok(())
}

/// Find the position of the EXIF APP1 segment in a JPEG.
/// EXIF segments have marker 0xE1 (APP1) and contents starting with "Exif\0\0".
fn find_exif_segment_pos(jpeg: &Jpeg) -> Option<usize> {
    const EXIF_PREFIX: &[u8] = b"Exif\0\0";
    jpeg.segments()
        .iter()
        .position(|s| s.marker() == 0xE1 && s.contents().starts_with(EXIF_PREFIX))
}

/// Merge tags into the file's existing metadata and let little_exif write it back.
fn write_tags_with_little_exif(path: &Path, tags: &[ExifTag]) -> Result<()> {
    let mut metadata = load_existing_metadata(path).unwrap_or_else(Metadata::new);
    for tag in tags {
        metadata.set_tag(tag.clone());
    }
    metadata
        .write_to_file(path)
        .map_err(|e| anyhow::anyhow!("Failed to write EXIF to {}: {e}", path.display()))
}
