//! Sidecar JSON → image metadata field mapping.
//!
//! | Sidecar path | Field(s) |
//! |--------------|----------|
//! | `title` | `Title` |
//! | `description` | `Description` |
//! | `creationTime.timestamp` | `CreateDate`, `DateTimeOriginal` |
//! | `photoTakenTime.timestamp` | `DateTimeOriginal` (replaces the creation time) |
//! | `geoData.latitude` + `geoData.longitude` | `GPSLatitude`, `GPSLongitude` |
//! | `geoData.altitude` | `GPSAltitude` |
//! | `imageViews`, `url`, `googlePhotosOrigin.mobileUpload.deviceType` | `UserComment` |
//!
//! A coordinate of exactly `0.0` is Takeout's "no location" marker, so a photo
//! taken at 0°N 0°E loses its position.

use chrono::{Local, TimeZone};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::config::CommentMode;
use crate::sidecar::JsonQuery;

/// A metadata field the mapper can populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetadataField {
    Title,
    Description,
    CreateDate,
    DateTimeOriginal,
    #[serde(rename = "GPSLatitude")]
    GpsLatitude,
    #[serde(rename = "GPSLongitude")]
    GpsLongitude,
    #[serde(rename = "GPSAltitude")]
    GpsAltitude,
    UserComment,
}

impl MetadataField {
    /// The tag name understood by exiftool.
    pub fn tag_name(&self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Description => "Description",
            Self::CreateDate => "CreateDate",
            Self::DateTimeOriginal => "DateTimeOriginal",
            Self::GpsLatitude => "GPSLatitude",
            Self::GpsLongitude => "GPSLongitude",
            Self::GpsAltitude => "GPSAltitude",
            Self::UserComment => "UserComment",
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag_name())
    }
}

/// Ordered field assignments for one image.
///
/// Setting a field twice keeps its original position and replaces the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    entries: Vec<(MetadataField, String)>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: MetadataField, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field, value)),
        }
    }

    /// Append to a field's current value with `separator`, or set it if absent.
    pub fn append(&mut self, field: MetadataField, value: &str, separator: &str) {
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => {
                entry.1.push_str(separator);
                entry.1.push_str(value);
            }
            None => self.entries.push((field, value.to_string())),
        }
    }

    pub fn get(&self, field: MetadataField) -> Option<&str> {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, field: MetadataField) -> bool {
        self.get(field).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetadataField, &str)> {
        self.entries.iter().map(|(f, v)| (*f, v.as_str()))
    }

    pub fn fields(&self) -> Vec<MetadataField> {
        self.entries.iter().map(|(f, _)| *f).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Options for [`map_sidecar`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MappingOptions {
    pub user_comment: CommentMode,
}

/// Map a parsed sidecar document into metadata field assignments.
///
/// Every source field is optional; anything missing or unparsable is skipped.
/// Timestamps are rendered in local time.
pub fn map_sidecar(doc: &Value, query: &dyn JsonQuery, options: MappingOptions) -> FieldSet {
    map_sidecar_in(doc, query, options, &Local)
}

/// [`map_sidecar`] with an explicit timezone for timestamp rendering.
pub fn map_sidecar_in<Tz>(
    doc: &Value,
    query: &dyn JsonQuery,
    options: MappingOptions,
    tz: &Tz,
) -> FieldSet
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let mut fields = FieldSet::new();
    let get = |path: &str| query.query(doc, path);

    if let Some(title) = get("title") {
        fields.set(MetadataField::Title, title);
    }

    if let Some(description) = get("description") {
        fields.set(MetadataField::Description, description);
    }

    if let Some(created) = get("creationTime.timestamp").and_then(|ts| format_timestamp(&ts, tz)) {
        fields.set(MetadataField::CreateDate, created.clone());
        fields.set(MetadataField::DateTimeOriginal, created);
    }

    if let Some(taken) = get("photoTakenTime.timestamp").and_then(|ts| format_timestamp(&ts, tz)) {
        fields.set(MetadataField::DateTimeOriginal, taken);
    }

    let latitude = get("geoData.latitude").filter(|v| !is_zero_sentinel(v));
    let longitude = get("geoData.longitude").filter(|v| !is_zero_sentinel(v));
    if let (Some(lat), Some(lon)) = (latitude, longitude) {
        fields.set(MetadataField::GpsLatitude, lat);
        fields.set(MetadataField::GpsLongitude, lon);

        if let Some(alt) = get("geoData.altitude").filter(|v| !is_zero_sentinel(v)) {
            fields.set(MetadataField::GpsAltitude, alt);
        }
    }

    let notes = [
        ("imageViews", "Google Photos Views"),
        ("url", "Google Photos URL"),
        ("googlePhotosOrigin.mobileUpload.deviceType", "Device Type"),
    ];
    for (path, label) in notes {
        let Some(value) = get(path) else { continue };
        let note = format!("{label}: {value}");
        match options.user_comment {
            CommentMode::LastWins => fields.set(MetadataField::UserComment, note),
            CommentMode::Join => fields.append(MetadataField::UserComment, &note, "; "),
        }
    }

    fields
}

/// Render Unix epoch seconds as an EXIF datetime (`YYYY:MM:DD HH:MM:SS`) in `tz`.
///
/// Accepts integer or fractional seconds, as string or number text. Returns
/// `None` for anything that is not a representable instant.
pub fn format_timestamp<Tz>(raw: &str, tz: &Tz) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let raw = raw.trim();
    let secs = match raw.parse::<i64>() {
        Ok(secs) => secs,
        Err(_) => {
            let secs = raw.parse::<f64>().ok().filter(|s| s.is_finite())?;
            secs.trunc() as i64
        }
    };
    let datetime = tz.timestamp_opt(secs, 0).single()?;
    Some(datetime.format("%Y:%m:%d %H:%M:%S").to_string())
}

fn is_zero_sentinel(value: &str) -> bool {
    value.trim().parse::<f64>().map(|v| v == 0.0).unwrap_or(false)
}
