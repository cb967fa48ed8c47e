//! Sidecar JSON discovery and loading.
//!
//! Google Takeout stores the metadata of `IMG_1.JPG` next to it in a JSON file.
//! Depending on the export date the file is named after the base name or the
//! full file name, with a `.suppl.json` or `.supplemental-metadata.json` suffix.
//! [`find_sidecar`] probes those names in [`SidecarConvention::ALL`] order.

mod query;

pub use query::{DottedPathQuery, JsonQuery};

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::pipeline::ImageEntry;

/// One naming convention for the sidecar of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarConvention {
    /// `<base>.suppl.json`
    BaseSuppl,
    /// `<base>.supplemental-metadata.json`
    BaseSupplemental,
    /// `<name.ext>.suppl.json`
    FullSuppl,
    /// `<name.ext>.supplemental-metadata.json`
    FullSupplemental,
}

impl SidecarConvention {
    /// All conventions in probe priority order.
    pub const ALL: [SidecarConvention; 4] = [
        Self::BaseSuppl,
        Self::BaseSupplemental,
        Self::FullSuppl,
        Self::FullSupplemental,
    ];

    /// The sidecar file name this convention expects for `entry`.
    pub fn file_name(&self, entry: &ImageEntry) -> String {
        match self {
            Self::BaseSuppl => format!("{}.suppl.json", entry.base_name),
            Self::BaseSupplemental => format!("{}.supplemental-metadata.json", entry.base_name),
            Self::FullSuppl => format!("{}.suppl.json", entry.file_name),
            Self::FullSupplemental => format!("{}.supplemental-metadata.json", entry.file_name),
        }
    }

    /// Human-readable pattern, used in `--help`.
    pub fn pattern(&self) -> &'static str {
        match self {
            Self::BaseSuppl => "<name>.suppl.json",
            Self::BaseSupplemental => "<name>.supplemental-metadata.json",
            Self::FullSuppl => "<name>.<ext>.suppl.json",
            Self::FullSupplemental => "<name>.<ext>.supplemental-metadata.json",
        }
    }
}

/// Find the sidecar JSON of `entry` inside `folder`.
///
/// Returns the first candidate that exists as a regular file, or `None` when the
/// image has no sidecar. Names are compared exactly; case folding is left to the
/// filesystem.
pub fn find_sidecar(folder: &Path, entry: &ImageEntry) -> Option<PathBuf> {
    SidecarConvention::ALL
        .iter()
        .map(|convention| folder.join(convention.file_name(entry)))
        .find(|candidate| candidate.is_file())
}

/// Read and parse a sidecar file.
pub fn load_sidecar(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read sidecar {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse sidecar {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn entry(dir: &Path, name: &str) -> ImageEntry {
        ImageEntry::from_path(&dir.join(name)).unwrap()
    }

    #[test]
    fn convention_file_names() {
        let e = ImageEntry::from_path(Path::new("/p/IMG_1.JPG")).unwrap();
        let names: Vec<String> = SidecarConvention::ALL.iter().map(|c| c.file_name(&e)).collect();
        assert_eq!(
            names,
            vec![
                "IMG_1.suppl.json",
                "IMG_1.supplemental-metadata.json",
                "IMG_1.JPG.suppl.json",
                "IMG_1.JPG.supplemental-metadata.json",
            ]
        );
    }

    #[test]
    fn no_sidecar_is_none() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("IMG_1.JPG"), b"img").unwrap();
        assert_eq!(find_sidecar(dir.path(), &entry(dir.path(), "IMG_1.JPG")), None);
    }

    #[test]
    fn base_suppl_wins_over_base_supplemental() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("IMG_1.JPG"), b"img").unwrap();
        fs::write(dir.path().join("IMG_1.suppl.json"), b"{}").unwrap();
        fs::write(dir.path().join("IMG_1.supplemental-metadata.json"), b"{}").unwrap();

        let found = find_sidecar(dir.path(), &entry(dir.path(), "IMG_1.JPG")).unwrap();
        assert_eq!(found, dir.path().join("IMG_1.suppl.json"));
    }

    #[test]
    fn falls_through_to_full_name_conventions() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("IMG_1.JPG"), b"img").unwrap();
        fs::write(dir.path().join("IMG_1.JPG.supplemental-metadata.json"), b"{}").unwrap();

        let found = find_sidecar(dir.path(), &entry(dir.path(), "IMG_1.JPG")).unwrap();
        assert_eq!(found, dir.path().join("IMG_1.JPG.supplemental-metadata.json"));

        fs::write(dir.path().join("IMG_1.JPG.suppl.json"), b"{}").unwrap();
        let found = find_sidecar(dir.path(), &entry(dir.path(), "IMG_1.JPG")).unwrap();
        assert_eq!(found, dir.path().join("IMG_1.JPG.suppl.json"));
    }

    #[test]
    fn directory_with_sidecar_name_is_ignored() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("IMG_1.suppl.json")).unwrap();
        assert_eq!(find_sidecar(dir.path(), &entry(dir.path(), "IMG_1.JPG")), None);
    }

    #[test]
    fn load_rejects_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, b"{ not json").unwrap();
        assert!(load_sidecar(&path).is_err());

        fs::write(&path, br#"{"title":"Sunset"}"#).unwrap();
        assert_eq!(load_sidecar(&path).unwrap()["title"], "Sunset");
    }
}
