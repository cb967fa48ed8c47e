//! Takeout directory discovery.
//!
//! ```text
//! <root>/
//!   Takeout/                       ← archive folder (immediate child, "Takeout*")
//!     Google Photos/
//!       Photos from 2023/          ← photo folder (any depth, "Photos from *")
//!       Photos from 2023 output/   ← written by the run, never walked
//!   Takeout 2/
//!     ...
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{Config, LayoutConfig};
use crate::exif::MetadataEngine;
use crate::pipeline::{self, FolderResult};
use crate::sidecar::JsonQuery;

/// Totals for a whole run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub archives: usize,
    pub folders: Vec<FolderResult>,
    /// Photo folders that could not be listed or whose output folder could not be created.
    pub failed_folders: Vec<(PathBuf, String)>,
}

impl RunSummary {
    pub fn processed(&self) -> usize {
        self.folders.iter().map(|f| f.processed).sum()
    }

    pub fn metadata_attached(&self) -> usize {
        self.folders.iter().map(|f| f.metadata_attached).sum()
    }

    pub fn failed(&self) -> usize {
        self.folders.iter().map(|f| f.failed).sum()
    }
}

fn dir_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// Immediate child directories of `root` whose name starts with the archive prefix.
///
/// Fails if `root` is not an existing directory.
pub fn find_archive_folders(root: &Path, layout: &LayoutConfig) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        anyhow::bail!("Directory does not exist: {}", root.display());
    }

    let mut archives = Vec::new();
    for entry in std::fs::read_dir(root)
        .with_context(|| format!("Failed to list {}", root.display()))?
    {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                log::warn!("Skipping unreadable entry in {}: {e}", root.display());
                continue;
            }
        };
        let is_archive = dir_name(&path)
            .is_some_and(|name| name.starts_with(&layout.archive_prefix));
        if is_archive && path.is_dir() {
            archives.push(path);
        }
    }

    archives.sort();
    Ok(archives)
}

/// Photo folders at any depth below `archive`.
///
/// Folders ending in the output suffix are skipped along with everything below
/// them, so a second run never picks up its own output.
pub fn find_photo_folders(archive: &Path, layout: &LayoutConfig) -> Vec<PathBuf> {
    let is_output =
        |name: &str| !layout.output_suffix.is_empty() && name.ends_with(&layout.output_suffix);

    let mut folders: Vec<PathBuf> = WalkDir::new(archive)
        .min_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !dir_name(e.path()).is_some_and(is_output))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter(|e| {
            dir_name(e.path()).is_some_and(|name| name.starts_with(&layout.photo_folder_prefix))
        })
        .map(|e| e.into_path())
        .collect();

    folders.sort();
    folders
}

/// Walk `root` and process every photo folder of every archive folder.
///
/// Missing archives or photo folders are warnings, not errors. The only error
/// is a `root` that is not an existing directory.
///
/// # Example
///
/// ```rust,no_run
/// use takeout_exif::config::Config;
/// use takeout_exif::exif::build_engine;
/// use takeout_exif::sidecar::DottedPathQuery;
/// use takeout_exif::walk::run;
/// use std::path::Path;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::default();
/// let engine = build_engine(&config.metadata);
/// let summary = run(Path::new("."), engine.as_ref(), &DottedPathQuery, &config).await?;
/// println!("{} processed, {} with metadata", summary.processed(), summary.metadata_attached());
/// # Ok(())
/// # }
/// ```
pub async fn run(
    root: &Path,
    engine: &dyn MetadataEngine,
    query: &dyn JsonQuery,
    config: &Config,
) -> Result<RunSummary> {
    let layout = &config.layout;
    let archives = find_archive_folders(root, layout)?;

    let mut summary = RunSummary {
        archives: archives.len(),
        ..Default::default()
    };

    if archives.is_empty() {
        log::warn!(
            "No '{}*' folders found in {}",
            layout.archive_prefix,
            root.display()
        );
        return Ok(summary);
    }

    for archive in &archives {
        log::info!("Scanning {}", archive.display());

        let photo_folders = find_photo_folders(archive, layout);
        if photo_folders.is_empty() {
            log::warn!(
                "No '{}*' folders found in {}",
                layout.photo_folder_prefix,
                archive.display()
            );
            continue;
        }

        for folder in &photo_folders {
            match pipeline::process_folder(folder, engine, query, config).await {
                Ok(result) => summary.folders.push(result),
                Err(e) => {
                    log::error!("Skipping {}: {e:#}", folder.display());
                    summary.failed_folders.push((folder.clone(), format!("{e:#}")));
                }
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::FieldSet;
    use crate::sidecar::DottedPathQuery;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingEngine {
        writes: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl MetadataEngine for CountingEngine {
        fn name(&self) -> &str {
            "counting"
        }

        async fn probe(&self) -> Result<String> {
            Ok("counting".into())
        }

        async fn write_fields(&self, _path: &Path, _fields: &FieldSet) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn mkdirs(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(&path).unwrap();
        path
    }

    #[test]
    fn archives_are_prefixed_children() {
        let dir = TempDir::new().unwrap();
        mkdirs(dir.path(), "Takeout");
        mkdirs(dir.path(), "Takeout-2");
        mkdirs(dir.path(), "takeout-lower");
        mkdirs(dir.path(), "Other/Takeout");
        fs::write(dir.path().join("Takeout.zip"), b"zip").unwrap();

        let archives = find_archive_folders(dir.path(), &LayoutConfig::default()).unwrap();
        assert_eq!(
            archives,
            vec![dir.path().join("Takeout"), dir.path().join("Takeout-2")]
        );
    }

    #[test]
    fn missing_root_is_error() {
        let layout = LayoutConfig::default();
        assert!(find_archive_folders(Path::new("/nonexistent/root"), &layout).is_err());

        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, b"x").unwrap();
        assert!(find_archive_folders(&file, &layout).is_err());
    }

    #[test]
    fn photo_folders_at_any_depth() {
        let dir = TempDir::new().unwrap();
        let archive = mkdirs(dir.path(), "Takeout");
        mkdirs(&archive, "Google Photos/Photos from 2022");
        mkdirs(&archive, "Google Photos/Nested/Photos from 2023");
        mkdirs(&archive, "Google Photos/Trip to Rome");
        mkdirs(&archive, "Photos from"); // no trailing space
        fs::write(archive.join("Photos from 2021"), b"a file").unwrap();

        let folders = find_photo_folders(&archive, &LayoutConfig::default());
        assert_eq!(
            folders,
            vec![
                archive.join("Google Photos/Nested/Photos from 2023"),
                archive.join("Google Photos/Photos from 2022"),
            ]
        );
    }

    #[test]
    fn output_folders_are_not_walked() {
        let dir = TempDir::new().unwrap();
        let archive = mkdirs(dir.path(), "Takeout");
        mkdirs(&archive, "Google Photos/Photos from 2023");
        mkdirs(&archive, "Google Photos/Photos from 2023 output/Photos from inner");

        let folders = find_photo_folders(&archive, &LayoutConfig::default());
        assert_eq!(folders, vec![archive.join("Google Photos/Photos from 2023")]);
    }

    #[tokio::test]
    async fn no_archives_is_a_warning() {
        let dir = TempDir::new().unwrap();
        mkdirs(dir.path(), "Pictures");

        let engine = CountingEngine::default();
        let summary = run(dir.path(), &engine, &DottedPathQuery, &Config::default())
            .await
            .unwrap();
        assert_eq!(summary.archives, 0);
        assert_eq!(summary.processed(), 0);
    }

    #[tokio::test]
    async fn archive_without_photo_folders_is_a_warning() {
        let dir = TempDir::new().unwrap();
        let archive = mkdirs(dir.path(), "Takeout");
        mkdirs(&archive, "Google Photos/Albums");
        fs::write(archive.join("Google Photos/Albums/a.jpg"), b"a").unwrap();

        let engine = CountingEngine::default();
        let summary = run(dir.path(), &engine, &DottedPathQuery, &Config::default())
            .await
            .unwrap();
        assert_eq!(summary.archives, 1);
        assert!(summary.folders.is_empty());
        assert_eq!(summary.processed(), 0);
        assert_eq!(engine.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_processes_all_archives_and_is_repeatable() {
        let dir = TempDir::new().unwrap();
        let p1 = mkdirs(dir.path(), "Takeout/Google Photos/Photos from 2022");
        let p2 = mkdirs(dir.path(), "Takeout 2/Google Photos/Photos from 2023");
        fs::write(p1.join("a.jpg"), b"a").unwrap();
        fs::write(p1.join("a.suppl.json"), r#"{"title":"A"}"#).unwrap();
        fs::write(p2.join("b.heic"), b"b").unwrap();
        fs::write(p2.join("c.JPEG"), b"c").unwrap();
        fs::write(p2.join("c.JPEG.supplemental-metadata.json"), r#"{"url":"u"}"#).unwrap();

        let engine = CountingEngine::default();
        let config = Config::default();
        let first = run(dir.path(), &engine, &DottedPathQuery, &config).await.unwrap();
        assert_eq!(first.archives, 2);
        assert_eq!(first.folders.len(), 2);
        assert_eq!(first.processed(), 3);
        assert_eq!(first.metadata_attached(), 2);
        assert_eq!(first.failed(), 0);
        assert!(dir.path().join("Takeout/Google Photos/Photos from 2022 output/a.jpg").exists());
        assert!(dir.path().join("Takeout 2/Google Photos/Photos from 2023 output/b.heic").exists());

        let second = run(dir.path(), &engine, &DottedPathQuery, &config).await.unwrap();
        assert_eq!(second.folders.len(), 2);
        assert_eq!(second.processed(), first.processed());
        assert_eq!(second.metadata_attached(), first.metadata_attached());
        assert!(!dir
            .path()
            .join("Takeout/Google Photos/Photos from 2022 output output")
            .exists());
    }
}
