use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{Config, LayoutConfig};
use crate::exif::MetadataEngine;
use crate::mapping::{self, FieldSet, MappingOptions};
use crate::sidecar::{self, JsonQuery};

/// One image file discovered in a photo folder.
///
/// # Example
///
/// ```rust
/// use takeout_exif::pipeline::ImageEntry;
/// use std::path::Path;
///
/// let entry = ImageEntry::from_path(Path::new("Photos from 2023/IMG_1.JPG")).unwrap();
/// assert_eq!(entry.file_name, "IMG_1.JPG");
/// assert_eq!(entry.base_name, "IMG_1");
/// assert_eq!(entry.extension, "JPG");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ImageEntry {
    pub path: PathBuf,
    /// `name.ext`
    pub file_name: String,
    /// File name without its last extension.
    pub base_name: String,
    pub extension: String,
}

impl ImageEntry {
    /// Build an entry from a file path. Returns `None` for names that are not
    /// valid UTF-8 or have no extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        Some(Self {
            path: path.to_path_buf(),
            file_name: path.file_name()?.to_str()?.to_string(),
            base_name: path.file_stem()?.to_str()?.to_string(),
            extension: path.extension()?.to_str()?.to_string(),
        })
    }
}

/// The outcome of processing a single image.
#[derive(Debug, Clone)]
pub struct ImageResult {
    pub source: PathBuf,
    /// Where the copy was (or, in a dry run, would be) written.
    pub output: PathBuf,
    pub sidecar_path: Option<PathBuf>,
    /// Fields mapped from the sidecar; empty when there is none.
    pub fields: FieldSet,
    pub metadata_attached: bool,
    /// Copy failure. The image is counted as failed.
    pub error: Option<String>,
    /// Sidecar or metadata write failure. The copy exists without metadata.
    pub warning: Option<String>,
}

/// Summary counters for one photo folder.
#[derive(Debug, Clone)]
pub struct FolderResult {
    pub folder: PathBuf,
    pub output_dir: PathBuf,
    pub processed: usize,
    pub metadata_attached: usize,
    pub failed: usize,
    pub images: Vec<ImageResult>,
}

impl FolderResult {
    fn new(folder: &Path, output_dir: PathBuf) -> Self {
        Self {
            folder: folder.to_path_buf(),
            output_dir,
            processed: 0,
            metadata_attached: 0,
            failed: 0,
            images: Vec::new(),
        }
    }

    fn record(&mut self, image: ImageResult) {
        self.processed += 1;
        if image.metadata_attached {
            self.metadata_attached += 1;
        }
        if image.error.is_some() {
            self.failed += 1;
        }
        self.images.push(image);
    }
}

/// The sibling output folder of `folder`: `<folder-name><suffix>`.
pub fn output_dir_for(folder: &Path, suffix: &str) -> PathBuf {
    let mut name = folder
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    folder.with_file_name(name)
}

/// List the images directly inside `folder` (non-recursive), sorted by name.
pub fn list_folder_images(folder: &Path, layout: &LayoutConfig) -> Result<Vec<ImageEntry>> {
    let mut images = Vec::new();

    for entry in std::fs::read_dir(folder)
        .with_context(|| format!("Failed to list {}", folder.display()))?
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry in {}: {e}", folder.display());
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() || !layout.is_image_name(&path) {
            continue;
        }
        match ImageEntry::from_path(&path) {
            Some(image) => images.push(image),
            None => log::warn!("Skipping image with non-UTF-8 name: {}", path.display()),
        }
    }

    images.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(images)
}

/// Collect supported image files under `root`, recursively.
///
/// Used to inspect output folders after a run.
pub fn collect_images(root: &Path, layout: &LayoutConfig) -> Vec<PathBuf> {
    if root.is_file() {
        return if layout.is_image_name(root) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        };
    }

    let mut images: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && layout.is_image_name(p))
        .collect();
    images.sort();
    images
}

/// Process one image: copy it into `output_dir` and embed its sidecar metadata
/// into the copy.
///
/// The original image and its sidecar are only read. A missing sidecar, an
/// unparsable sidecar, or a failed metadata write leaves a plain copy.
pub async fn process_image(
    folder: &Path,
    image: &ImageEntry,
    output_dir: &Path,
    engine: &dyn MetadataEngine,
    query: &dyn JsonQuery,
    config: &Config,
) -> ImageResult {
    let mut result = ImageResult {
        source: image.path.clone(),
        output: output_dir.join(&image.file_name),
        sidecar_path: sidecar::find_sidecar(folder, image),
        fields: FieldSet::new(),
        metadata_attached: false,
        error: None,
        warning: None,
    };

    if let Some(ref sidecar_path) = result.sidecar_path {
        log::debug!("  Sidecar: {}", sidecar_path.display());
        match sidecar::load_sidecar(sidecar_path) {
            Ok(doc) => {
                let options = MappingOptions {
                    user_comment: config.metadata.user_comment,
                };
                result.fields = mapping::map_sidecar(&doc, query, options);
            }
            Err(e) => result.warning = Some(format!("{e:#}")),
        }
    }

    if config.output.dry_run {
        result.metadata_attached = !result.fields.is_empty();
        return result;
    }

    if let Err(e) = tokio::fs::copy(&image.path, &result.output).await {
        result.error = Some(format!(
            "Failed to copy {} to {}: {e}",
            image.path.display(),
            result.output.display()
        ));
        return result;
    }

    if result.fields.is_empty() {
        return result;
    }

    match engine.write_fields(&result.output, &result.fields).await {
        Ok(()) => result.metadata_attached = true,
        Err(e) => result.warning = Some(format!("Failed to write metadata: {e:#}")),
    }

    result
}

/// Process every image directly inside one photo folder.
///
/// Creates the sibling output folder (an existing one is reused and its files
/// overwritten), copies each image, and embeds metadata into the copies.
/// Per-image failures are logged and counted; only a folder that cannot be
/// listed or whose output folder cannot be created is an error.
pub async fn process_folder(
    folder: &Path,
    engine: &dyn MetadataEngine,
    query: &dyn JsonQuery,
    config: &Config,
) -> Result<FolderResult> {
    let output_dir = output_dir_for(folder, &config.layout.output_suffix);
    let images = list_folder_images(folder, &config.layout)?;

    log::info!(
        "Processing {} ({} image(s)) → {}",
        folder.display(),
        images.len(),
        output_dir.display()
    );

    if !config.output.dry_run {
        tokio::fs::create_dir_all(&output_dir)
            .await
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    }

    let mut result = FolderResult::new(folder, output_dir);
    let total = images.len();

    for (i, image) in images.iter().enumerate() {
        log::debug!("[{}/{}] {}", i + 1, total, image.file_name);

        let image_result =
            process_image(folder, image, &result.output_dir, engine, query, config).await;

        if let Some(ref err) = image_result.error {
            log::error!("  {}: {err}", image.file_name);
        } else {
            if let Some(ref warning) = image_result.warning {
                log::warn!("  {}: {warning}", image.file_name);
            }
            if image_result.metadata_attached {
                let fields: Vec<String> =
                    image_result.fields.fields().iter().map(|f| f.to_string()).collect();
                let action = if config.output.dry_run { "Would write" } else { "Wrote" };
                log::debug!("  {}: {action} {}", image.file_name, fields.join(", "));
            } else if image_result.sidecar_path.is_none() {
                log::debug!("  {}: no sidecar, copied as is", image.file_name);
            }
        }

        result.record(image_result);
    }

    log::info!(
        "✓ {}: {} processed, {} with metadata, {} failed",
        folder.display(),
        result.processed,
        result.metadata_attached,
        result.failed
    );

    Ok(result)
}
