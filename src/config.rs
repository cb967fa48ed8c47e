use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for takeout-exif.
///
/// Controls how archive and photo folders are recognized, which metadata
/// engine writes the fields, and output behavior (dry run).
///
/// # Loading
///
/// ```rust,no_run
/// use takeout_exif::config::{Config, EngineKind};
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.metadata.engine = EngineKind::Native;
/// config.output.dry_run = true;
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folder naming conventions of a Takeout export.
    pub layout: LayoutConfig,
    /// Metadata engine selection and field mapping options.
    pub metadata: MetadataConfig,
    /// Output behavior.
    pub output: OutputConfig,
}

/// How archive folders, photo folders and output folders are named.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Prefix of the top-level archive folders directly under the root.
    pub archive_prefix: String,
    /// Prefix of the photo folders found at any depth inside an archive.
    pub photo_folder_prefix: String,
    /// Appended to a photo folder's name to form its sibling output folder.
    pub output_suffix: String,
    /// Image extensions picked up inside a photo folder (matched case-insensitively).
    pub image_extensions: Vec<String>,
}

/// Which metadata engine to use for writing fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// External `exiftool` binary found on the search path.
    #[serde(rename = "exiftool")]
    ExifTool,
    /// In-process EXIF writer (JPEG, PNG, TIFF, WebP).
    Native,
}

/// What happens when several notes target the `UserComment` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentMode {
    /// Each note replaces the previous one; the last present note is written.
    #[default]
    LastWins,
    /// Notes are concatenated with `"; "`.
    Join,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub engine: EngineKind,
    /// Program name or path of the exiftool binary.
    pub exiftool_path: String,
    /// Kill an external tool invocation after this many seconds. `None` waits forever.
    pub tool_timeout_secs: Option<u64>,
    pub user_comment: CommentMode,
}

/// Output and behavior configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// If `true`, report what would be copied and written without touching the filesystem.
    pub dry_run: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            archive_prefix: "Takeout".to_string(),
            photo_folder_prefix: "Photos from ".to_string(),
            output_suffix: " output".to_string(),
            image_extensions: ["jpg", "jpeg", "png", "heic", "tiff", "bmp", "gif"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::ExifTool,
            exiftool_path: "exiftool".to_string(),
            tool_timeout_secs: None,
            user_comment: CommentMode::LastWins,
        }
    }
}

impl MetadataConfig {
    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }
}

impl LayoutConfig {
    /// Check if a file name carries one of the configured image extensions.
    pub fn is_image_name(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.image_extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

impl Config {
    /// Resolve the config file path — same directory as the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            // An explicitly requested file that is missing is worth a warning.
            if path.is_some() {
                log::warn!(
                    "Config file not found at {}. Using defaults.",
                    config_path.display()
                );
            } else {
                log::debug!("No config file at {}, using defaults", config_path.display());
            }
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_takeout_layout() {
        let config = Config::default();
        assert_eq!(config.layout.archive_prefix, "Takeout");
        assert_eq!(config.layout.photo_folder_prefix, "Photos from ");
        assert_eq!(config.layout.output_suffix, " output");
        assert_eq!(config.layout.image_extensions.len(), 7);
        assert_eq!(config.metadata.engine, EngineKind::ExifTool);
        assert_eq!(config.metadata.user_comment, CommentMode::LastWins);
        assert!(config.metadata.tool_timeout().is_none());
        assert!(!config.output.dry_run);
    }

    #[test]
    fn image_names_match_case_insensitively() {
        let layout = LayoutConfig::default();
        assert!(layout.is_image_name(Path::new("IMG_1.JPG")));
        assert!(layout.is_image_name(Path::new("scan.Tiff")));
        assert!(layout.is_image_name(Path::new("anim.gif")));
        assert!(layout.is_image_name(Path::new("photo.heic")));
        assert!(!layout.is_image_name(Path::new("IMG_1.JPG.supplemental-metadata.json")));
        assert!(!layout.is_image_name(Path::new("clip.mp4")));
        assert!(!layout.is_image_name(Path::new("noext")));
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let config: Config = serde_json::from_str(
            r#"{ "metadata": { "engine": "native", "user_comment": "join" } }"#,
        )
        .unwrap();
        assert_eq!(config.metadata.engine, EngineKind::Native);
        assert_eq!(config.metadata.user_comment, CommentMode::Join);
        assert_eq!(config.metadata.exiftool_path, "exiftool");
        assert_eq!(config.layout.archive_prefix, "Takeout");
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.metadata.tool_timeout_secs = Some(30);
        config.output.dry_run = true;
        config.save(Some(&path)).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.metadata.tool_timeout(), Some(Duration::from_secs(30)));
        assert!(loaded.output.dry_run);
        assert_eq!(loaded.metadata.engine, EngineKind::ExifTool);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.json"))).unwrap();
        assert_eq!(config.layout.output_suffix, " output");
    }

    #[test]
    fn engine_names_serialize() {
        assert_eq!(serde_json::to_string(&EngineKind::ExifTool).unwrap(), "\"exiftool\"");
        assert_eq!(serde_json::to_string(&EngineKind::Native).unwrap(), "\"native\"");
        assert_eq!(serde_json::to_string(&CommentMode::LastWins).unwrap(), "\"last_wins\"");
    }
}
