//! Metadata engines and EXIF reading.
//!
//! A [`MetadataEngine`] embeds a [`FieldSet`] into an image file in one batched
//! write. Two engines ship with the crate:
//!
//! - [`ExifToolEngine`] — drives the external `exiftool` binary (default)
//! - [`NativeEngine`] — writes EXIF in-process for JPEG, PNG, TIFF and WebP
//!
//! [`read_exif`] reads the written fields back for inspection.

mod exiftool;
mod native;
mod reader;

pub use exiftool::{ExifToolEngine, exiftool_args};
pub use native::NativeEngine;
pub use reader::{ExifData, read_exif};

use anyhow::Result;
use std::path::Path;

use crate::config::{EngineKind, MetadataConfig};
use crate::mapping::FieldSet;

/// Capability to write metadata fields into an image file.
///
/// Implement this trait to plug in another backend, or a recording fake in tests.
#[async_trait::async_trait]
pub trait MetadataEngine: Send + Sync {
    /// The display name of this engine (e.g., "exiftool").
    fn name(&self) -> &str;
    /// Verify the engine is usable before any processing starts.
    ///
    /// Returns a short description such as the tool version.
    async fn probe(&self) -> Result<String>;
    /// Write all `fields` into the file at `path`, rewriting it in place.
    async fn write_fields(&self, path: &Path, fields: &FieldSet) -> Result<()>;
}

/// Build the engine selected in the configuration.
pub fn build_engine(config: &MetadataConfig) -> Box<dyn MetadataEngine> {
    match config.engine {
        EngineKind::ExifTool => Box::new(
            ExifToolEngine::new(&config.exiftool_path).with_timeout(config.tool_timeout()),
        ),
        EngineKind::Native => Box::new(NativeEngine::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_engine_follows_config() {
        let mut config = MetadataConfig::default();
        assert_eq!(build_engine(&config).name(), "exiftool");

        config.engine = EngineKind::Native;
        assert_eq!(build_engine(&config).name(), "native");
    }
}
