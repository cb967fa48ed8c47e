use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use super::MetadataEngine;
use crate::mapping::{FieldSet, MetadataField};

/// [`MetadataEngine`] backed by the external `exiftool` program.
#[derive(Debug, Clone)]
pub struct ExifToolEngine {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl ExifToolEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Kill an invocation that runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, args: &[String], target: Option<&Path>) -> Result<Output> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args).kill_on_drop(true);
        if let Some(target) = target {
            cmd.arg(target);
        }
        log::debug!("  {} {}", self.program.display(), args.join(" "));

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| {
                    anyhow::anyhow!("{} timed out after {limit:?}", self.program.display())
                })?,
            None => cmd.output().await,
        };
        output.with_context(|| format!("Failed to run {}", self.program.display()))
    }
}

#[async_trait::async_trait]
impl MetadataEngine for ExifToolEngine {
    fn name(&self) -> &str {
        "exiftool"
    }

    async fn probe(&self) -> Result<String> {
        let output = self.run(&["-ver".to_string()], None).await.with_context(|| {
            format!(
                "{} not found on the search path; install exiftool or set metadata.exiftool_path",
                self.program.display()
            )
        })?;
        if !output.status.success() {
            anyhow::bail!("{} -ver exited with {}", self.program.display(), output.status);
        }
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(format!("exiftool {version}"))
    }

    async fn write_fields(&self, path: &Path, fields: &FieldSet) -> Result<()> {
        let mut args = vec!["-overwrite_original".to_string(), "-m".to_string()];
        args.extend(exiftool_args(fields));

        let output = self.run(&args, Some(path)).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("exiftool exited with {}: {}", output.status, stderr.trim());
        }
        Ok(())
    }
}

/// Build the `-Tag=value` assignments for `fields`.
///
/// exiftool stores `Title` and `Description` in XMP only, so they are also
/// written to their EXIF counterparts (XPTitle, ImageDescription). GPS
/// coordinates also set their `...Ref` tag from the signed value, which
/// exiftool turns into N/S, E/W or above/below sea level.
pub fn exiftool_args(fields: &FieldSet) -> Vec<String> {
    let mut args = Vec::with_capacity(fields.len() * 2);
    for (field, value) in fields.iter() {
        args.push(format!("-{}={value}", field.tag_name()));
        let companion = match field {
            MetadataField::Title => Some("XPTitle".to_string()),
            MetadataField::Description => Some("ImageDescription".to_string()),
            MetadataField::GpsLatitude | MetadataField::GpsLongitude | MetadataField::GpsAltitude => {
                Some(format!("{}Ref", field.tag_name()))
            }
            _ => None,
        };
        if let Some(tag) = companion {
            args.push(format!("-{tag}={value}"));
        }
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_in_field_order() {
        let mut fields = FieldSet::new();
        fields.set(MetadataField::Title, "Sunset");
        fields.set(MetadataField::DateTimeOriginal, "2023:07:22 04:26:40");
        fields.set(MetadataField::UserComment, "Device Type: IOS_PHONE");

        assert_eq!(
            exiftool_args(&fields),
            vec![
                "-Title=Sunset",
                "-XPTitle=Sunset",
                "-DateTimeOriginal=2023:07:22 04:26:40",
                "-UserComment=Device Type: IOS_PHONE",
            ]
        );
    }

    #[test]
    fn gps_args_carry_refs() {
        let mut fields = FieldSet::new();
        fields.set(MetadataField::GpsLatitude, "-33.8568");
        fields.set(MetadataField::GpsLongitude, "151.2153");
        fields.set(MetadataField::GpsAltitude, "-2");

        assert_eq!(
            exiftool_args(&fields),
            vec![
                "-GPSLatitude=-33.8568",
                "-GPSLatitudeRef=-33.8568",
                "-GPSLongitude=151.2153",
                "-GPSLongitudeRef=151.2153",
                "-GPSAltitude=-2",
                "-GPSAltitudeRef=-2",
            ]
        );
    }

    #[test]
    fn description_also_written_to_exif() {
        let mut fields = FieldSet::new();
        fields.set(MetadataField::Description, "At the lake");

        assert_eq!(
            exiftool_args(&fields),
            vec!["-Description=At the lake", "-ImageDescription=At the lake"]
        );
    }

    #[test]
    fn empty_fields_no_args() {
        assert!(exiftool_args(&FieldSet::new()).is_empty());
    }

    #[tokio::test]
    async fn probe_missing_binary_fails() {
        let engine = ExifToolEngine::new("/nonexistent/bin/exiftool-missing");
        let err = engine.probe().await.unwrap_err();
        assert!(format!("{err:#}").contains("not found on the search path"));
    }

    #[tokio::test]
    async fn write_with_missing_binary_fails() {
        let engine = ExifToolEngine::new("/nonexistent/bin/exiftool-missing")
            .with_timeout(Some(Duration::from_secs(5)));
        let mut fields = FieldSet::new();
        fields.set(MetadataField::Title, "x");
        assert!(engine.write_fields(Path::new("a.jpg"), &fields).await.is_err());
    }
}
