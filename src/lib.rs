//! # takeout-exif
//!
//! Embed Google Takeout sidecar metadata into exported photos.
//!
//! A Takeout export keeps each photo's title, description, dates, location and
//! view count in a JSON file next to the image instead of inside it. This crate
//! walks an export, pairs every image with its sidecar, and writes a copy of the
//! image with those fields embedded into a sibling `<folder> output` directory.
//! Originals are never modified.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use takeout_exif::config::Config;
//! use takeout_exif::exif::build_engine;
//! use takeout_exif::sidecar::DottedPathQuery;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!
//!     // exiftool by default; fails early if it is not installed
//!     let engine = build_engine(&config.metadata);
//!     println!("Using {}", engine.probe().await?);
//!
//!     let summary =
//!         takeout_exif::walk::run(Path::new("/exports"), engine.as_ref(), &DottedPathQuery, &config)
//!             .await?;
//!
//!     for folder in &summary.folders {
//!         println!(
//!             "{}: {} processed, {} with metadata",
//!             folder.folder.display(),
//!             folder.processed,
//!             folder.metadata_attached
//!         );
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! ```rust,no_run
//! use takeout_exif::mapping::{map_sidecar, MappingOptions};
//! use takeout_exif::pipeline::ImageEntry;
//! use takeout_exif::sidecar::{find_sidecar, load_sidecar, DottedPathQuery};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let folder = Path::new("Takeout/Google Photos/Photos from 2023");
//! let image = ImageEntry::from_path(&folder.join("IMG_1.JPG")).unwrap();
//!
//! if let Some(sidecar) = find_sidecar(folder, &image) {
//!     let doc = load_sidecar(&sidecar)?;
//!     let fields = map_sidecar(&doc, &DottedPathQuery, MappingOptions::default());
//!     for (field, value) in fields.iter() {
//!         println!("{field} = {value}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Sidecar Names
//!
//! Probed in this order for `IMG_1.JPG`; the first existing file wins:
//!
//! 1. `IMG_1.suppl.json`
//! 2. `IMG_1.supplemental-metadata.json`
//! 3. `IMG_1.JPG.suppl.json`
//! 4. `IMG_1.JPG.supplemental-metadata.json`
//!
//! ## Modules
//!
//! - [`config`] — Configuration types and loading/saving
//! - [`exif`] — Metadata engines (exiftool, native) and EXIF reading
//! - [`mapping`] — Sidecar JSON → metadata field mapping
//! - [`pipeline`] — Per-folder processing: copy, match, map, write
//! - [`sidecar`] — Sidecar discovery, loading and JSON path queries
//! - [`walk`] — Archive and photo folder discovery, whole-run driver

pub mod config;
pub mod exif;
pub mod mapping;
pub mod pipeline;
pub mod sidecar;
pub mod walk;
