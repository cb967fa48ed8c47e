use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

use takeout_exif::config::{self, EngineKind};
use takeout_exif::sidecar::{DottedPathQuery, SidecarConvention};
use takeout_exif::{exif, pipeline, walk};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EngineArg {
    Exiftool,
    Native,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Exiftool => EngineKind::ExifTool,
            EngineArg::Native => EngineKind::Native,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "takeout-exif",
    version,
    about = "Embed Google Takeout sidecar JSON metadata into copies of exported photos",
    after_help = sidecar_help()
)]
struct Cli {
    /// Directory containing the Takeout* archive folders
    #[arg(value_name = "DIRECTORY", default_value = ".")]
    directory: PathBuf,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Report what would be copied and written without touching any file
    #[arg(long)]
    dry_run: bool,

    /// Metadata engine to use (overrides the config file)
    #[arg(long, value_enum)]
    engine: Option<EngineArg>,

    /// Path to the exiftool binary (overrides the config file)
    #[arg(long, value_name = "PATH")]
    exiftool: Option<PathBuf>,

    /// Output per-folder results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Display the embedded metadata of every image under DIRECTORY and exit
    #[arg(long = "show-exif")]
    show_exif: bool,
}

fn sidecar_help() -> String {
    let mut help = String::from(
        "Sidecar files are looked up next to each image, first match wins:\n",
    );
    for (i, convention) in SidecarConvention::ALL.iter().enumerate() {
        help.push_str(&format!("  {}. {}\n", i + 1, convention.pattern()));
    }
    help.push_str(
        "\nFor every 'Photos from *' folder inside a 'Takeout*' folder, copies are written to\n\
         a sibling '<folder> output' directory. Originals are never modified.",
    );
    help
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    // Load config
    let mut config = config::Config::load(cli.config.as_deref())?;

    // CLI flags override the config file
    if cli.dry_run {
        config.output.dry_run = true;
    }
    if let Some(engine) = cli.engine {
        config.metadata.engine = engine.into();
    }
    if let Some(ref exiftool) = cli.exiftool {
        config.metadata.exiftool_path = exiftool.display().to_string();
    }

    if !cli.directory.is_dir() {
        anyhow::bail!("Directory does not exist: {}", cli.directory.display());
    }

    // Handle --show-exif
    if cli.show_exif {
        let images = pipeline::collect_images(&cli.directory, &config.layout);
        if images.is_empty() {
            log::warn!("No supported image files found in {}", cli.directory.display());
        }
        for image_path in &images {
            print_embedded(image_path)?;
        }
        return Ok(());
    }

    // Probe the metadata engine before touching anything
    let engine = exif::build_engine(&config.metadata);
    let engine_info = engine.probe().await?;
    log::info!("Metadata engine: {engine_info}");
    if config.output.dry_run {
        log::info!("DRY RUN — no files will be created or modified");
    }

    let summary = walk::run(&cli.directory, engine.as_ref(), &DottedPathQuery, &config).await?;

    // JSON output
    if cli.json {
        let json_results: Vec<serde_json::Value> = summary
            .folders
            .iter()
            .map(|f| {
                serde_json::json!({
                    "folder": f.folder.display().to_string(),
                    "output_dir": f.output_dir.display().to_string(),
                    "processed": f.processed,
                    "metadata_attached": f.metadata_attached,
                    "failed": f.failed,
                    "images": f.images.iter().map(|i| serde_json::json!({
                        "source": i.source.display().to_string(),
                        "output": i.output.display().to_string(),
                        "sidecar": i.sidecar_path.as_ref().map(|p| p.display().to_string()),
                        "fields": i.fields.fields(),
                        "metadata_attached": i.metadata_attached,
                        "error": i.error,
                        "warning": i.warning,
                    })).collect::<Vec<_>>(),
                })
            })
            .collect();

        println!("{}", serde_json::to_string_pretty(&json_results)?);
    }

    // Summary
    log::info!(
        "Done: {} processed, {} with metadata, {} failed across {} folder(s)",
        summary.processed(),
        summary.metadata_attached(),
        summary.failed(),
        summary.folders.len()
    );
    if !summary.failed_folders.is_empty() {
        log::warn!("{} folder(s) could not be processed", summary.failed_folders.len());
    }

    Ok(())
}

// ANSI color codes
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Max width for the value column before wrapping.
const VAL_WIDTH: usize = 46;
/// Indent for continuation lines (tag column width + " : " = 25 chars + 2 leading spaces).
const INDENT: &str = "                           ";

/// Print the Takeout-derived metadata embedded in one image.
fn print_embedded(path: &Path) -> Result<()> {
    let data = exif::read_exif(path)?;

    println!();
    println!("{BOLD}File:{RESET} {}", path.display());
    println!("{DIM}{}{RESET}", "─".repeat(72));

    if data.is_empty() {
        println!("  {DIM}(no embedded metadata found){RESET}");
        return Ok(());
    }

    let rows: Vec<(&str, Option<String>)> = vec![
        ("Title", data.title.clone()),
        ("Description", data.description.clone()),
        ("CreateDate", data.create_date.clone()),
        ("DateTimeOriginal", data.date_time_original.clone()),
        ("GPSLatitude", data.gps_latitude.map(|v| format!("{v:.6}"))),
        ("GPSLongitude", data.gps_longitude.map(|v| format!("{v:.6}"))),
        ("UserComment", data.user_comment.clone()),
    ];
    for (tag, val) in &rows {
        if let Some(v) = val {
            print_row(tag, v);
        }
    }

    Ok(())
}

/// Print a single row in the metadata display table.
fn print_row(tag: &str, val: &str) {
    let tag_col = format!("{:<22}", tag);
    let lines = wrap_text(val, VAL_WIDTH);
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            println!("  {tag_col} : {line}");
        } else {
            println!("  {INDENT}{line}");
        }
    }
}

/// Wrap text at word boundaries to fit within max_width.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in s.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= max_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line);
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(s.to_string());
    }

    lines
}
