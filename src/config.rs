//! Command-line configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use image::Rgba;

use crate::editor::EditorSettings;
use crate::export::{DEFAULT_FOLDER, DEFAULT_PREFIX, DownloadSink, RetryPolicy};

#[derive(Debug, Clone, Parser)]
#[command(name = "snapredact", version, about = "Screenshot crop and redaction editor")]
pub struct Config {
    /// Open this PNG instead of waiting for a capture.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Directory of the key-value store captures are handed over through.
    #[arg(long, default_value_os_t = default_handoff_dir())]
    pub handoff_dir: PathBuf,

    /// Start in crop mode.
    #[arg(long)]
    pub crop_only: bool,

    /// Base directory saved screenshots go to.
    #[arg(long, default_value_os_t = default_download_dir())]
    pub download_dir: PathBuf,

    /// Folder created under the download directory.
    #[arg(long, default_value = DEFAULT_FOLDER)]
    pub folder_name: String,

    /// File name prefix before the timestamp.
    #[arg(long, default_value = DEFAULT_PREFIX)]
    pub file_prefix: String,

    /// Extra attempts after a failed save.
    #[arg(long, default_value_t = 0)]
    pub download_retries: u32,

    /// Linear backoff step between save attempts, in milliseconds.
    #[arg(long, default_value_t = 250)]
    pub retry_backoff_ms: u64,

    /// Minimum spacing between preview redraws while dragging, in milliseconds.
    #[arg(long, default_value_t = 16)]
    pub preview_interval_ms: u64,

    /// Redaction color as #RRGGBB or #RRGGBBAA.
    #[arg(long, default_value = "#000000", value_parser = parse_color)]
    pub redaction_color: Rgba<u8>,

    /// Edit a downscaled copy when the longest side exceeds this many pixels.
    #[arg(long)]
    pub max_working_size: Option<u32>,
}

impl Config {
    pub fn editor_settings(&self) -> EditorSettings {
        EditorSettings {
            redaction_color: self.redaction_color,
            preview_interval: Duration::from_millis(self.preview_interval_ms),
            max_working_size: self.max_working_size,
        }
    }

    pub fn download_sink(&self) -> DownloadSink {
        DownloadSink {
            dir: self.download_dir.clone(),
            folder: self.folder_name.clone(),
            prefix: self.file_prefix.clone(),
            retry: RetryPolicy {
                retries: self.download_retries,
                backoff: Duration::from_millis(self.retry_backoff_ms),
            },
        }
    }
}

fn default_handoff_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("snapredact")
        .join("handoff")
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn parse_color(raw: &str) -> Result<Rgba<u8>, String> {
    let hex = raw.trim().trim_start_matches('#');
    if !matches!(hex.len(), 6 | 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("`{raw}` is not #RRGGBB or #RRGGBBAA"));
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| e.to_string());
    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, alpha]))
}
