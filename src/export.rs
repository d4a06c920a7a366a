//! Handing the flattened image to the clipboard or to disk.

use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use arboard::Clipboard;
use chrono::{DateTime, Local};
use image::{ImageFormat, RgbaImage};
use log::{info, warn};

use crate::error::ExportError;

pub const DEFAULT_FOLDER: &str = "Screenshots";
pub const DEFAULT_PREFIX: &str = "screenshot";

/// Where a flattened image ends up.
pub trait ExportSink {
    /// Delivers `image`, returning a short description of the destination.
    fn deliver(&mut self, image: &RgbaImage) -> Result<String, ExportError>;
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// System clipboard. Not retried.
#[derive(Debug, Default)]
pub struct ClipboardSink;

impl ExportSink for ClipboardSink {
    fn deliver(&mut self, image: &RgbaImage) -> Result<String, ExportError> {
        let mut clipboard = Clipboard::new().map_err(|e| ExportError::Clipboard(e.to_string()))?;
        clipboard
            .set_image(arboard::ImageData {
                width: image.width() as usize,
                height: image.height() as usize,
                bytes: std::borrow::Cow::Borrowed(image.as_raw()),
            })
            .map_err(|e| ExportError::Clipboard(e.to_string()))?;
        info!("copied {}x{} image to clipboard", image.width(), image.height());
        Ok("clipboard".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    /// Attempt `n` (1-based retry) waits `n * backoff` first.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            backoff: Duration::from_millis(250),
        }
    }
}

/// Runs `op` until it succeeds or the policy is exhausted, sleeping with
/// linear backoff between attempts.
pub fn retry_with_backoff<T>(
    policy: RetryPolicy,
    mut op: impl FnMut(u32) -> io::Result<T>,
    mut sleep: impl FnMut(Duration),
) -> Result<T, ExportError> {
    let mut attempt = 0;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(source) if attempt >= policy.retries => {
                return Err(ExportError::Download {
                    attempts: attempt + 1,
                    source,
                });
            }
            Err(e) => {
                attempt += 1;
                warn!("download attempt {attempt} failed: {e}, retrying");
                sleep(policy.backoff * attempt);
            }
        }
    }
}

/// Replaces anything outside `[A-Za-z0-9._-]` with `_` and strips leading
/// dots, falling back to `fallback` when nothing usable is left.
pub fn sanitize_component(raw: &str, fallback: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.chars().all(|c| c == '_') {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

/// `<folder>/<prefix>_<YYYY-MM-DD_HH-MM-SS>.png`, every part sanitized.
pub fn download_path(folder: &str, prefix: &str, timestamp: DateTime<Local>) -> PathBuf {
    let folder = sanitize_component(folder, DEFAULT_FOLDER);
    let prefix = sanitize_component(prefix, DEFAULT_PREFIX);
    let stamp = timestamp.format("%Y-%m-%d_%H-%M-%S");
    PathBuf::from(folder).join(format!("{prefix}_{stamp}.png"))
}

/// `path` itself when unused, otherwise the first free `<stem>-N.<ext>`.
pub fn next_free_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut n = 1u32;
    loop {
        let candidate = path.with_file_name(format!("{stem}-{n}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Writes through a temporary sibling so readers never see a partial file.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("png.part");
    let result = fs::write(&tmp, bytes).and_then(|()| fs::rename(&tmp, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Saves into `<dir>/<folder>/` under a timestamped name, with retries.
#[derive(Debug, Clone)]
pub struct DownloadSink {
    pub dir: PathBuf,
    pub folder: String,
    pub prefix: String,
    pub retry: RetryPolicy,
}

impl DownloadSink {
    pub fn new(dir: impl Into<PathBuf>, folder: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            folder: folder.into(),
            prefix: DEFAULT_PREFIX.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn target_path(&self, timestamp: DateTime<Local>) -> PathBuf {
        self.dir.join(download_path(&self.folder, &self.prefix, timestamp))
    }
}

impl ExportSink for DownloadSink {
    fn deliver(&mut self, image: &RgbaImage) -> Result<String, ExportError> {
        let png = encode_png(image)?;
        let path = next_free_path(&self.target_path(Local::now()));
        retry_with_backoff(self.retry, |_| write_atomically(&path, &png), std::thread::sleep)?;
        info!("saved {} bytes to {}", png.len(), path.display());
        Ok(path.display().to_string())
    }
}

/// Delivers `image` on a worker thread so retries and backoff never block
/// the caller. `notify` runs once the result is ready to receive.
pub fn deliver_in_background<S>(
    mut sink: S,
    image: RgbaImage,
    notify: impl FnOnce() + Send + 'static,
) -> Receiver<Result<String, ExportError>>
where
    S: ExportSink + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let result = sink.deliver(&image);
        if tx.send(result).is_err() {
            warn!("export finished after its receiver was dropped");
        }
        notify();
    });
    rx
}

/// A user-chosen path, e.g. from a save dialog.
#[derive(Debug, Clone)]
pub struct FileSink {
    pub path: PathBuf,
}

impl ExportSink for FileSink {
    fn deliver(&mut self, image: &RgbaImage) -> Result<String, ExportError> {
        let png = encode_png(image)?;
        write_atomically(&self.path, &png).map_err(|source| ExportError::Download {
            attempts: 1,
            source,
        })?;
        info!("saved {} bytes to {}", png.len(), self.path.display());
        Ok(self.path.display().to_string())
    }
}
