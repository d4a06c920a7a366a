//! One-shot handoff of a captured screenshot to the editor through a
//! key-value store.
//!
//! The entry is a small JSON object holding the PNG as a base64 data URL and
//! the crop-only flag. Reading it with [`CaptureHandoff::take`] removes it.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::{ImageFormat, RgbaImage};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::LoadError;

pub const CAPTURE_KEY: &str = "capture";

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn put(&mut self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&mut self, key: &str) -> io::Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn put(&mut self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(tmp, path)
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct HandoffEntry {
    image: String,
    #[serde(default)]
    crop_only: bool,
}

/// A captured screenshot on its way to the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureHandoff {
    pub png: Vec<u8>,
    pub crop_only: bool,
}

impl CaptureHandoff {
    pub fn new(png: Vec<u8>, crop_only: bool) -> Self {
        Self { png, crop_only }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        let entry = HandoffEntry {
            image: format!("{DATA_URL_PREFIX}{}", BASE64.encode(&self.png)),
            crop_only: self.crop_only,
        };
        serde_json::to_string(&entry)
    }

    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let entry: HandoffEntry =
            serde_json::from_str(json).map_err(|e| LoadError::Malformed(e.to_string()))?;
        let encoded = entry
            .image
            .strip_prefix(DATA_URL_PREFIX)
            .ok_or_else(|| LoadError::Malformed("image is not a PNG data URL".to_string()))?;
        let png = BASE64
            .decode(encoded.trim())
            .map_err(|e| LoadError::Malformed(e.to_string()))?;
        Ok(Self {
            png,
            crop_only: entry.crop_only,
        })
    }

    pub fn publish(&self, store: &mut dyn KeyValueStore, key: &str) -> io::Result<()> {
        store.put(key, &self.to_json()?)?;
        info!("published capture ({} bytes) under `{key}`", self.png.len());
        Ok(())
    }

    /// Reads and removes the entry. A malformed entry is removed as well, so
    /// a bad capture cannot wedge the next launch.
    pub fn take(store: &mut dyn KeyValueStore, key: &str) -> Result<Self, LoadError> {
        let json = store
            .get(key)?
            .ok_or_else(|| LoadError::MissingEntry(key.to_owned()))?;
        store.remove(key)?;
        debug!("took handoff entry `{key}` ({} bytes)", json.len());
        Self::from_json(&json)
    }

    pub fn decode(&self) -> Result<RgbaImage, LoadError> {
        let image = image::load_from_memory_with_format(&self.png, ImageFormat::Png)?.to_rgba8();
        if image.width() == 0 || image.height() == 0 {
            return Err(LoadError::Empty);
        }
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::encode_png;
    use image::Rgba;
    use tempfile::tempdir;

    fn sample_png() -> Vec<u8> {
        encode_png(&RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]))).unwrap()
    }

    #[test]
    fn take_consumes_the_entry() {
        let mut store = MemoryStore::new();
        CaptureHandoff::new(sample_png(), true)
            .publish(&mut store, CAPTURE_KEY)
            .unwrap();

        let handoff = CaptureHandoff::take(&mut store, CAPTURE_KEY).unwrap();
        assert!(handoff.crop_only);
        assert_eq!(handoff.decode().unwrap().dimensions(), (3, 2));
        assert!(matches!(
            CaptureHandoff::take(&mut store, CAPTURE_KEY),
            Err(LoadError::MissingEntry(_))
        ));
    }

    #[test]
    fn malformed_entries_are_rejected() {
        assert!(matches!(
            CaptureHandoff::from_json("{not json"),
            Err(LoadError::Malformed(_))
        ));
        assert!(matches!(
            CaptureHandoff::from_json(r#"{"image":"data:image/jpeg;base64,AAAA"}"#),
            Err(LoadError::Malformed(_))
        ));
        assert!(matches!(
            CaptureHandoff::from_json(r#"{"image":"data:image/png;base64,@@@"}"#),
            Err(LoadError::Malformed(_))
        ));
    }

    #[test]
    fn corrupt_png_fails_to_decode() {
        let handoff = CaptureHandoff::new(b"\x89PNG garbage".to_vec(), false);
        assert!(matches!(handoff.decode(), Err(LoadError::Decode(_))));
    }

    #[test]
    fn entry_is_a_png_data_url() {
        let handoff = CaptureHandoff::new(sample_png(), true);
        let json = handoff.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["image"].as_str().unwrap().starts_with(DATA_URL_PREFIX));
        assert_eq!(value["crop_only"], serde_json::Value::Bool(true));
        assert_eq!(CaptureHandoff::from_json(&json).unwrap(), handoff);
    }

    #[test]
    fn crop_only_defaults_to_false() {
        let json = format!(r#"{{"image":"{DATA_URL_PREFIX}{}"}}"#, BASE64.encode(sample_png()));
        assert!(!CaptureHandoff::from_json(&json).unwrap().crop_only);
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("handoff"));
        assert_eq!(store.get("capture").unwrap(), None);
        store.put("capture", "{}").unwrap();
        assert_eq!(store.get("capture").unwrap().as_deref(), Some("{}"));
        store.remove("capture").unwrap();
        store.remove("capture").unwrap();
        assert_eq!(store.get("capture").unwrap(), None);
    }
}
