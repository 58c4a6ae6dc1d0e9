use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use super::message::ImageRef;

/// Raw image the user attached to a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub bytes: Vec<u8>,
    pub media_type: String,
    pub source: Option<PathBuf>,
}

impl ImageBlob {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
            source: None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        if bytes.is_empty() {
            bail!("image file is empty: {}", path.display());
        }
        Ok(Self {
            bytes,
            media_type: mime_for_path(path).unwrap_or("image/png").to_string(),
            source: Some(path.to_path_buf()),
        })
    }

    /// Local reference shown on the user's own message.
    pub fn preview(&self) -> ImageRef {
        let source = self
            .source
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "attached image".to_string());
        ImageRef::Preview {
            source,
            media_type: self.media_type.clone(),
            byte_len: self.bytes.len(),
        }
    }
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}
