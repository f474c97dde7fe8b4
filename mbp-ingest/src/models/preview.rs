//! Preview assets
//!
//! A preview is either a remote thumbnail URL or a locally generated PNG held
//! in a temporary file. The local variant owns its file: it is not `Clone`,
//! and dropping or releasing it deletes the file, so each blob is released
//! exactly once by whoever owns it last.

use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// Locally generated thumbnail, deleted on drop
#[derive(Debug)]
pub struct ThumbnailBlob {
    path: TempPath,
    len: u64,
}

impl ThumbnailBlob {
    pub const MIME_TYPE: &'static str = "image/png";

    /// Persist PNG bytes into a fresh temporary file
    pub fn from_png(bytes: &[u8]) -> std::io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("mbp-thumb-")
            .suffix(".png")
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;

        Ok(Self {
            path: file.into_temp_path(),
            len: bytes.len() as u64,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Delete the backing file now, reporting failures instead of swallowing them on drop
    pub fn release(self) {
        let blob_path = self.path.display().to_string();
        match self.path.close() {
            Ok(()) => tracing::debug!(path = %blob_path, "Released thumbnail blob"),
            Err(e) => tracing::warn!(path = %blob_path, error = %e, "Failed to delete thumbnail blob"),
        }
    }
}

/// Resolved preview for an item
#[derive(Debug)]
pub enum Preview {
    /// Thumbnail hosted elsewhere
    Remote(String),
    /// Thumbnail rendered locally and owned by the item
    Local(ThumbnailBlob),
}

impl Preview {
    pub fn is_local(&self) -> bool {
        matches!(self, Preview::Local(_))
    }

    /// Release any owned resources
    pub fn release(self) {
        if let Preview::Local(blob) = self {
            blob.release();
        }
    }

    pub fn view(&self) -> PreviewView {
        match self {
            Preview::Remote(url) => PreviewView::Remote { url: url.clone() },
            Preview::Local(blob) => PreviewView::Local {
                path: blob.path().to_path_buf(),
                bytes: blob.len(),
            },
        }
    }
}

/// Serializable snapshot of a preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PreviewView {
    Remote { url: String },
    Local { path: PathBuf, bytes: u64 },
}
