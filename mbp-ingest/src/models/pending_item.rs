//! Pending item state machine
//!
//! States: `Pending → Resolving → Ready → Uploading → Success | Error`.
//! All mutation goes through the transition methods below; the ledger calls
//! them under its lock and is the only owner of live items.

use crate::error::{IngestError, IngestResult};
use crate::models::preview::{Preview, PreviewView};
use crate::models::resolution::{ResolveRequest, Resolution};
use mbp_common::events::ItemStatus;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Placeholder title while the authoritative title is being fetched
pub const LOADING_TITLE: &str = "Loading...";

/// Link classification, computed once at parse time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectedType {
    VideoEmbed,
    CloudDocument,
    CloudFolder,
    GenericDocument,
    GenericLink,
}

impl DetectedType {
    pub fn label(self) -> &'static str {
        match self {
            DetectedType::VideoEmbed => "video-embed",
            DetectedType::CloudDocument => "cloud-document",
            DetectedType::CloudFolder => "cloud-folder",
            DetectedType::GenericDocument => "generic-document",
            DetectedType::GenericLink => "generic-link",
        }
    }

    /// Whether a resolver can derive a preview for this type
    pub fn has_preview_source(self) -> bool {
        matches!(
            self,
            DetectedType::VideoEmbed | DetectedType::CloudDocument | DetectedType::CloudFolder
        )
    }
}

/// A selected local file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
    /// Sniffed from magic bytes, falling back to the extension
    pub mime_type: Option<String>,
}

impl FileHandle {
    /// Build a handle from filesystem metadata
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            ));
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let mime_type = infer::get_from_path(path)
            .ok()
            .flatten()
            .map(|kind| kind.mime_type().to_string())
            .or_else(|| mime_from_extension(path).map(str::to_string));

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            size_bytes: metadata.len(),
            mime_type,
        })
    }

    /// PDF documents get a rendered first-page preview
    pub fn is_document(&self) -> bool {
        self.mime_type.as_deref() == Some("application/pdf")
    }
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    let mime = match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "mp4" => "video/mp4",
        "txt" => "text/plain",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => return None,
    };
    Some(mime)
}

/// Where an item comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ItemSource {
    File {
        handle: FileHandle,
    },
    Link {
        url: String,
        detected_type: DetectedType,
    },
}

impl ItemSource {
    /// `sourceType` sent to the creation endpoint
    pub fn source_type_label(&self) -> &'static str {
        match self {
            ItemSource::File { .. } => "file",
            ItemSource::Link { detected_type, .. } => detected_type.label(),
        }
    }

    fn has_preview_source(&self) -> bool {
        match self {
            ItemSource::File { handle } => handle.is_document(),
            ItemSource::Link { detected_type, .. } => detected_type.has_preview_source(),
        }
    }
}

/// The unit of work tracked through the batch
#[derive(Debug)]
pub struct PendingItem {
    pub id: Uuid,
    /// Ordinal assigned by the ledger on insertion
    pub index: usize,
    pub source: ItemSource,
    pub title: String,
    /// Heuristic title used when no authoritative title can be fetched
    pub fallback_title: String,
    pub preview: Option<Preview>,
    pub page_count: Option<u32>,
    pub status: ItemStatus,
    pub error: Option<String>,
    pub result_id: Option<String>,
    pub title_loading: bool,
    pub preview_loading: bool,
    pub generation: u64,
    /// A user-provided title is never overwritten by resolution
    title_edited: bool,
}

impl PendingItem {
    /// New link item; `title: None` means the title must be fetched
    pub fn from_link(
        title: Option<String>,
        url: String,
        detected_type: DetectedType,
        fallback_title: String,
    ) -> Self {
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| LOADING_TITLE.to_string());
        Self::new(
            ItemSource::Link { url, detected_type },
            title,
            fallback_title,
        )
    }

    pub fn from_file(handle: FileHandle, title: String) -> Self {
        Self::new(ItemSource::File { handle }, title.clone(), title)
    }

    fn new(source: ItemSource, title: String, fallback_title: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            index: 0,
            source,
            title,
            fallback_title,
            preview: None,
            page_count: None,
            status: ItemStatus::Pending,
            error: None,
            result_id: None,
            title_loading: false,
            preview_loading: false,
            generation: 0,
            title_edited: false,
        }
    }

    pub fn needs_title(&self) -> bool {
        self.title == LOADING_TITLE
    }

    /// Non-empty and not the loading sentinel
    pub fn has_valid_title(&self) -> bool {
        let title = self.title.trim();
        !title.is_empty() && title != LOADING_TITLE
    }

    /// `Pending → Resolving`, or straight to `Ready` when nothing needs resolving
    ///
    /// Returns the request to hand to the resolver, if any.
    pub fn begin_resolution(&mut self) -> IngestResult<Option<ResolveRequest>> {
        if self.status != ItemStatus::Pending {
            return Err(self.invalid("resolving"));
        }

        let needs_title = self.needs_title();
        let needs_preview = self.source.has_preview_source();

        if !needs_title && !needs_preview {
            self.status = ItemStatus::Ready;
            return Ok(None);
        }

        self.status = ItemStatus::Resolving;
        self.title_loading = needs_title;
        self.preview_loading = needs_preview;

        Ok(Some(ResolveRequest {
            item_id: self.id,
            generation: self.generation,
            source: self.source.clone(),
            fallback_title: self.fallback_title.clone(),
            needs_title,
            needs_preview,
        }))
    }

    /// Apply a finished resolution
    ///
    /// Stale results (generation moved on, or the item left `Resolving`) are
    /// handed back so the caller can release them.
    pub fn apply_resolution(
        &mut self,
        generation: u64,
        resolution: Resolution,
    ) -> Result<(), Resolution> {
        if generation != self.generation || self.status != ItemStatus::Resolving {
            return Err(resolution);
        }

        let Resolution {
            title,
            preview,
            page_count,
        } = resolution;

        if self.title_loading && !self.title_edited {
            self.title = title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| self.fallback_title.clone());
        }
        if self.needs_title() {
            self.title = self.fallback_title.clone();
        }

        if let Some(old) = self.preview.take() {
            old.release();
        }
        self.preview = preview;
        if matches!(self.source, ItemSource::File { .. }) {
            self.page_count = page_count.filter(|&n| n > 0);
        }

        self.title_loading = false;
        self.preview_loading = false;
        self.status = ItemStatus::Ready;
        Ok(())
    }

    /// User title edit, allowed before upload
    pub fn rename(&mut self, title: &str) -> IngestResult<()> {
        if !self.status.is_editable() {
            return Err(self.invalid("renamed"));
        }
        let title = title.trim();
        if title.is_empty() || title == LOADING_TITLE {
            return Err(IngestError::InvalidTitle(format!("{:?}", title)));
        }

        self.title = title.to_string();
        self.title_edited = true;
        self.title_loading = false;
        self.settle_if_resolved();
        Ok(())
    }

    /// Replace a link's URL; discards any in-flight resolution
    pub fn edit_link(
        &mut self,
        url: String,
        detected_type: DetectedType,
        fallback_title: String,
    ) -> IngestResult<()> {
        if !self.status.is_editable() {
            return Err(self.invalid("edited"));
        }
        if !matches!(self.source, ItemSource::Link { .. }) {
            return Err(IngestError::WrongSourceKind(
                "URL edits apply to link items only".to_string(),
            ));
        }

        self.source = ItemSource::Link { url, detected_type };
        self.fallback_title = fallback_title;
        if self.title_loading && !self.title_edited {
            self.title = LOADING_TITLE.to_string();
        }
        self.release_owned_assets();
        self.preview = None;
        self.page_count = None;
        self.title_loading = false;
        self.preview_loading = false;
        self.generation += 1;
        self.status = ItemStatus::Pending;
        Ok(())
    }

    /// Invalidate in-flight work ahead of removal
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    /// `Ready → Uploading`
    pub fn mark_uploading(&mut self) -> IngestResult<()> {
        if self.status != ItemStatus::Ready {
            return Err(self.invalid("uploading"));
        }
        if !self.has_valid_title() {
            return Err(IngestError::InvalidTitle(format!("{:?}", self.title)));
        }
        self.status = ItemStatus::Uploading;
        Ok(())
    }

    /// `Uploading → Success`
    pub fn mark_succeeded(&mut self, result_id: String) -> IngestResult<()> {
        if self.status != ItemStatus::Uploading {
            return Err(self.invalid("success"));
        }
        self.status = ItemStatus::Success;
        self.result_id = Some(result_id);
        self.release_owned_assets();
        Ok(())
    }

    /// `Uploading → Error`
    pub fn mark_failed(&mut self, error: String) -> IngestResult<()> {
        if self.status != ItemStatus::Uploading {
            return Err(self.invalid("error"));
        }
        self.status = ItemStatus::Error;
        self.error = Some(error);
        self.release_owned_assets();
        Ok(())
    }

    /// Release a locally owned preview; remote previews are kept for display
    pub fn release_owned_assets(&mut self) {
        if self.preview.as_ref().is_some_and(Preview::is_local) {
            if let Some(preview) = self.preview.take() {
                tracing::debug!(item_id = %self.id, "Releasing owned preview");
                preview.release();
            }
        }
    }

    pub fn view(&self) -> ItemView {
        ItemView {
            id: self.id,
            index: self.index,
            source: self.source.clone(),
            title: self.title.clone(),
            preview: self.preview.as_ref().map(Preview::view),
            page_count: self.page_count,
            status: self.status,
            error: self.error.clone(),
            result_id: self.result_id.clone(),
            title_loading: self.title_loading,
            preview_loading: self.preview_loading,
        }
    }

    /// A title edit can finish a resolution that was only waiting on the title
    fn settle_if_resolved(&mut self) {
        if self.status == ItemStatus::Resolving && !self.title_loading && !self.preview_loading {
            self.status = ItemStatus::Ready;
        }
    }

    fn invalid(&self, to: &'static str) -> IngestError {
        IngestError::InvalidTransition {
            item_id: self.id,
            from: self.status,
            to,
        }
    }
}

/// Serializable snapshot of an item
#[derive(Debug, Clone, Serialize)]
pub struct ItemView {
    pub id: Uuid,
    pub index: usize,
    pub source: ItemSource,
    pub title: String,
    pub preview: Option<PreviewView>,
    pub page_count: Option<u32>,
    pub status: ItemStatus,
    pub error: Option<String>,
    pub result_id: Option<String>,
    pub title_loading: bool,
    pub preview_loading: bool,
}
