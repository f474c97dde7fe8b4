//! Cloud folder resolver
//!
//! The preview of a shared folder is the thumbnail of the first file found by
//! a depth-first search in listing order: files at a level win over anything
//! below it, and the search stops `max_depth` levels under the shared folder.
//! The whole search is bounded by `search_timeout`; on expiry the folder is
//! left without a preview.
//! The folder's own name is fetched concurrently as its title.

use super::{bounded, DriveClient, DriveFile, ResolveError, SourceResolver};
use crate::models::{ItemSource, Preview, ResolveRequest, Resolution};
use crate::services::source_normalizer::extract_drive_folder_id;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub struct CloudFolderResolver {
    drive: Arc<DriveClient>,
    max_depth: usize,
    search_timeout: Duration,
}

impl CloudFolderResolver {
    pub fn new(drive: Arc<DriveClient>, max_depth: usize, search_timeout: Duration) -> Self {
        Self {
            drive,
            max_depth,
            search_timeout,
        }
    }

    /// First non-folder entry reachable within `max_depth`
    ///
    /// A failed listing of the shared folder itself is an error; failures
    /// further down only skip that branch.
    pub async fn find_preview_file(&self, folder_id: &str) -> Result<Option<DriveFile>, ResolveError> {
        let mut stack = vec![(folder_id.to_string(), 0usize)];

        while let Some((current, depth)) = stack.pop() {
            let children = match self.drive.list_children(&current).await {
                Ok(children) => children,
                Err(e) if depth == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!(folder_id = %current, error = %e, "Skipping unreadable subfolder");
                    continue;
                }
            };

            let (folders, files): (Vec<DriveFile>, Vec<DriveFile>) =
                children.into_iter().partition(DriveFile::is_folder);

            if let Some(file) = files.into_iter().next() {
                tracing::debug!(folder_id = %folder_id, file_id = %file.id, depth, "Folder preview file found");
                return Ok(Some(file));
            }

            if depth < self.max_depth {
                // Reversed so the first listed subfolder is searched first
                stack.extend(folders.into_iter().rev().map(|f| (f.id, depth + 1)));
            }
        }

        Ok(None)
    }

    fn preview_for(&self, file: DriveFile) -> Preview {
        match file.thumbnail_link.filter(|l| !l.is_empty()) {
            Some(link) => Preview::Remote(link),
            None => Preview::Remote(self.drive.thumbnail_url(&file.id)),
        }
    }
}

#[async_trait]
impl SourceResolver for CloudFolderResolver {
    async fn resolve(&self, request: &ResolveRequest) -> Resolution {
        let ItemSource::Link { url, .. } = &request.source else {
            return Resolution::default();
        };
        let Some(folder_id) = extract_drive_folder_id(url) else {
            tracing::warn!(item_id = %request.item_id, url = %url, "No folder id in URL");
            return Resolution::default();
        };
        if !self.drive.has_api_key() {
            tracing::warn!(item_id = %request.item_id, "Drive API key not configured; folder left without preview");
            return Resolution::default();
        }

        let title_lookup = async {
            if request.needs_title {
                Some(self.drive.file_name(&folder_id).await)
            } else {
                None
            }
        };
        let preview_search = bounded(self.search_timeout, self.find_preview_file(&folder_id));
        let (title, preview_file) = tokio::join!(title_lookup, preview_search);

        let mut resolution = Resolution::default();
        match title {
            Some(Ok(name)) => resolution.title = Some(name),
            Some(Err(e)) => {
                tracing::warn!(item_id = %request.item_id, error = %e, "Folder name lookup failed");
            }
            None => {}
        }
        match preview_file {
            Ok(Some(file)) => resolution.preview = Some(self.preview_for(file)),
            Ok(None) => {
                tracing::debug!(item_id = %request.item_id, "Folder has no files within depth bound");
            }
            Err(e) => {
                tracing::warn!(item_id = %request.item_id, error = %e, "Folder listing failed");
            }
        }

        resolution
    }
}
