//! Cloud document resolver

use super::{DriveClient, SourceResolver};
use crate::models::{ItemSource, Preview, ResolveRequest, Resolution};
use crate::services::source_normalizer::extract_drive_file_id;
use async_trait::async_trait;
use std::sync::Arc;

pub struct CloudDocumentResolver {
    drive: Arc<DriveClient>,
}

impl CloudDocumentResolver {
    pub fn new(drive: Arc<DriveClient>) -> Self {
        Self { drive }
    }
}

#[async_trait]
impl SourceResolver for CloudDocumentResolver {
    async fn resolve(&self, request: &ResolveRequest) -> Resolution {
        let ItemSource::Link { url, .. } = &request.source else {
            return Resolution::default();
        };
        let Some(file_id) = extract_drive_file_id(url) else {
            tracing::warn!(item_id = %request.item_id, url = %url, "No document id in URL");
            return Resolution::default();
        };

        let mut resolution =
            Resolution::with_preview(Preview::Remote(self.drive.thumbnail_url(&file_id)));

        if request.needs_title && self.drive.has_api_key() {
            match self.drive.file_name(&file_id).await {
                Ok(name) => resolution.title = Some(name),
                Err(e) => {
                    tracing::warn!(item_id = %request.item_id, error = %e, "Document name lookup failed");
                }
            }
        }

        resolution
    }
}
