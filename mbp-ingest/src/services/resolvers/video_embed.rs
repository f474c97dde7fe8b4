//! Video embed resolver
//!
//! The thumbnail is derived from the video id without a network call; the
//! title comes from oEmbed and is only fetched while the title is loading.

use super::{OEmbedClient, SourceResolver};
use crate::models::{ItemSource, Preview, ResolveRequest, Resolution};
use crate::services::source_normalizer::extract_video_id;
use async_trait::async_trait;

pub struct VideoEmbedResolver {
    oembed: OEmbedClient,
    thumbnail_base: String,
}

impl VideoEmbedResolver {
    pub fn new(oembed: OEmbedClient, thumbnail_base: String) -> Self {
        Self {
            oembed,
            thumbnail_base,
        }
    }

    pub fn thumbnail_url(&self, video_id: &str) -> String {
        format!("{}/{}/hqdefault.jpg", self.thumbnail_base, video_id)
    }
}

#[async_trait]
impl SourceResolver for VideoEmbedResolver {
    async fn resolve(&self, request: &ResolveRequest) -> Resolution {
        let ItemSource::Link { url, .. } = &request.source else {
            return Resolution::default();
        };

        let mut resolution = Resolution::default();
        let video_id = extract_video_id(url);
        if let Some(id) = &video_id {
            resolution.preview = Some(Preview::Remote(self.thumbnail_url(id)));
        }

        if request.needs_title || video_id.is_none() {
            match self.oembed.fetch(url).await {
                Ok(response) => {
                    if request.needs_title {
                        resolution.title = response.title;
                    }
                    if resolution.preview.is_none() {
                        resolution.preview = response.thumbnail_url.map(Preview::Remote);
                    }
                }
                Err(e) => {
                    tracing::warn!(item_id = %request.item_id, error = %e, "Video title lookup failed");
                }
            }
        }

        resolution
    }
}
