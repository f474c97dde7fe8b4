//! Metadata resolvers
//!
//! One resolver per source kind derives the preview, authoritative title and
//! page count for an item. Resolvers never fail the item: every failure is
//! logged and degrades to the best-available result, so each spawned task
//! converges its item to `Ready`.
//!
//! Tasks run concurrently and complete in any order. Each one races its work
//! against the item's cancellation token; a cancelled or stale result never
//! reaches the item.

pub mod cloud_document;
pub mod cloud_folder;
pub mod drive_client;
pub mod local_document;
pub mod oembed_client;
pub mod video_embed;

pub use cloud_document::CloudDocumentResolver;
pub use cloud_folder::CloudFolderResolver;
pub use drive_client::{DriveClient, DriveFile};
pub use local_document::{LocalDocumentResolver, PageRenderer, PdfiumRenderer, RenderedPage};
pub use oembed_client::{OEmbedClient, OEmbedResponse};
pub use video_embed::VideoEmbedResolver;

use crate::models::{DetectedType, ItemSource, ResolveRequest, Resolution};
use crate::services::item_ledger::{ItemLedger, ResolutionTicket};
use async_trait::async_trait;
use mbp_common::config::ResolverSettings;
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Resolver sub-step errors; always absorbed into a degraded `Resolution`
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0} not configured")]
    NotConfigured(&'static str),

    #[error("Render error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ResolveError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ResolveError::Network(format!("request timed out: {}", e))
        } else if e.is_decode() {
            ResolveError::Parse(e.to_string())
        } else {
            ResolveError::Network(e.to_string())
        }
    }
}

/// Run `fut` with an upper bound
pub async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, ResolveError>
where
    F: Future<Output = Result<T, ResolveError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ResolveError::Timeout(limit))?
}

/// Runtime resolver configuration
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub request_timeout: Duration,
    pub folder_depth: usize,
    pub folder_search_timeout: Duration,
    pub thumbnail_width: u32,
    pub drive_requests_per_second: u32,
    pub drive_api_key: Option<String>,
    pub drive_api_base: String,
    pub drive_web_base: String,
    pub oembed_endpoint: String,
    pub video_thumbnail_base: String,
}

impl ResolverConfig {
    /// Build from TOML settings; the API key is resolved separately (ENV → TOML)
    pub fn from_settings(settings: &ResolverSettings, drive_api_key: Option<String>) -> Self {
        Self {
            request_timeout: Duration::from_secs(settings.request_timeout_secs.max(1)),
            folder_depth: settings.folder_depth,
            folder_search_timeout: Duration::from_secs(settings.folder_search_timeout_secs.max(1)),
            thumbnail_width: settings.thumbnail_width.max(1),
            drive_requests_per_second: settings.drive_requests_per_second,
            drive_api_key,
            drive_api_base: settings.drive_api_base.trim_end_matches('/').to_string(),
            drive_web_base: settings.drive_web_base.trim_end_matches('/').to_string(),
            oembed_endpoint: settings.oembed_endpoint.clone(),
            video_thumbnail_base: settings.video_thumbnail_base.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::from_settings(&ResolverSettings::default(), None)
    }
}

/// Source-kind specific resolution
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Best-available metadata; never fails
    async fn resolve(&self, request: &ResolveRequest) -> Resolution;
}

/// Dispatches each request to the resolver for its source kind
pub struct MetadataResolver {
    video: VideoEmbedResolver,
    document: CloudDocumentResolver,
    folder: CloudFolderResolver,
    local: LocalDocumentResolver,
}

impl MetadataResolver {
    /// Resolver backed by the system pdfium library for local documents
    pub fn new(config: ResolverConfig) -> Result<Self, ResolveError> {
        Self::with_renderer(config, Arc::new(PdfiumRenderer))
    }

    pub fn with_renderer(
        config: ResolverConfig,
        renderer: Arc<dyn PageRenderer>,
    ) -> Result<Self, ResolveError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .user_agent(mbp_common::config::get_user_agent())
            .build()
            .map_err(|e| ResolveError::Network(format!("Failed to build HTTP client: {}", e)))?;

        let drive = Arc::new(DriveClient::new(client.clone(), &config));
        let oembed = OEmbedClient::new(client, config.oembed_endpoint.clone());

        Ok(Self {
            video: VideoEmbedResolver::new(oembed, config.video_thumbnail_base.clone()),
            document: CloudDocumentResolver::new(Arc::clone(&drive)),
            folder: CloudFolderResolver::new(
                drive,
                config.folder_depth,
                config.folder_search_timeout,
            ),
            local: LocalDocumentResolver::new(
                renderer,
                config.thumbnail_width,
                config.request_timeout,
            ),
        })
    }

    fn resolver_for(&self, source: &ItemSource) -> Option<&dyn SourceResolver> {
        match source {
            ItemSource::File { handle } if handle.is_document() => Some(&self.local),
            ItemSource::File { .. } => None,
            ItemSource::Link { detected_type, .. } => match detected_type {
                DetectedType::VideoEmbed => Some(&self.video),
                DetectedType::CloudDocument => Some(&self.document),
                DetectedType::CloudFolder => Some(&self.folder),
                DetectedType::GenericDocument | DetectedType::GenericLink => None,
            },
        }
    }

    /// Resolve one item without touching the ledger
    pub async fn resolve(&self, request: &ResolveRequest) -> Resolution {
        match self.resolver_for(&request.source) {
            Some(resolver) => resolver.resolve(request).await,
            None => Resolution::default(),
        }
    }

    /// Spawn one resolution task; its result is applied to `ledger`
    pub fn spawn(self: &Arc<Self>, ledger: ItemLedger, ticket: ResolutionTicket) -> JoinHandle<()> {
        let resolver = Arc::clone(self);
        tokio::spawn(async move {
            let ResolutionTicket { request, cancel } = ticket;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(item_id = %request.item_id, "Resolution cancelled");
                }
                resolution = resolver.resolve(&request) => {
                    ledger
                        .apply_resolution(request.item_id, request.generation, resolution)
                        .await;
                }
            }
        })
    }

    pub fn spawn_all(
        self: &Arc<Self>,
        ledger: &ItemLedger,
        tickets: Vec<ResolutionTicket>,
    ) -> Vec<JoinHandle<()>> {
        tickets
            .into_iter()
            .map(|ticket| self.spawn(ledger.clone(), ticket))
            .collect()
    }
}
