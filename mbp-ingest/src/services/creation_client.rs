//! Creation endpoint client
//!
//! Submits one item to `POST {base}/materials`. Link items are sent as JSON;
//! file items as multipart with a `metadata` JSON part, the streamed `file`
//! part and an optional `preview` PNG part.

use crate::models::{BatchDefaults, ItemSource, ItemView, PreviewView, ThumbnailBlob};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

const MAX_ERROR_BODY_CHARS: usize = 500;

/// Creation failures, recorded as the item's error message
#[derive(Debug, Error)]
pub enum CreationError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("{message} (HTTP {status})")]
    Rejected { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Cannot read upload: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for CreationError {
    fn from(e: reqwest::Error) -> Self {
        CreationError::Network(e.to_string())
    }
}

/// Where the material's content lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Url(String),
    File {
        path: PathBuf,
        file_name: String,
        mime_type: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewRef {
    Remote(String),
    Local(PathBuf),
}

/// Everything needed to create one material
#[derive(Debug, Clone)]
pub struct CreationRequest {
    pub index: usize,
    pub item_id: Uuid,
    pub title: String,
    pub source_type: String,
    pub locator: Locator,
    pub preview: Option<PreviewRef>,
    pub page_count: Option<u32>,
    pub defaults: BatchDefaults,
}

impl CreationRequest {
    pub fn from_view(view: &ItemView, defaults: &BatchDefaults) -> Self {
        let locator = match &view.source {
            ItemSource::Link { url, .. } => Locator::Url(url.clone()),
            ItemSource::File { handle } => Locator::File {
                path: handle.path.clone(),
                file_name: handle.file_name.clone(),
                mime_type: handle.mime_type.clone(),
            },
        };
        let preview = view.preview.as_ref().map(|p| match p {
            PreviewView::Remote { url } => PreviewRef::Remote(url.clone()),
            PreviewView::Local { path, .. } => PreviewRef::Local(path.clone()),
        });

        Self {
            index: view.index,
            item_id: view.id,
            title: view.title.clone(),
            source_type: view.source.source_type_label().to_string(),
            locator,
            preview,
            page_count: view.page_count,
            defaults: defaults.clone(),
        }
    }

    /// JSON body for links, `metadata` part for files
    pub fn metadata(&self) -> CreationMetadata<'_> {
        let url = match &self.locator {
            Locator::Url(url) => Some(url.as_str()),
            Locator::File { .. } => None,
        };
        let preview_url = match &self.preview {
            Some(PreviewRef::Remote(url)) => Some(url.as_str()),
            _ => None,
        };

        CreationMetadata {
            title: &self.title,
            source_type: &self.source_type,
            url,
            preview_url,
            page_count: self.page_count,
            folder_ids: &self.defaults.folder_ids,
            collection_ids: &self.defaults.collection_ids,
            course_ids: &self.defaults.course_ids,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationMetadata<'a> {
    pub title: &'a str,
    pub source_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    pub folder_ids: &'a [String],
    pub collection_ids: &'a [String],
    pub course_ids: &'a [String],
}

/// The single-item creation operation
#[async_trait]
pub trait CreationClient: Send + Sync {
    /// Create one material, returning its id
    async fn create(&self, request: &CreationRequest) -> Result<String, CreationError>;
}

/// HTTP implementation against the materials service
pub struct HttpCreationClient {
    client: Client,
    endpoint: String,
    api_token: Option<String>,
}

impl HttpCreationClient {
    pub fn new(
        base_url: &str,
        api_token: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, CreationError> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(mbp_common::config::get_user_agent());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| CreationError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/materials", base_url.trim_end_matches('/')),
            api_token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn multipart_form(&self, request: &CreationRequest) -> Result<Form, CreationError> {
        let Locator::File {
            path,
            file_name,
            mime_type,
        } = &request.locator
        else {
            return Err(CreationError::InvalidResponse(
                "multipart body requires a file locator".to_string(),
            ));
        };

        let metadata = serde_json::to_string(&request.metadata())
            .map_err(|e| CreationError::InvalidResponse(e.to_string()))?;
        let metadata_part = Part::text(metadata).mime_str("application/json")?;

        let file = tokio::fs::File::open(path).await?;
        let length = file.metadata().await?.len();
        let file_part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), length)
            .file_name(file_name.clone())
            .mime_str(mime_type.as_deref().unwrap_or("application/octet-stream"))?;

        let mut form = Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part);

        if let Some(PreviewRef::Local(preview_path)) = &request.preview {
            let bytes = tokio::fs::read(preview_path).await?;
            let preview_part = Part::bytes(bytes)
                .file_name("preview.png")
                .mime_str(ThumbnailBlob::MIME_TYPE)?;
            form = form.part("preview", preview_part);
        }

        Ok(form)
    }
}

#[async_trait]
impl CreationClient for HttpCreationClient {
    async fn create(&self, request: &CreationRequest) -> Result<String, CreationError> {
        let mut builder = self.client.post(&self.endpoint);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }

        builder = match &request.locator {
            Locator::Url(_) => builder.json(&request.metadata()),
            Locator::File { .. } => builder.multipart(self.multipart_form(request).await?),
        };

        tracing::debug!(
            item_id = %request.item_id,
            source_type = %request.source_type,
            "Submitting material"
        );
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CreationError::Rejected {
                status: status.as_u16(),
                message: error_message(status.as_u16(), &body),
            });
        }

        parse_created_id(&body)
    }
}

/// Pull the created id out of `{"id": ...}`
fn parse_created_id(body: &str) -> Result<String, CreationError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| CreationError::InvalidResponse(format!("body is not JSON: {}", e)))?;

    match value.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(CreationError::InvalidResponse(
            "response has no material id".to_string(),
        )),
    }
}

/// Best error text from a failed response
fn error_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let message = value
            .pointer("/error/message")
            .or_else(|| value.get("message"))
            .or_else(|| value.get("error"))
            .and_then(Value::as_str);
        if let Some(message) = message.filter(|m| !m.trim().is_empty()) {
            return message.trim().to_string();
        }
    }

    let text = body.trim();
    if text.is_empty() {
        format!("Request failed with status {}", status)
    } else {
        text.chars().take(MAX_ERROR_BODY_CHARS).collect()
    }
}
