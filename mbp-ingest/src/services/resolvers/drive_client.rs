//! Drive API client
//!
//! File name lookups and folder listings against the Drive v3 REST API, plus
//! derivation of the public thumbnail URL for a file id. All API calls share
//! one token-bucket rate limiter.

use super::{ResolveError, ResolverConfig};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Listing pages followed before giving up on a very large folder
const MAX_LIST_PAGES: usize = 10;

/// One entry of a folder listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "mimeType", default)]
    pub mime_type: String,
    #[serde(rename = "thumbnailLink", default)]
    pub thumbnail_link: Option<String>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

#[derive(Debug, Deserialize)]
struct FileMetadata {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

/// Rate-limited Drive client
pub struct DriveClient {
    client: Client,
    api_base: String,
    web_base: String,
    api_key: Option<String>,
    thumbnail_width: u32,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl DriveClient {
    pub fn new(client: Client, config: &ResolverConfig) -> Self {
        let per_second = NonZeroU32::new(config.drive_requests_per_second).unwrap_or(NonZeroU32::MIN);

        Self {
            client,
            api_base: config.drive_api_base.clone(),
            web_base: config.drive_web_base.clone(),
            api_key: config.drive_api_key.clone(),
            thumbnail_width: config.thumbnail_width,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Public thumbnail endpoint for a file id; needs no API call
    pub fn thumbnail_url(&self, file_id: &str) -> String {
        format!(
            "{}/thumbnail?id={}&sz=w{}",
            self.web_base,
            urlencoding::encode(file_id),
            self.thumbnail_width
        )
    }

    /// Display name of a file or folder
    pub async fn file_name(&self, file_id: &str) -> Result<String, ResolveError> {
        let api_key = self.api_key()?;
        self.rate_limiter.until_ready().await;

        let url = format!("{}/files/{}", self.api_base, urlencoding::encode(file_id));
        tracing::debug!(file_id = %file_id, "Querying Drive file name");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("fields", "name"),
                ("supportsAllDrives", "true"),
                ("key", api_key),
            ])
            .send()
            .await?;

        let metadata: FileMetadata = Self::check(response).await?.json().await?;
        Ok(metadata.name)
    }

    /// Non-trashed children, folders first then by name
    pub async fn list_children(&self, folder_id: &str) -> Result<Vec<DriveFile>, ResolveError> {
        let api_key = self.api_key()?;
        let query = format!("'{}' in parents and trashed=false", folder_id.replace('\'', "\\'"));
        let url = format!("{}/files", self.api_base);

        let mut children = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            self.rate_limiter.until_ready().await;
            tracing::debug!(folder_id = %folder_id, "Listing Drive folder");

            let mut request = self.client.get(&url).query(&[
                ("q", query.as_str()),
                ("orderBy", "folder,name"),
                ("fields", "nextPageToken,files(id,name,mimeType,thumbnailLink)"),
                ("pageSize", "100"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
                ("key", api_key),
            ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let list: FileList = Self::check(request.send().await?).await?.json().await?;
            children.extend(list.files);

            match list.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(children),
            }
        }

        tracing::warn!(folder_id = %folder_id, entries = children.len(), "Drive listing truncated");
        Ok(children)
    }

    fn api_key(&self) -> Result<&str, ResolveError> {
        self.api_key
            .as_deref()
            .ok_or(ResolveError::NotConfigured("Drive API key"))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ResolveError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ResolveError::Api(status.as_u16(), body.chars().take(200).collect()))
    }
}
