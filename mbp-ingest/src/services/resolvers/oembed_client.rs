//! oEmbed client for video titles

use super::ResolveError;
use reqwest::Client;
use serde::Deserialize;

/// Subset of the oEmbed response used here
#[derive(Debug, Clone, Deserialize)]
pub struct OEmbedResponse {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

pub struct OEmbedClient {
    client: Client,
    endpoint: String,
}

impl OEmbedClient {
    pub fn new(client: Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }

    pub async fn fetch(&self, url: &str) -> Result<OEmbedResponse, ResolveError> {
        tracing::debug!(url = %url, "Querying oEmbed");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("url", url), ("format", "json")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Api(
                status.as_u16(),
                format!("oEmbed lookup failed for {}", url),
            ));
        }

        Ok(response.json().await?)
    }
}
