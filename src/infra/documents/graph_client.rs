use crate::core::documents::{DocumentError, DocumentStore, DriveItem};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

/// Microsoft Graph drive search and content download.
pub struct GraphDocumentStore {
    client: Client,
    base_url: String,
    /// Drive holding the notes. Downloads fall back to the user's own drive when unset.
    drive_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<DriveItem>,
}

impl GraphDocumentStore {
    pub fn new(
        base_url: String,
        drive_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            drive_id,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, DocumentError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| DocumentError::Api(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| DocumentError::Api(format!("Invalid base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn search_url(&self, query: &str) -> Result<Url, DocumentError> {
        let search = format!("search(q='{}')", escape_query(query));
        let mut url = self.url(&["me", "drive", "root", &search])?;
        url.query_pairs_mut()
            .append_pair("$filter", "endswith(name,'.docx')")
            .append_pair("$select", "name,id,webUrl");
        Ok(url)
    }

    fn content_url(&self, item_id: &str) -> Result<Url, DocumentError> {
        match &self.drive_id {
            Some(drive_id) => self.url(&["drives", drive_id.as_str(), "items", item_id, "content"]),
            None => self.url(&["me", "drive", "items", item_id, "content"]),
        }
    }
}

/// Single quotes delimit the OData string literal, so they are doubled.
fn escape_query(query: &str) -> String {
    query.replace('\'', "''")
}

#[async_trait]
impl DocumentStore for GraphDocumentStore {
    async fn search(&self, access_token: &str, query: &str) -> Result<Vec<DriveItem>, DocumentError> {
        let response = self
            .client
            .get(self.search_url(query)?)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| DocumentError::Api(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Graph search failed");
            return Err(DocumentError::Api(format!(
                "Graph search error: {} - {}",
                status, text
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| DocumentError::Api(e.to_string()))?;
        Ok(body.value)
    }

    async fn download(&self, access_token: &str, item_id: &str) -> Result<Vec<u8>, DocumentError> {
        let response = self
            .client
            .get(self.content_url(item_id)?)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| DocumentError::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DocumentError::Download {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DocumentError::Api(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
