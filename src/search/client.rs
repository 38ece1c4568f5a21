//! OpenSearch-backed [`SearchIndex`]

use std::time::Duration;

use async_trait::async_trait;
use opensearch::{
    auth::Credentials,
    http::{
        request::JsonBody,
        response::Response,
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
    indices::{IndicesCreateParts, IndicesExistsParts},
    BulkParts, OpenSearch, SearchParts,
};
use serde_json::{json, Value};
use url::Url;

use super::{index_mapping, BulkResponse, SearchError, SearchHits, SearchIndex, SearchResult};
use crate::config::SearchConfig;

/// Search index client for a single OpenSearch node
pub struct OpenSearchIndex {
    client: OpenSearch,
    index: String,
}

impl OpenSearchIndex {
    /// Build a client from configuration
    pub fn new(config: &SearchConfig) -> SearchResult<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| SearchError::Config(format!("invalid OpenSearch URL {}: {e}", config.url)))?;

        let conn_pool = SingleNodeConnectionPool::new(url);
        let mut builder = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(Duration::from_secs(config.request_timeout_secs));

        if let Some(username) = &config.username {
            let password = config.password.clone().unwrap_or_default();
            builder = builder.auth(Credentials::Basic(username.clone(), password));
        }

        let transport = builder
            .build()
            .map_err(|e| SearchError::Config(format!("failed to build transport: {e}")))?;

        Ok(Self {
            client: OpenSearch::new(transport),
            index: config.index.clone(),
        })
    }

    async fn check_status(response: Response) -> SearchResult<Response> {
        let status = response.status_code();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(SearchError::status(status.as_u16(), body))
    }
}

#[async_trait]
impl SearchIndex for OpenSearchIndex {
    fn index_name(&self) -> &str {
        &self.index
    }

    async fn ping(&self) -> SearchResult<()> {
        let response = self.client.ping().send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn ensure_index(&self) -> SearchResult<()> {
        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[self.index.as_str()]))
            .send()
            .await?;

        if exists.status_code().is_success() {
            tracing::debug!(index = %self.index, "Index already exists");
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&self.index))
            .body(index_mapping())
            .send()
            .await?;

        // Another replica may have created it between the two calls
        if response.status_code().as_u16() == 400 {
            let body = response.text().await.unwrap_or_default();
            if body.contains("resource_already_exists_exception") {
                return Ok(());
            }
            return Err(SearchError::status(400, body));
        }

        Self::check_status(response).await?;
        tracing::info!(index = %self.index, "Created index");
        Ok(())
    }

    async fn bulk(&self, documents: Vec<Value>) -> SearchResult<BulkResponse> {
        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(documents.len() * 2);
        for document in documents {
            body.push(json!({ "index": {} }).into());
            body.push(document.into());
        }

        let response = self
            .client
            .bulk(BulkParts::Index(&self.index))
            .body(body)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        response
            .json::<BulkResponse>()
            .await
            .map_err(|e| SearchError::Response(e.to_string()))
    }

    async fn search(&self, query: Value) -> SearchResult<SearchHits> {
        let response = self
            .client
            .search(SearchParts::Index(&[self.index.as_str()]))
            .body(query)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| SearchError::Response(e.to_string()))?;

        SearchHits::from_response(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> SearchConfig {
        SearchConfig {
            url: url.to_string(),
            ..SearchConfig::default()
        }
    }

    #[test]
    fn test_client_creation() {
        let index = OpenSearchIndex::new(&config("http://localhost:9200")).unwrap();
        assert_eq!(index.index_name(), "youtube-videos");
    }

    #[test]
    fn test_client_rejects_bad_url() {
        let result = OpenSearchIndex::new(&config("not a url"));
        assert!(matches!(result, Err(SearchError::Config(_))));
    }

    #[test]
    fn test_client_with_credentials() {
        let mut cfg = config("https://search.internal:9200");
        cfg.username = Some("indexer".to_string());
        cfg.password = Some("secret".to_string());
        assert!(OpenSearchIndex::new(&cfg).is_ok());
    }
}
