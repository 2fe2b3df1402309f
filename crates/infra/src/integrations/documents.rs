//! HTTP client for the external document storage collaborator.

use async_trait::async_trait;
use minuteflow_common::resilience::CallExecutor;
use minuteflow_core::integrations::ports::{CreatedDocument, DocumentStore};
use minuteflow_domain::constants::DEP_DOCUMENTS;
use minuteflow_domain::{
    DependencyConfig, DocumentCreatePayload, MinuteflowError, Result, RetryPolicy,
};
use serde_json::json;
use tracing::debug;

use super::{build_executor, build_http_client, post_with_resilience};

/// Document store backed by an HTTP API.
pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: String,
    executor: CallExecutor,
}

impl HttpDocumentStore {
    pub fn new(config: &DependencyConfig, retry: &RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            executor: build_executor(DEP_DOCUMENTS, config, retry)?,
        })
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn create_document(&self, request: &DocumentCreatePayload) -> Result<CreatedDocument> {
        let url = format!("{}/documents", self.base_url);
        let body = serde_json::to_value(request)?;

        let response = post_with_resilience(&self.client, &self.executor, url, body).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MinuteflowError::InvalidInput(format!(
                "document create rejected: HTTP {status}: {body}"
            )));
        }

        let created = response.json::<CreatedDocument>().await.map_err(|err| {
            MinuteflowError::InvalidInput(format!("malformed document response: {err}"))
        })?;
        debug!(document_id = %created.document_id, "document created downstream");
        Ok(created)
    }

    async fn move_document(&self, document_id: &str, folder_id: &str) -> Result<()> {
        let url = format!("{}/documents/{document_id}/move", self.base_url);
        let body = json!({ "folderId": folder_id });

        let response = post_with_resilience(&self.client, &self.executor, url, body).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MinuteflowError::InvalidInput(format!(
                "document move rejected: HTTP {status}: {body}"
            )));
        }

        debug!(document_id, folder_id, "document moved downstream");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy { max_attempts: 3, base_delay_ms: 5, max_delay_ms: 20 }
    }

    fn config_for(server: &MockServer) -> DependencyConfig {
        DependencyConfig {
            base_url: server.uri(),
            rate_limit_points: 100,
            rate_limit_window_secs: 60,
            timeout_ms: 2_000,
            ..Default::default()
        }
    }

    fn sample_payload() -> DocumentCreatePayload {
        DocumentCreatePayload {
            tenant_id: "tenant-1".to_string(),
            title: "Weekly sync".to_string(),
            account: "Acme".to_string(),
            project: "Rollout".to_string(),
            date: "20260807".to_string(),
            content: "transcript".to_string(),
        }
    }

    fn created_body() -> serde_json::Value {
        serde_json::json!({
            "documentId": "doc-1",
            "folderId": "folder-1",
            "link": "https://docs.example/doc-1"
        })
    }

    #[tokio::test]
    async fn create_document_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/documents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(created_body()))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpDocumentStore::new(&config_for(&server), &fast_retry()).unwrap();
        let created = store.create_document(&sample_payload()).await.expect("created");

        assert_eq!(created.document_id, "doc-1");
        assert_eq!(created.folder_id, "folder-1");
    }

    #[tokio::test]
    async fn create_document_retries_server_errors() {
        let server = MockServer::start().await;
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        Mock::given(method("POST"))
            .and(path("/documents"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                if attempts_clone.fetch_add(1, Ordering::SeqCst) < 2 {
                    ResponseTemplate::new(500)
                } else {
                    ResponseTemplate::new(200).set_body_json(created_body())
                }
            })
            .expect(3)
            .mount(&server)
            .await;

        let store = HttpDocumentStore::new(&config_for(&server), &fast_retry()).unwrap();
        let created = store.create_document(&sample_payload()).await.expect("created");

        assert_eq!(created.document_id, "doc-1");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_permanent_and_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/documents"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid title"))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpDocumentStore::new(&config_for(&server), &fast_retry()).unwrap();
        let err = store.create_document(&sample_payload()).await.unwrap_err();

        match err {
            MinuteflowError::InvalidInput(message) => {
                assert!(message.contains("422"));
                assert!(message.contains("invalid title"));
            }
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn persistent_failures_trip_the_breaker() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/documents"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let config = DependencyConfig {
            failure_threshold: 2,
            recovery_time_ms: 60_000,
            ..config_for(&server)
        };
        let retry = RetryPolicy { max_attempts: 1, base_delay_ms: 5, max_delay_ms: 20 };
        let store = HttpDocumentStore::new(&config, &retry).unwrap();

        // Two failing calls trip the breaker
        for _ in 0..2 {
            let err = store.create_document(&sample_payload()).await.unwrap_err();
            assert!(matches!(err, MinuteflowError::Network(_)));
        }

        // The third never reaches the network
        let err = store.create_document(&sample_payload()).await.unwrap_err();
        assert!(matches!(err, MinuteflowError::CircuitOpen(dep) if dep == DEP_DOCUMENTS));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
    }

    #[tokio::test]
    async fn move_document_hits_the_move_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/documents/doc-9/move"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpDocumentStore::new(&config_for(&server), &fast_retry()).unwrap();
        store.move_document("doc-9", "folder-2").await.expect("moved");

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = requests[0].body_json().unwrap();
        assert_eq!(body["folderId"], "folder-2");
    }
}
