//! HTTP client for the chat notification collaborator.

use async_trait::async_trait;
use minuteflow_common::resilience::CallExecutor;
use minuteflow_core::integrations::ports::ApprovalNotifier;
use minuteflow_domain::constants::DEP_CHAT;
use minuteflow_domain::{
    ApprovalRequestPayload, DependencyConfig, MinuteflowError, Result, RetryPolicy,
};
use serde_json::json;
use tracing::debug;

use super::{build_executor, build_http_client, post_with_resilience};

/// Approval notifier backed by an HTTP chat API.
pub struct HttpApprovalNotifier {
    client: reqwest::Client,
    base_url: String,
    executor: CallExecutor,
}

impl HttpApprovalNotifier {
    pub fn new(config: &DependencyConfig, retry: &RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            executor: build_executor(DEP_CHAT, config, retry)?,
        })
    }
}

#[async_trait]
impl ApprovalNotifier for HttpApprovalNotifier {
    async fn post_approval(&self, channel: &str, request: &ApprovalRequestPayload) -> Result<()> {
        let url = format!("{}/approvals", self.base_url);
        let body = json!({
            "channel": channel,
            "approval": request,
        });

        let response = post_with_resilience(&self.client, &self.executor, url, body).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MinuteflowError::InvalidInput(format!(
                "approval request rejected: HTTP {status}: {body}"
            )));
        }

        debug!(channel, entity_id = %request.entity_id, "approval request posted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy { max_attempts: 2, base_delay_ms: 5, max_delay_ms: 20 }
    }

    fn sample_request() -> ApprovalRequestPayload {
        ApprovalRequestPayload {
            tenant_id: "tenant-1".to_string(),
            entity_id: "meeting-1".to_string(),
            doc_id: "doc-1".to_string(),
            routed_client: Some("Acme".to_string()),
            routed_project: Some("Rollout".to_string()),
            confidence: Some(0.82),
        }
    }

    #[tokio::test]
    async fn post_approval_sends_channel_and_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/approvals"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = DependencyConfig {
            base_url: server.uri(),
            rate_limit_points: 100,
            rate_limit_window_secs: 60,
            ..Default::default()
        };
        let notifier = HttpApprovalNotifier::new(&config, &fast_retry()).unwrap();
        notifier.post_approval("#alerts", &sample_request()).await.expect("posted");

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = requests[0].body_json().unwrap();
        assert_eq!(body["channel"], "#alerts");
        assert_eq!(body["approval"]["entityId"], "meeting-1");
        assert_eq!(body["approval"]["routedClient"], "Acme");
    }

    #[tokio::test]
    async fn rate_limit_exhaustion_is_a_transient_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/approvals"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let config = DependencyConfig {
            base_url: server.uri(),
            rate_limit_points: 1,
            rate_limit_window_secs: 3_600,
            ..Default::default()
        };
        let retry = RetryPolicy { max_attempts: 1, base_delay_ms: 5, max_delay_ms: 20 };
        let notifier = HttpApprovalNotifier::new(&config, &retry).unwrap();

        notifier.post_approval("#alerts", &sample_request()).await.expect("first call admitted");

        let err = notifier.post_approval("#alerts", &sample_request()).await.unwrap_err();
        match err {
            MinuteflowError::Network(message) => assert!(message.contains("rate limit")),
            other => panic!("expected Network error, got {other:?}"),
        }

        // The denied call never reached the server
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn rejected_approvals_are_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/approvals"))
            .respond_with(ResponseTemplate::new(403).set_body_string("channel is archived"))
            .expect(1)
            .mount(&server)
            .await;

        let config = DependencyConfig {
            base_url: server.uri(),
            rate_limit_points: 100,
            rate_limit_window_secs: 60,
            ..Default::default()
        };
        let notifier = HttpApprovalNotifier::new(&config, &fast_retry()).unwrap();

        let err = notifier.post_approval("#alerts", &sample_request()).await.unwrap_err();
        assert!(matches!(err, MinuteflowError::InvalidInput(message) if message.contains("403")));
    }
}
