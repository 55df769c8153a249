//! Remote sync client
//!
//! Fetches and pushes the whole document against an opaque HTTP endpoint.
//! Every request is bounded by the configured timeout; all failures are
//! soft: the `fetch_remote`/`push_remote` wrappers log and return `None`.

pub mod envelope;
pub mod transport;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use menuboard_common::config::RemoteSettings;
use menuboard_common::{normalize, RawDocument, RestaurantCollection};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

pub use transport::{HttpTransport, RemoteRequest, RemoteResponse, RemoteTransport, RequestMethod};

/// Remote client errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteError {
    #[error("Invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Remote returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed payload: {0}")]
    Malformed(String),
}

pub struct RemoteSyncClient {
    settings: RemoteSettings,
    transport: Arc<dyn RemoteTransport>,
}

impl RemoteSyncClient {
    pub fn new(settings: RemoteSettings, transport: Arc<dyn RemoteTransport>) -> Self {
        Self {
            settings,
            transport,
        }
    }

    pub fn settings(&self) -> &RemoteSettings {
        &self.settings
    }

    /// Fetch the remote document, `None` on any failure
    pub async fn fetch_remote(&self) -> Option<RestaurantCollection> {
        match self.try_fetch().await {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!(error = %e, "Unable to fetch menu data from remote");
                None
            }
        }
    }

    /// Push a document, returning the remote's answer, `None` on any failure
    pub async fn push_remote(&self, doc: &RestaurantCollection) -> Option<RestaurantCollection> {
        match self.try_push(doc).await {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!(error = %e, "Unable to push menu data to remote");
                None
            }
        }
    }

    pub async fn try_fetch(&self) -> Result<RestaurantCollection, RemoteError> {
        let request = RemoteRequest {
            method: RequestMethod::Get,
            url: self.fetch_url()?,
            headers: Vec::new(),
            body: None,
        };
        self.execute(request).await
    }

    pub async fn try_push(
        &self,
        doc: &RestaurantCollection,
    ) -> Result<RestaurantCollection, RemoteError> {
        let mut payload = json!({
            "action": self.settings.set_action,
            "menu": doc,
        });
        if let Some(token) = &self.settings.token {
            payload["token"] = json!(token);
        }

        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        headers.extend(
            self.settings
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );

        let request = RemoteRequest {
            method: self.settings.method.into(),
            url: self.endpoint()?.to_string(),
            headers,
            body: Some(payload.to_string()),
        };
        self.execute(request).await
    }

    /// `endpoint?action=<getAction>&token=<token>`
    pub fn fetch_url(&self) -> Result<String, RemoteError> {
        let mut url = self.endpoint()?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("action", &self.settings.get_action);
            if let Some(token) = &self.settings.token {
                query.append_pair("token", token);
            }
        }
        Ok(url.to_string())
    }

    fn endpoint(&self) -> Result<reqwest::Url, RemoteError> {
        reqwest::Url::parse(&self.settings.endpoint)
            .map_err(|_| RemoteError::InvalidEndpoint(self.settings.endpoint.clone()))
    }

    async fn execute(&self, request: RemoteRequest) -> Result<RestaurantCollection, RemoteError> {
        debug!(method = ?request.method, url = %request.url, "Remote request");

        let response = tokio::time::timeout(self.settings.timeout, self.transport.send(request))
            .await
            .map_err(|_| RemoteError::Timeout(self.settings.timeout.as_millis() as u64))??;

        if !response.is_success() {
            return Err(RemoteError::Status {
                status: response.status,
                body: response.body,
            });
        }

        let payload = envelope::decode_body(&response.body)?;
        if RawDocument::classify(&payload).is_empty() {
            return Err(RemoteError::Malformed(
                "payload does not contain menu data".to_string(),
            ));
        }
        Ok(normalize(&payload))
    }
}

/// Health of the remote link, independent of local document state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStatus {
    pub enabled: bool,
    pub in_flight: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

impl RemoteStatus {
    pub fn record_success(&mut self) {
        self.last_success = Some(Utc::now());
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.last_failure = Some(Utc::now());
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Transport answering every request with one canned response
    struct Canned {
        response: RemoteResponse,
        seen: Mutex<Vec<RemoteRequest>>,
    }

    impl Canned {
        fn new(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                response: RemoteResponse {
                    status,
                    body: body.to_string(),
                },
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RemoteTransport for Canned {
        async fn send(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteError> {
            self.seen.lock().unwrap().push(request);
            Ok(self.response.clone())
        }
    }

    struct Stalled;

    #[async_trait]
    impl RemoteTransport for Stalled {
        async fn send(&self, _request: RemoteRequest) -> Result<RemoteResponse, RemoteError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(RemoteError::Transport("unreachable".to_string()))
        }
    }

    fn settings() -> RemoteSettings {
        RemoteSettings::new("https://example.com/exec?deployment=1").with_token("s3cret")
    }

    #[test]
    fn test_fetch_url_keeps_existing_query() {
        let client = RemoteSyncClient::new(settings(), Canned::new(200, "{}"));
        assert_eq!(
            client.fetch_url().unwrap(),
            "https://example.com/exec?deployment=1&action=getMenu&token=s3cret"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        let client =
            RemoteSyncClient::new(RemoteSettings::new("not a url"), Canned::new(200, "{}"));
        assert_eq!(
            client.fetch_url(),
            Err(RemoteError::InvalidEndpoint("not a url".to_string()))
        );
    }

    #[tokio::test]
    async fn test_fetch_normalizes_legacy_payload() {
        let transport = Canned::new(200, r#")]}'{"data":{"title":"Remote","sections":[]}}"#);
        let client = RemoteSyncClient::new(settings(), transport.clone());

        let doc = client.fetch_remote().await.unwrap();
        assert_eq!(doc.restaurants[0].boards[0].menu.title, "Remote");
        assert_eq!(transport.seen.lock().unwrap()[0].method, RequestMethod::Get);
    }

    #[tokio::test]
    async fn test_push_body_shape() {
        let transport = Canned::new(200, r#"{"status":"ok"}"#);
        let client = RemoteSyncClient::new(settings(), transport.clone());
        let doc = menuboard_common::defaults::default_collection();

        // An acknowledgement without a document is not applied
        assert_eq!(
            client.try_push(&doc).await,
            Err(RemoteError::Malformed(
                "payload does not contain menu data".to_string()
            ))
        );

        let seen = transport.seen.lock().unwrap();
        let request = &seen[0];
        assert_eq!(request.method, RequestMethod::Post);
        assert_eq!(request.url, "https://example.com/exec?deployment=1");
        assert!(request
            .headers
            .contains(&("Content-Type".to_string(), "application/json".to_string())));
        let body: serde_json::Value =
            serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["action"], "setMenu");
        assert_eq!(body["token"], "s3cret");
        assert_eq!(body["menu"], serde_json::to_value(&doc).unwrap());
    }

    #[tokio::test]
    async fn test_status_error_is_soft() {
        let client = RemoteSyncClient::new(settings(), Canned::new(503, "busy"));
        assert_eq!(
            client.try_fetch().await,
            Err(RemoteError::Status {
                status: 503,
                body: "busy".to_string()
            })
        );
        assert!(client.fetch_remote().await.is_none());
    }

    #[tokio::test]
    async fn test_timeout_resolves_to_none() {
        let client = RemoteSyncClient::new(
            settings().with_timeout(Duration::from_millis(50)),
            Arc::new(Stalled),
        );
        assert_eq!(client.try_fetch().await, Err(RemoteError::Timeout(50)));
        assert!(client.fetch_remote().await.is_none());
    }

    #[test]
    fn test_remote_status_counters() {
        let mut status = RemoteStatus::default();
        status.record_failure();
        status.record_failure();
        assert_eq!(status.consecutive_failures, 2);
        status.record_success();
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.last_success.is_some() && status.last_failure.is_some());
    }
}
