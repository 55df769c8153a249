//! Request/response transport for the remote store

use std::time::Duration;

use async_trait::async_trait;
use menuboard_common::config::PushMethod;

use super::RemoteError;

const USER_AGENT: &str = concat!("menuboard-sync/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
    Put,
}

impl From<PushMethod> for RequestMethod {
    fn from(method: PushMethod) -> Self {
        match method {
            PushMethod::Post => RequestMethod::Post,
            PushMethod::Put => RequestMethod::Put,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub method: RequestMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: String,
}

impl RemoteResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetch-style request/response contract with the backend
///
/// Implementations report only transport failures as errors; any HTTP
/// status comes back as a [`RemoteResponse`].
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn send(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteError>;
}

/// HTTP transport over reqwest
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RemoteTransport for HttpTransport {
    async fn send(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        let method = match request.method {
            RequestMethod::Get => reqwest::Method::GET,
            RequestMethod::Post => reqwest::Method::POST,
            RequestMethod::Put => reqwest::Method::PUT,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        tracing::debug!(
            status = status,
            bytes = body.len(),
            "Remote response received"
        );
        Ok(RemoteResponse { status, body })
    }
}
