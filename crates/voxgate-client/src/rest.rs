//! One-shot authenticated requests against the messaging service's REST API.
//!
//! The session consumes this as a boundary: endpoint resolution, chat
//! messages, and media stream start/stop are single request/response
//! exchanges, independent of the primary connection.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use voxgate_core::error::{VoxError, VoxResult};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v9";

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Authenticated REST client for one credential.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    api_base: String,
}

impl RestClient {
    pub fn new(api_base: &str, token: &str) -> Self {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(token) {
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .unwrap_or_default();

        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Issue one authenticated request and parse the JSON body.
    ///
    /// Transport failures map to `Transport`; an application-level rejection
    /// maps to `RequestFailed` carrying the server-provided message.
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> VoxResult<Value> {
        let url = format!("{}{}", self.api_base, path);
        let mut req = self.http.request(method, &url);
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| VoxError::Transport(format!("request error: {e}")))?;

        let status = resp.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        let payload: Value = resp.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let reason = payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(VoxError::RequestFailed(format!(
                "HTTP {}: {reason}",
                status.as_u16()
            )));
        }
        Ok(payload)
    }

    /// Resolve the gateway endpoint URL.
    pub async fn resolve_endpoint(&self) -> VoxResult<String> {
        let payload = self
            .request(Method::GET, "/gateway", None)
            .await
            .map_err(|_| VoxError::EndpointUnavailable)?;
        payload
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(VoxError::EndpointUnavailable)
    }

    /// Send a chat message to a channel.
    pub async fn send_message(&self, channel_id: &str, text: &str) -> VoxResult<()> {
        let body = json!({ "content": text, "tts": false });
        self.request(
            Method::POST,
            &format!("/channels/{channel_id}/messages"),
            Some(body),
        )
        .await?;
        Ok(())
    }

    /// Start a media stream in a guild voice channel; returns the stream key.
    pub async fn create_stream(&self, guild_id: &str, channel_id: &str) -> VoxResult<String> {
        let body = json!({
            "type": "guild",
            "guild_id": guild_id,
            "channel_id": channel_id,
            "preferred_region": Value::Null,
        });
        let payload = self.request(Method::POST, "/streams", Some(body)).await?;
        payload
            .get("stream_key")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| VoxError::RequestFailed("response carried no stream key".into()))
    }

    /// Stop a media stream by key.
    pub async fn delete_stream(&self, stream_key: &str) -> VoxResult<()> {
        self.request(Method::DELETE, &format!("/streams/{stream_key}"), None)
            .await?;
        Ok(())
    }
}
