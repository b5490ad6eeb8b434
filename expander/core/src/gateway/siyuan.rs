//! SiYuan Kernel Gateway
//!
//! Gateway implementation for the SiYuan kernel HTTP API.
//!
//! # Kernel API
//!
//! All calls are `POST` with a JSON body of `{"id": "<block id>"}`:
//! - `/api/attr/getBlockAttrs` - block attributes (`fold == "1"` when folded)
//! - `/api/block/foldBlock` - collapse a block
//! - `/api/block/unfoldBlock` - expand a block
//!
//! Responses are wrapped in an envelope `{"code": 0, "msg": "", "data": ...}`
//! where a non-zero code means the kernel refused the request.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::traits::{Ack, AttributeGateway, CommandGateway};
use crate::block::{BlockId, FoldState};
use crate::config::SiyuanConfig;
use crate::error::GatewayError;

/// Block attribute query endpoint
pub const GET_BLOCK_ATTRS: &str = "/api/attr/getBlockAttrs";
/// Fold command endpoint
pub const FOLD_BLOCK: &str = "/api/block/foldBlock";
/// Unfold command endpoint
pub const UNFOLD_BLOCK: &str = "/api/block/unfoldBlock";

/// Kernel response envelope
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// SiYuan kernel client
#[derive(Clone)]
pub struct SiyuanGateway {
    /// Kernel base URL (scheme, host, port)
    base_url: String,
    /// API token, sent as `Authorization: Token <token>`
    token: Option<String>,
    /// HTTP client
    http_client: reqwest::Client,
}

impl SiyuanGateway {
    /// Create a client for the kernel at `base_url`
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Client`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, GatewayError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            http_client: builder.build().map_err(GatewayError::Client)?,
        })
    }

    /// Create from the `[siyuan]` configuration section
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Client`] if the HTTP client cannot be built.
    pub fn from_config(config: &SiyuanConfig) -> Result<Self, GatewayError> {
        Self::new(config.base_url.clone(), config.token.clone(), config.timeout)
    }

    /// Kernel base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Post `{"id": id}` to an endpoint and unwrap the response envelope
    async fn post_block(
        &self,
        endpoint: &str,
        id: &BlockId,
    ) -> Result<serde_json::Value, GatewayError> {
        let mut request = self
            .http_client
            .post(self.endpoint_url(endpoint))
            .json(&serde_json::json!({ "id": id }));

        if let Some(ref token) = self.token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("Token {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|source| GatewayError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let envelope: ApiEnvelope = response.json().await.map_err(|e| GatewayError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        if envelope.code != 0 {
            return Err(GatewayError::Rejected {
                endpoint: endpoint.to_string(),
                code: envelope.code,
                msg: envelope.msg,
            });
        }

        tracing::trace!(endpoint, block_id = %id, data = %envelope.data, "Kernel responded");
        Ok(envelope.data)
    }
}

/// Read the `fold` attribute out of a `getBlockAttrs` payload
///
/// A null payload (unknown block) reads as unfolded.
fn fold_state_from_attrs(data: &serde_json::Value) -> FoldState {
    FoldState::from_attribute(data.get("fold").and_then(serde_json::Value::as_str))
}

#[async_trait]
impl AttributeGateway for SiyuanGateway {
    async fn fold_state(&self, id: &BlockId) -> Result<FoldState, GatewayError> {
        let data = self.post_block(GET_BLOCK_ATTRS, id).await?;
        Ok(fold_state_from_attrs(&data))
    }
}

#[async_trait]
impl CommandGateway for SiyuanGateway {
    async fn fold(&self, id: &BlockId) -> Result<Ack, GatewayError> {
        self.post_block(FOLD_BLOCK, id).await.map(Ack::new)
    }

    async fn unfold(&self, id: &BlockId) -> Result<Ack, GatewayError> {
        self.post_block(UNFOLD_BLOCK, id).await.map(Ack::new)
    }
}
