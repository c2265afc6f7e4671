//! Node transport backed by alloy providers.

use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use alloy::transports::RpcError;
use futures_util::future::BoxFuture;
use futures_util::{stream, StreamExt};
use serde_json::Value;
use std::sync::Arc;

use crate::transport::{HeaderStream, RpcTransport, TransportError, TransportResult};

/// Transport over an HTTP or WebSocket JSON-RPC endpoint.
///
/// Subscriptions need a `ws://` or `wss://` endpoint. On HTTP they fail with
/// a connection error.
#[derive(Clone)]
pub struct AlloyTransport {
    provider: Arc<dyn Provider + Send + Sync>,
    /// Endpoint without path or query, safe to log (API keys live in the path).
    display_endpoint: String,
}

impl AlloyTransport {
    /// Connect to `endpoint`, picking HTTP or WebSocket by URL scheme.
    pub async fn connect(endpoint: &str) -> TransportResult<Self> {
        let url: url::Url = endpoint
            .parse()
            .map_err(|e| TransportError::Connection(format!("invalid endpoint URL: {}", e)))?;
        let display_endpoint = format!("{}://{}", url.scheme(), url.host_str().unwrap_or("?"));

        let provider: Arc<dyn Provider + Send + Sync> = match url.scheme() {
            "ws" | "wss" => {
                let provider = ProviderBuilder::new()
                    .connect_ws(WsConnect::new(endpoint))
                    .await
                    .map_err(lift)?;
                Arc::new(provider)
            }
            "http" | "https" => Arc::new(ProviderBuilder::new().connect_http(url)),
            other => {
                return Err(TransportError::Connection(format!(
                    "unsupported endpoint scheme '{}'",
                    other
                )))
            }
        };

        tracing::info!(endpoint = %display_endpoint, "RPC transport connected");

        Ok(Self {
            provider,
            display_endpoint,
        })
    }

    /// Endpoint scheme and host, for logs.
    pub fn endpoint(&self) -> &str {
        &self.display_endpoint
    }
}

impl RpcTransport for AlloyTransport {
    fn request(&self, method: &'static str, params: Value) -> BoxFuture<'_, TransportResult<Value>> {
        Box::pin(async move {
            let response: Value = self
                .provider
                .client()
                .request(method, params)
                .await
                .map_err(lift)?;
            Ok(response)
        })
    }

    fn subscribe_new_heads(&self) -> BoxFuture<'_, TransportResult<HeaderStream>> {
        Box::pin(async move {
            let subscription = self.provider.subscribe_blocks().await.map_err(lift)?;

            let closed = stream::once(async {
                Err(TransportError::Connection(
                    "subscription closed by node".to_string(),
                ))
            });
            let headers = subscription
                .into_stream()
                .map(|header| {
                    serde_json::to_value(&header).map_err(|e| {
                        TransportError::Connection(format!("cannot re-encode header: {}", e))
                    })
                })
                .chain(closed);

            Ok(headers.boxed())
        })
    }
}

impl std::fmt::Debug for AlloyTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlloyTransport")
            .field("endpoint", &self.display_endpoint)
            .finish()
    }
}

fn lift(err: alloy::transports::TransportError) -> TransportError {
    match err {
        RpcError::ErrorResp(payload) => TransportError::Rpc {
            code: payload.code,
            message: payload.message.to_string(),
        },
        other => TransportError::Connection(other.to_string()),
    }
}
