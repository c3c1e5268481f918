//! JSON-over-HTTPS round trip shared by the providers.

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::error::{RagError, Result};

/// Which gateway a request belongs to; selects the error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Gateway {
    Embedding,
    Generation,
}

impl Gateway {
    pub fn error(self, provider: &str, message: impl Into<String>) -> RagError {
        match self {
            Self::Embedding => {
                RagError::EmbeddingError { provider: provider.into(), message: message.into() }
            }
            Self::Generation => {
                RagError::GenerationError { provider: provider.into(), message: message.into() }
            }
        }
    }
}

// OpenAI-style `{"error": {"message": ..}}` and Cohere-style `{"message": ..}`.
#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// POST `body` to `url` with bearer auth and decode the JSON response.
///
/// Transport failures, non-2xx statuses and undecodable bodies all come back
/// as the gateway's error variant.
pub(crate) async fn post_json<B, R>(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &B,
    provider: &str,
    gateway: Gateway,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    debug!(provider, url, "sending request");

    let response = client.post(url).bearer_auth(api_key).json(body).send().await.map_err(|e| {
        error!(provider, error = %e, "request failed");
        gateway.error(provider, format!("request failed: {e}"))
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.error.map(|e| e.message).or(body.message))
            .unwrap_or(text);

        error!(provider, %status, "API error");
        return Err(gateway.error(provider, format!("API returned {status}: {detail}")));
    }

    response.json::<R>().await.map_err(|e| {
        error!(provider, error = %e, "failed to parse response");
        gateway.error(provider, format!("failed to parse response: {e}"))
    })
}
