// Remote inference strategy: ship the image to a generative restoration
// endpoint and parse back the restored image.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use serde_json::json;
use tracing::{debug, instrument};

use crate::core::config::Config;
use crate::core::errors::{ProcessResult, RemoteError};
use crate::core::types::StopToken;
use crate::middleware::retry::{CallOutcome, RetryController, RetryError, RetryPolicy};
use crate::services::strategy::RemovalStrategy;

/// Fixed instruction sent with every restoration request.
const RESTORATION_INSTRUCTION: &str =
    "Remove all watermarks, stamped text, and overlay artifacts from this image. \
     Reconstruct the underlying content naturally so no trace of the overlay remains. \
     Do not alter anything else. Return only the restored image.";

/// Remote restoration client.
///
/// One POST per image; 429s are absorbed by the retry controller, semantic
/// rejections (safety block, stopped generation, missing payload) are never
/// retried.
pub struct RemoteInferenceStrategy {
    http_client: reqwest::Client,
    retry: RetryController,
    stop: StopToken,
    api_key: String,
    model: String,
    endpoint_base: String,
}

impl RemoteInferenceStrategy {
    /// Fails before any item is attempted if credentials are missing.
    pub fn new(config: &Config, stop: StopToken) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();

        let http_client = reqwest::Client::builder()
            .timeout(config.api.request_timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            retry: RetryController::new(RetryPolicy::from(&config.retry)),
            stop,
            api_key,
            model: config.api.restoration_model.clone(),
            endpoint_base: config.api.endpoint_base.clone(),
        })
    }

    fn request_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint_base, self.model, self.api_key
        )
    }

    fn build_request_body(image_bytes: &[u8], mime_type: &str) -> serde_json::Value {
        let base64_image = general_purpose::STANDARD.encode(image_bytes);

        json!({
            "contents": [{
                "parts": [
                    {"text": RESTORATION_INSTRUCTION},
                    {
                        "inlineData": {
                            "mimeType": mime_type,
                            "data": base64_image
                        }
                    }
                ]
            }],
            "safetySettings": [
                {"category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_NONE"},
                {"category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_NONE"},
                {"category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_NONE"},
                {"category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_NONE"}
            ],
            "generationConfig": {
                "responseModalities": ["IMAGE"]
            }
        })
    }

    /// One HTTP round trip, classified for the retry controller.
    async fn send_once(&self, url: &str, body: &serde_json::Value) -> Result<String, CallOutcome> {
        let response = self
            .http_client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| CallOutcome::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            response.text().await.map_err(|e| CallOutcome::Transport {
                message: format!("failed to read response body: {}", e),
            })
        } else {
            let message = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                Err(CallOutcome::RateLimited { message })
            } else {
                Err(CallOutcome::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    /// Extract the restored image from a 200 response, or classify the
    /// rejection. All non-STOP finish reasons collapse into
    /// `GenerationStopped`; reason-specific messaging is left to callers.
    fn classify_response(body: &str) -> Result<Vec<u8>, RemoteError> {
        let response: serde_json::Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(_) => return Err(RemoteError::NoImageReturned),
        };

        if let Some(parts) = response["candidates"][0]["content"]["parts"].as_array() {
            for part in parts {
                if let Some(data) = part["inlineData"]["data"].as_str() {
                    return general_purpose::STANDARD
                        .decode(data)
                        .map_err(|_| RemoteError::NoImageReturned);
                }
            }
        }

        if let Some(reason) = response["promptFeedback"]["blockReason"].as_str() {
            return Err(RemoteError::SafetyBlocked {
                reason: reason.to_string(),
            });
        }

        if let Some(reason) = response["candidates"][0]["finishReason"].as_str() {
            if reason != "STOP" {
                return Err(RemoteError::GenerationStopped {
                    reason: reason.to_string(),
                });
            }
        }

        Err(RemoteError::NoImageReturned)
    }
}

impl From<RetryError> for RemoteError {
    fn from(e: RetryError) -> Self {
        match e {
            RetryError::RateLimitExceeded { attempts } => {
                RemoteError::RateLimitExceeded { attempts }
            }
            RetryError::Network { message, .. } => RemoteError::Network { message },
            RetryError::Api { status, message } => RemoteError::Api { status, message },
        }
    }
}

#[async_trait]
impl RemovalStrategy for RemoteInferenceStrategy {
    fn name(&self) -> &'static str {
        "remote-inference"
    }

    #[instrument(skip(self, image_bytes), fields(size = image_bytes.len(), mime = mime_type))]
    async fn process(&self, image_bytes: Arc<Vec<u8>>, mime_type: &str) -> ProcessResult<Vec<u8>> {
        let url = self.request_url();
        let body = Self::build_request_body(&image_bytes, mime_type);

        let response_text = self
            .retry
            .execute(&self.stop, || self.send_once(&url, &body))
            .await
            .map_err(RemoteError::from)?;

        debug!(bytes = response_text.len(), "restoration response received");
        Ok(Self::classify_response(&response_text)?)
    }
}
