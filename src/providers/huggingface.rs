//! Hugging Face inference client for tip generation
//!
//! Uses a long-lived reqwest::Client for connection pooling.

use super::GenerationProvider;
use crate::error::TipsterError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

pub const DEFAULT_MODEL_URL: &str = "https://api-inference.huggingface.co/v1/models/gpt2";

/// Reusable inference client (connection-pooled)
pub struct HuggingFaceClient {
    client: Client,
    api_token: String,
    model_url: String,
}

impl HuggingFaceClient {
    pub fn new(api_token: String, model_url: String, timeout: Duration) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_token,
            model_url,
        })
    }

    /// Generate a completion for `prompt`
    pub async fn generate(&self, prompt: &str) -> crate::Result<String> {
        if self.api_token.is_empty() {
            return Err(TipsterError::Auth(
                "HUGGINGFACE_API_TOKEN not configured".to_string(),
            ));
        }

        let request = InferenceRequest {
            inputs: prompt,
            parameters: InferenceParameters {
                max_length: 50,
                num_return_sequences: 1,
            },
        };

        info!("Calling Hugging Face inference API");

        let response = self
            .client
            .post(&self.model_url)
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Inference request failed: {}", e);
                TipsterError::Transport(format!("Inference request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Inference API error response ({}): {}", status, error_text);
            return Err(classify_status(status, &error_text));
        }

        let generations: Vec<Generation> = response.json().await.map_err(|e| {
            error!("Failed to parse inference response: {}", e);
            TipsterError::InvalidResponse(format!("Inference parse error: {}", e))
        })?;

        let text = first_generation(generations)?;
        info!(chars = text.len(), "Inference response received");

        Ok(text)
    }
}

#[async_trait::async_trait]
impl GenerationProvider for HuggingFaceClient {
    async fn generate_text(&self, prompt: &str) -> crate::Result<String> {
        self.generate(prompt).await
    }
}

fn classify_status(status: StatusCode, body: &str) -> TipsterError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            TipsterError::Auth(format!("Inference API rejected token ({}): {}", status, body))
        }
        _ => TipsterError::Transport(format!("Inference API returned {}: {}", status, body)),
    }
}

/// Trimmed text of the first generation; empty output is an error.
fn first_generation(generations: Vec<Generation>) -> crate::Result<String> {
    let text = generations
        .into_iter()
        .next()
        .map(|g| g.generated_text.trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(TipsterError::InvalidResponse(
            "Empty response from inference API".to_string(),
        ));
    }

    Ok(text)
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    max_length: u32,
    num_return_sequences: u32,
}

#[derive(Debug, Deserialize)]
struct Generation {
    #[serde(default)]
    generated_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::post, Json, Router};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/models/gpt2", addr)
    }

    fn client(token: &str, url: String) -> HuggingFaceClient {
        HuggingFaceClient::new(token.to_string(), url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_request_serialization() {
        let request = InferenceRequest {
            inputs: "Predict a betting tip:",
            parameters: InferenceParameters {
                max_length: 50,
                num_return_sequences: 1,
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["inputs"], "Predict a betting tip:");
        assert_eq!(json["parameters"]["max_length"], 50);
        assert_eq!(json["parameters"]["num_return_sequences"], 1);
    }

    #[test]
    fn test_empty_generation_is_error() {
        let result = first_generation(vec![Generation {
            generated_text: "   ".into(),
        }]);
        assert!(matches!(result, Err(TipsterError::InvalidResponse(_))));
        assert!(first_generation(vec![]).is_err());
    }

    #[tokio::test]
    async fn test_missing_token_fails_without_request() {
        let hf = client("", "http://127.0.0.1:9/unused".into());
        let result = hf.generate("hello").await;
        assert!(matches!(result, Err(TipsterError::Auth(_))));
    }

    #[tokio::test]
    async fn test_generate_against_local_server() {
        let router = Router::new().route(
            "/models/gpt2",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                let authorized = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    == Some("Bearer hf_test");
                let text = if authorized {
                    format!("  {} Barcelona 2-1  ", body["inputs"].as_str().unwrap_or(""))
                } else {
                    String::new()
                };
                Json(serde_json::json!([{ "generated_text": text }]))
            }),
        );
        let url = serve(router).await;

        let text = client("hf_test", url).generate("Tip:").await.unwrap();
        assert_eq!(text, "Tip: Barcelona 2-1");
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_auth_error() {
        let router = Router::new().route(
            "/models/gpt2",
            post(|| async { (axum::http::StatusCode::UNAUTHORIZED, "bad token") }),
        );
        let url = serve(router).await;

        let result = client("hf_wrong", url).generate("Tip:").await;
        assert!(matches!(result, Err(TipsterError::Auth(_))));
    }
}
