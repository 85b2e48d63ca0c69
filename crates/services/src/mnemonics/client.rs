use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::MnemonicConfig;

/// Body posted to the generation backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationPayload {
    pub request_id: String,
    pub topic_id: String,
    pub topic_name: String,
    pub subject: String,
    pub level: String,
    pub exam_board: Option<String>,
    pub topic: String,
    pub subtopic: Option<String>,
    pub mnemonic_type: &'static str,
    pub style: String,
    pub style_reference: String,
    pub callback_url: Option<String>,
}

/// Backend verdict on a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Ready,
    Processing,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GeneratedMnemonic {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub lyrics: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}

/// Response of the generation backend, as loosely as it arrives.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub status: Option<GenerationStatus>,
    #[serde(default)]
    pub cached: bool,
    #[serde(default)]
    pub mnemonic: Option<GeneratedMnemonic>,
    #[serde(default)]
    pub mnemonic_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl GenerationResponse {
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            status: Some(GenerationStatus::Failed),
            error: Some(message.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        !self.success || self.status == Some(GenerationStatus::Failed)
    }
}

/// Transport to the mnemonic generation backend.
///
/// Implementations never fail: transport problems come back as a failure
/// response.
#[async_trait]
pub trait MnemonicGenerator: Send + Sync {
    async fn generate(&self, payload: &GenerationPayload) -> GenerationResponse;
}

/// Posts generation requests as JSON with bearer auth.
#[derive(Clone)]
pub struct HttpMnemonicGenerator {
    client: Client,
    config: Option<MnemonicConfig>,
}

impl HttpMnemonicGenerator {
    #[must_use]
    pub fn new(config: Option<MnemonicConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl MnemonicGenerator for HttpMnemonicGenerator {
    async fn generate(&self, payload: &GenerationPayload) -> GenerationResponse {
        let Some(config) = self.config.as_ref() else {
            return GenerationResponse::failure("mnemonic generation is not configured");
        };

        let response = match self
            .client
            .post(config.endpoint.clone())
            .bearer_auth(&config.api_key)
            .json(payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(request_id = %payload.request_id, error = %err, "mnemonic request failed");
                return GenerationResponse::failure(err.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(request_id = %payload.request_id, %status, "mnemonic backend returned an error status");
            return GenerationResponse::failure(format!("generation failed with status {status}"));
        }

        match response.json::<GenerationResponse>().await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(request_id = %payload.request_id, error = %err, "unreadable mnemonic response");
                GenerationResponse::failure(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_parses_with_missing_fields() {
        let body: GenerationResponse =
            serde_json::from_str(r#"{"success": true, "status": "processing"}"#).unwrap();
        assert_eq!(body.status, Some(GenerationStatus::Processing));
        assert!(body.mnemonic.is_none());
        assert!(!body.is_failure());
    }

    #[test]
    fn explicit_failure_status_is_a_failure() {
        let body: GenerationResponse =
            serde_json::from_str(r#"{"success": true, "status": "failed"}"#).unwrap();
        assert!(body.is_failure());
    }

    #[tokio::test]
    async fn unconfigured_transport_fails_fast() {
        let generator = HttpMnemonicGenerator::new(None);
        assert!(!generator.enabled());
        let payload = GenerationPayload {
            request_id: "r-1".into(),
            topic_id: "t".into(),
            topic_name: "Topic".into(),
            subject: "biology".into(),
            level: "gcse".into(),
            exam_board: None,
            topic: "Topic".into(),
            subtopic: None,
            mnemonic_type: "educational",
            style: "hip-hop".into(),
            style_reference: "x".into(),
            callback_url: None,
        };
        let response = generator.generate(&payload).await;
        assert!(response.is_failure());
        assert!(response.error.is_some());
    }
}
