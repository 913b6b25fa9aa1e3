//! Google Cloud Translation v2 backend

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use super::backend::{BackendKind, BackendRequest};
use super::language;
use crate::engine::{SpeechTranslation, http_client};
use crate::{Error, Result};

const DEFAULT_ENDPOINT: &str = "https://translation.googleapis.com/language/translate/v2";

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Deserialize)]
struct TranslateData {
    translations: Vec<TranslatedText>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslatedText {
    translated_text: String,
}

/// Client for `POST /language/translate/v2`
pub struct GoogleBackend {
    client: reqwest::Client,
    endpoint: Url,
    api_key: SecretString,
}

impl GoogleBackend {
    /// Create a client for the public endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_key: SecretString, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(DEFAULT_ENDPOINT)
            .map_err(|e| Error::Config(format!("invalid Google endpoint: {e}")))?;
        Self::with_endpoint(endpoint, api_key, timeout)
    }

    /// Create a client for a custom endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty or the HTTP client cannot be built
    pub fn with_endpoint(endpoint: Url, api_key: SecretString, timeout: Duration) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "Google Cloud Translation API key required".to_string(),
            ));
        }

        Ok(Self {
            client: http_client(timeout)?,
            endpoint,
            api_key,
        })
    }

    /// Ready whenever configured
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        true
    }

    /// Translate text
    ///
    /// # Errors
    ///
    /// Returns `BackendNotReady` when handed no text, otherwise the HTTP or
    /// decoding error
    pub async fn translate(&self, request: &BackendRequest<'_>) -> Result<SpeechTranslation> {
        let Some(text) = request.text else {
            return Err(Error::BackendNotReady(
                "google translate needs text input".to_string(),
            ));
        };

        let source = language::to_backend(request.source, BackendKind::Google);
        let target = language::to_backend(request.target, BackendKind::Google);
        let body = TranslateRequest {
            q: text,
            source: &source,
            target: &target,
            format: "text",
        };

        tracing::debug!(chars = text.len(), "google translate request");
        let response = self
            .client
            .post(self.endpoint.clone())
            .query(&[("key", self.api_key.expose_secret())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = %status, body = %body, "google translate error");
            return Err(Error::TranslationUnavailable(format!(
                "google translate returned {status}: {body}"
            )));
        }

        let result: TranslateResponse = response.json().await?;
        let translated_text = result
            .data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| {
                Error::TranslationUnavailable("google translate returned no translations".to_string())
            })?;

        Ok(SpeechTranslation {
            original_text: Some(text.to_string()),
            translated_text,
            audio: None,
            confidence: None,
        })
    }
}
