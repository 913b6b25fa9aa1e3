//! LibreTranslate-compatible API backend

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::NotKeyed};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use super::backend::{BackendKind, BackendRequest};
use super::language;
use crate::engine::{SpeechTranslation, http_client};
use crate::{Error, Result};

type SharedLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: String,
}

/// Client for `POST /translate`
pub struct LibreTranslateBackend {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<SecretString>,
    limiter: Option<SharedLimiter>,
}

impl LibreTranslateBackend {
    /// Create a client against a server root such as `https://libretranslate.com/`
    ///
    /// # Errors
    ///
    /// Returns error if the translate endpoint cannot be derived from `base_url`
    /// or the HTTP client cannot be built
    pub fn new(base_url: &Url, api_key: Option<SecretString>, timeout: Duration) -> Result<Self> {
        let endpoint = base_url
            .join("translate")
            .map_err(|e| Error::Config(format!("invalid LibreTranslate url: {e}")))?;

        Ok(Self {
            client: http_client(timeout)?,
            endpoint,
            api_key,
            limiter: None,
        })
    }

    /// Cap outbound requests per minute
    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_minute: u32) -> Self {
        let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        self.limiter = Some(Arc::new(RateLimiter::direct(Quota::per_minute(rpm))));
        self
    }

    /// Configured backends are always eligible; throttling is reported per call
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        true
    }

    /// Translate text
    ///
    /// # Errors
    ///
    /// Returns `BackendNotReady` when throttled or handed no text, otherwise
    /// the HTTP or decoding error
    pub async fn translate(&self, request: &BackendRequest<'_>) -> Result<SpeechTranslation> {
        let Some(text) = request.text else {
            return Err(Error::BackendNotReady(
                "libretranslate needs text input".to_string(),
            ));
        };

        if let Some(limiter) = &self.limiter
            && limiter.check().is_err()
        {
            tracing::warn!("libretranslate rate limit reached");
            return Err(Error::BackendNotReady(
                "libretranslate rate limit reached".to_string(),
            ));
        }

        let source = language::to_backend(request.source, BackendKind::LibreTranslate);
        let target = language::to_backend(request.target, BackendKind::LibreTranslate);
        let body = TranslateRequest {
            q: text,
            source: &source,
            target: &target,
            format: "text",
            api_key: self.api_key.as_ref().map(ExposeSecret::expose_secret),
        };

        tracing::debug!(url = %self.endpoint, chars = text.len(), "libretranslate request");
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = %status, body = %body, "libretranslate error");
            return Err(Error::TranslationUnavailable(format!(
                "libretranslate returned {status}: {body}"
            )));
        }

        let result: TranslateResponse = response.json().await?;
        Ok(SpeechTranslation {
            original_text: Some(text.to_string()),
            translated_text: result.translated_text,
            audio: None,
            confidence: None,
        })
    }
}
