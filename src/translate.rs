//! Optional translation of listing text
//!
//! Translation is an annotation: a failed call leaves the translated field
//! empty and never affects whether a listing is stored.

use crate::config::TranslationConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("Translation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Translation service returned HTTP {0}")]
    Status(u16),

    #[error("Invalid translation endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// Text in, text out
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String, TranslateError>;
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

/// Client for LibreTranslate-compatible `/translate` endpoints
pub struct HttpTranslator {
    client: Client,
    endpoint: Url,
    source_language: String,
    target_language: String,
    api_key: Option<String>,
}

impl HttpTranslator {
    pub fn new(client: Client, config: &TranslationConfig) -> Result<Self, TranslateError> {
        Ok(Self {
            client,
            endpoint: Url::parse(&config.endpoint)?,
            source_language: config.source_language.clone(),
            target_language: config.target_language.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        let request = TranslateRequest {
            q: text,
            source: &self.source_language,
            target: &self.target_language,
            api_key: self.api_key.as_deref(),
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslateError::Status(status.as_u16()));
        }

        let body: TranslateResponse = response.json().await?;
        Ok(body.translated_text)
    }
}
