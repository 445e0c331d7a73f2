//! Per-provider request builders and response extractors.
//!
//! Each backend speaks its own JSON dialect. Adapters translate a normalized
//! [`GenerationRequest`] into the exact wire body a backend expects and pull the
//! generated text back out of its response, so the retry path never needs to
//! branch on provider names.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::config::AiSettings;
use super::providers::ProviderKind;
use crate::errors::{AiError, ExtractionError};

/// Normalized input for one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// Per-call overrides for the configured generation parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOverrides {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

/// Everything the transport needs to perform one POST.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub url: String,
    pub body: Value,
    pub headers: Vec<(String, String)>,
}

pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn requires_credential(&self) -> bool {
        self.kind().requires_api_key()
    }

    fn build_request(
        &self,
        request: &GenerationRequest,
        settings: &AiSettings,
    ) -> Result<PreparedRequest, AiError>;

    fn extract_result(&self, response: &Value) -> Result<String, ExtractionError>;
}

pub fn adapter_for(kind: ProviderKind) -> Box<dyn ProviderAdapter> {
    match kind {
        ProviderKind::CloudChat => Box::new(CloudChatAdapter),
        ProviderKind::CloudGenerative => Box::new(CloudGenerativeAdapter),
        ProviderKind::LocalInference => Box::new(LocalInferenceAdapter),
    }
}

pub struct CloudChatAdapter;

impl ProviderAdapter for CloudChatAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CloudChat
    }

    fn build_request(
        &self,
        request: &GenerationRequest,
        settings: &AiSettings,
    ) -> Result<PreparedRequest, AiError> {
        let secret = require_credential(settings, self.kind())?;
        let body = json!({
            "model": settings.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });
        Ok(PreparedRequest {
            url: cloud_endpoint(settings, self.kind()),
            body,
            headers: vec![("Authorization".to_string(), format!("Bearer {secret}"))],
        })
    }

    fn extract_result(&self, response: &Value) -> Result<String, ExtractionError> {
        let provider = self.kind().id();
        let first = response
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .ok_or_else(|| ExtractionError::new(provider, "choices"))?;
        let message = first
            .get("message")
            .filter(|m| m.is_object())
            .ok_or_else(|| ExtractionError::new(provider, "choices[0].message"))?;
        non_blank(
            message.get("content"),
            provider,
            "choices[0].message.content",
        )
    }
}

pub struct CloudGenerativeAdapter;

impl ProviderAdapter for CloudGenerativeAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CloudGenerative
    }

    fn build_request(
        &self,
        request: &GenerationRequest,
        settings: &AiSettings,
    ) -> Result<PreparedRequest, AiError> {
        let secret = require_credential(settings, self.kind())?;
        // The key travels as a query parameter rather than a header.
        let endpoint = cloud_endpoint(settings, self.kind());
        let separator = if endpoint.contains('?') { '&' } else { '?' };
        let url = format!("{endpoint}{separator}key={}", urlencoding::encode(secret));
        let body = json!({
            "contents": [{ "parts": [{ "text": request.prompt }] }],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_tokens,
            },
        });
        Ok(PreparedRequest {
            url,
            body,
            headers: Vec::new(),
        })
    }

    fn extract_result(&self, response: &Value) -> Result<String, ExtractionError> {
        let provider = self.kind().id();
        let candidate = response
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
            .ok_or_else(|| ExtractionError::new(provider, "candidates"))?;
        let part = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .and_then(|parts| parts.first())
            .ok_or_else(|| ExtractionError::new(provider, "candidates[0].content.parts[0]"))?;
        non_blank(part.get("text"), provider, "candidates[0].content.parts[0].text")
    }
}

pub struct LocalInferenceAdapter;

impl ProviderAdapter for LocalInferenceAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::LocalInference
    }

    fn build_request(
        &self,
        request: &GenerationRequest,
        settings: &AiSettings,
    ) -> Result<PreparedRequest, AiError> {
        let url = format!(
            "{}{}",
            settings.base_url.trim_end_matches('/'),
            settings.api_path
        );
        let body = json!({
            "model": settings.model,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            },
        });
        Ok(PreparedRequest {
            url,
            body,
            headers: Vec::new(),
        })
    }

    fn extract_result(&self, response: &Value) -> Result<String, ExtractionError> {
        non_blank(response.get("response"), self.kind().id(), "response")
    }
}

fn require_credential(settings: &AiSettings, kind: ProviderKind) -> Result<&str, AiError> {
    settings.credential().ok_or_else(|| {
        AiError::configuration(format!("API key for provider {kind} is not configured"))
    })
}

fn cloud_endpoint(settings: &AiSettings, kind: ProviderKind) -> String {
    match settings.api_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => kind.seed().default_endpoint.replace("{model}", &settings.model),
    }
}

fn non_blank(
    value: Option<&Value>,
    provider: &'static str,
    field: &str,
) -> Result<String, ExtractionError> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| ExtractionError::new(provider, field))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: "Check this clause".into(),
            max_tokens: 256,
            temperature: 0.5,
        }
    }

    fn cloud_settings(provider: &str) -> AiSettings {
        AiSettings {
            provider: provider.into(),
            api_url: Some("https://api.example.test/v1/endpoint".into()),
            api_key: Some("secret-key".into()),
            model: "model-x".into(),
            ..AiSettings::default()
        }
    }

    #[test]
    fn only_cloud_adapters_need_a_credential() {
        assert!(adapter_for(ProviderKind::CloudChat).requires_credential());
        assert!(adapter_for(ProviderKind::CloudGenerative).requires_credential());
        assert!(!adapter_for(ProviderKind::LocalInference).requires_credential());
    }

    #[test]
    fn cloud_chat_builds_bearer_request() {
        let prepared = CloudChatAdapter
            .build_request(&request(), &cloud_settings("cloud-chat"))
            .unwrap();
        assert_eq!(prepared.url, "https://api.example.test/v1/endpoint");
        assert_eq!(
            prepared.headers,
            vec![("Authorization".to_string(), "Bearer secret-key".to_string())]
        );
        assert_eq!(
            prepared.body,
            json!({
                "model": "model-x",
                "messages": [{"role": "user", "content": "Check this clause"}],
                "max_tokens": 256,
                "temperature": 0.5,
            })
        );
    }

    #[test]
    fn cloud_chat_extracts_first_choice() {
        let response = json!({"choices": [{"message": {"role": "assistant", "content": "All good"}}]});
        assert_eq!(CloudChatAdapter.extract_result(&response).unwrap(), "All good");
    }

    #[test]
    fn cloud_chat_rejects_missing_fields() {
        for response in [
            json!({}),
            json!({"choices": []}),
            json!({"choices": [{}]}),
            json!({"choices": [{"message": {"content": "  "}}]}),
        ] {
            let err = CloudChatAdapter.extract_result(&response).unwrap_err();
            assert_eq!(err.provider, "cloud-chat");
        }
    }

    #[test]
    fn cloud_generative_puts_key_in_query() {
        let prepared = CloudGenerativeAdapter
            .build_request(&request(), &cloud_settings("cloud-generative"))
            .unwrap();
        assert_eq!(
            prepared.url,
            "https://api.example.test/v1/endpoint?key=secret-key"
        );
        assert!(prepared.headers.is_empty());
        assert_eq!(
            prepared.body,
            json!({
                "contents": [{"parts": [{"text": "Check this clause"}]}],
                "generationConfig": {"temperature": 0.5, "maxOutputTokens": 256},
            })
        );
    }

    #[test]
    fn cloud_generative_appends_to_existing_query_and_encodes_key() {
        let settings = AiSettings {
            api_url: Some("https://api.example.test/gen?alt=json".into()),
            api_key: Some("a b&c".into()),
            ..cloud_settings("cloud-generative")
        };
        let prepared = CloudGenerativeAdapter
            .build_request(&request(), &settings)
            .unwrap();
        assert_eq!(prepared.url, "https://api.example.test/gen?alt=json&key=a%20b%26c");
    }

    #[test]
    fn cloud_generative_defaults_endpoint_from_model() {
        let settings = AiSettings {
            api_url: None,
            ..cloud_settings("cloud-generative")
        };
        let prepared = CloudGenerativeAdapter
            .build_request(&request(), &settings)
            .unwrap();
        assert_eq!(
            prepared.url,
            "https://generativelanguage.googleapis.com/v1beta/models/model-x:generateContent?key=secret-key"
        );
    }

    #[test]
    fn cloud_generative_extracts_nested_text() {
        let response = json!({"candidates": [{"content": {"parts": [{"text": "Looks fine"}]}}]});
        assert_eq!(
            CloudGenerativeAdapter.extract_result(&response).unwrap(),
            "Looks fine"
        );
        let malformed = json!({"candidates": [{"content": {"parts": "nope"}}]});
        assert!(CloudGenerativeAdapter.extract_result(&malformed).is_err());
        assert!(CloudGenerativeAdapter
            .extract_result(&json!({"candidates": []}))
            .is_err());
    }

    #[test]
    fn local_inference_joins_base_url_and_path() {
        let settings = AiSettings {
            base_url: "http://127.0.0.1:11434/".into(),
            ..AiSettings::default()
        };
        let prepared = LocalInferenceAdapter
            .build_request(&request(), &settings)
            .unwrap();
        assert_eq!(prepared.url, "http://127.0.0.1:11434/api/generate");
        assert!(prepared.headers.is_empty());
        assert_eq!(
            prepared.body,
            json!({
                "model": "llama3",
                "prompt": "Check this clause",
                "stream": false,
                "options": {"temperature": 0.5, "num_predict": 256},
            })
        );
    }

    #[test]
    fn local_inference_requires_non_blank_response() {
        assert_eq!(
            LocalInferenceAdapter
                .extract_result(&json!({"response": "Done"}))
                .unwrap(),
            "Done"
        );
        assert!(LocalInferenceAdapter
            .extract_result(&json!({"response": ""}))
            .is_err());
        assert!(LocalInferenceAdapter.extract_result(&json!({"done": true})).is_err());
    }

    #[test]
    fn cloud_providers_fail_fast_without_key() {
        for (provider, adapter) in [
            ("cloud-chat", adapter_for(ProviderKind::CloudChat)),
            ("cloud-generative", adapter_for(ProviderKind::CloudGenerative)),
        ] {
            let settings = AiSettings {
                api_key: Some(String::new()),
                ..cloud_settings(provider)
            };
            let err = adapter.build_request(&request(), &settings).unwrap_err();
            assert!(err.is_configuration());
        }
        assert!(adapter_for(ProviderKind::LocalInference)
            .build_request(&request(), &AiSettings::default())
            .is_ok());
    }
}
