use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::adapters::{GenerationOverrides, GenerationRequest};
use super::providers::ProviderKind;
use crate::errors::AiError;
use crate::fallback::SimulationPolicy;
use crate::retry::RetryPolicy;

/// Runtime settings for the dispatcher. Owned by the embedding application and
/// treated as read-only once handed over.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiSettings {
    pub provider: String,
    /// Local inference server root, e.g. `http://localhost:11434`.
    pub base_url: String,
    /// Path appended to `base_url` for local inference.
    pub api_path: String,
    /// Full endpoint for the cloud providers. Falls back to the catalogue
    /// default when blank.
    pub api_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    #[serde(alias = "simulationMode")]
    pub simulation_policy: SimulationPolicy,
    pub timeout_ms: u64,
    pub max_retry_attempts: u32,
    pub retry_backoff_delay_ms: u64,
    pub retry_backoff_cap_ms: u64,
    pub simulation_delay_ms: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::LocalInference.id().to_string(),
            base_url: "http://localhost:11434".to_string(),
            api_path: "/api/generate".to_string(),
            api_url: None,
            api_key: None,
            model: "llama3".to_string(),
            max_tokens: 2000,
            temperature: 0.7,
            simulation_policy: SimulationPolicy::Auto,
            timeout_ms: 300_000,
            max_retry_attempts: 3,
            retry_backoff_delay_ms: 1000,
            retry_backoff_cap_ms: 10_000,
            simulation_delay_ms: 2000,
        }
    }
}

impl fmt::Debug for AiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiSettings")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_path", &self.api_path)
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("simulation_policy", &self.simulation_policy)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retry_attempts", &self.max_retry_attempts)
            .field("retry_backoff_delay_ms", &self.retry_backoff_delay_ms)
            .field("retry_backoff_cap_ms", &self.retry_backoff_cap_ms)
            .field("simulation_delay_ms", &self.simulation_delay_ms)
            .finish()
    }
}

impl AiSettings {
    /// Read settings from `AI_*` environment variables, keeping defaults for
    /// anything unset.
    pub fn from_env() -> Result<Self, AiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AiSettings::from_env`] but against an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Self::default();

        if let Some(v) = read("AI_PROVIDER") {
            settings.provider = v;
        }
        if let Some(v) = read("AI_BASE_URL") {
            settings.base_url = v;
        }
        if let Some(v) = read("AI_API_PATH") {
            settings.api_path = v;
        }
        settings.api_url = read("AI_API_URL");
        settings.api_key = read("AI_API_KEY");
        if let Some(v) = read("AI_MODEL") {
            settings.model = v;
        }
        if let Some(v) = read("AI_SIMULATION_MODE") {
            settings.simulation_policy = v.parse()?;
        }
        parse_into(&read, "AI_MAX_TOKENS", &mut settings.max_tokens)?;
        parse_into(&read, "AI_TEMPERATURE", &mut settings.temperature)?;
        parse_into(&read, "AI_TIMEOUT_MS", &mut settings.timeout_ms)?;
        parse_into(&read, "AI_RETRY_MAX_ATTEMPTS", &mut settings.max_retry_attempts)?;
        parse_into(&read, "AI_RETRY_BACKOFF_DELAY_MS", &mut settings.retry_backoff_delay_ms)?;
        parse_into(&read, "AI_RETRY_BACKOFF_CAP_MS", &mut settings.retry_backoff_cap_ms)?;
        parse_into(&read, "AI_SIMULATION_DELAY_MS", &mut settings.simulation_delay_ms)?;
        Ok(settings)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, AiError> {
        serde_json::from_str(raw)
            .map_err(|e| AiError::configuration(format!("invalid AI settings JSON: {e}")))
    }

    /// Check everything that can be checked without a network call and
    /// resolve the provider. Missing credentials are reported per request.
    pub fn validate(&self) -> Result<ProviderKind, AiError> {
        let kind: ProviderKind = self.provider.parse()?;
        if self.max_retry_attempts == 0 {
            return Err(AiError::configuration("maxRetryAttempts must be at least 1"));
        }
        if self.max_tokens == 0 {
            return Err(AiError::configuration("maxTokens must be positive"));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(AiError::configuration(format!(
                "temperature must be a non-negative number, got {}",
                self.temperature
            )));
        }
        if self.timeout_ms == 0 {
            return Err(AiError::configuration("timeoutMs must be positive"));
        }
        if self.model.trim().is_empty() {
            return Err(AiError::configuration("model must not be blank"));
        }
        Ok(kind)
    }

    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn simulation_delay(&self) -> Duration {
        Duration::from_millis(self.simulation_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retry_attempts,
            base_delay: Duration::from_millis(self.retry_backoff_delay_ms),
            cap: Duration::from_millis(self.retry_backoff_cap_ms),
        }
    }

    pub fn generation_request(
        &self,
        prompt: &str,
        overrides: &GenerationOverrides,
    ) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.to_string(),
            max_tokens: overrides.max_tokens.unwrap_or(self.max_tokens),
            temperature: overrides.temperature.unwrap_or(self.temperature),
        }
    }
}

/// Load settings from a JSON file on disk.
pub fn load_settings_file(path: &Path) -> Result<AiSettings> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read AI settings from {}", path.display()))?;
    let settings = AiSettings::from_json_str(&raw)
        .with_context(|| format!("failed to parse AI settings in {}", path.display()))?;
    Ok(settings)
}

fn parse_into<T, F>(read: &F, key: &str, slot: &mut T) -> Result<(), AiError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = read(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| AiError::configuration(format!("{key} is not valid ({raw}): {e}")))?;
    }
    Ok(())
}
