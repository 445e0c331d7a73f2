use std::sync::Arc;

use log::Level;
use serde::Serialize;
use serde_json::json;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::adapters::{adapter_for, GenerationOverrides, GenerationRequest, ProviderAdapter};
use super::config::AiSettings;
use super::providers::ProviderKind;
use crate::errors::AiError;
use crate::fallback::{FallbackController, SimulationPolicy};
use crate::logging::{log_event, prompt_fingerprint, prompt_preview};
use crate::retry::{run_with_retry, AttemptFailure, RetryOutcome, RetryPolicy};
use crate::transport::{HttpTransport, Transport};

pub const CANARY_PROMPT: &str = "Connection test. Reply with just 'OK'.";
const CANARY_TOKEN: &str = "OK";

/// Point-in-time view of the dispatcher for health checks and the UI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiStatus {
    pub provider: ProviderKind,
    pub provider_name: &'static str,
    pub model: String,
    pub simulation_policy: SimulationPolicy,
    pub forced_simulation: bool,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: i64,
}

/// Public entry point: routes prompts to the configured provider with retries
/// and falls back to simulated answers when the backend stays unreachable.
pub struct AiOrchestrator {
    settings: AiSettings,
    provider: ProviderKind,
    adapter: Box<dyn ProviderAdapter>,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    fallback: FallbackController,
}

impl AiOrchestrator {
    pub fn new(settings: AiSettings) -> Result<Self, AiError> {
        let transport = HttpTransport::new(settings.timeout())?;
        Self::with_transport(settings, Arc::new(transport))
    }

    pub fn with_transport(
        settings: AiSettings,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, AiError> {
        let provider = settings.validate()?;
        let adapter = adapter_for(provider);
        if adapter.requires_credential() && settings.credential().is_none() {
            log_event(
                Level::Warn,
                Some("AI-1001"),
                "ai.dispatch",
                "Provider needs an API key but none is configured",
                Some("Requests will fail until a key is supplied; status checks still work."),
                Some(json!({ "provider": provider.id() })),
            );
        }
        Ok(Self {
            adapter,
            retry: settings.retry_policy(),
            fallback: FallbackController::new(
                settings.simulation_policy,
                settings.simulation_delay(),
            ),
            provider,
            transport,
            settings,
        })
    }

    pub fn settings(&self) -> &AiSettings {
        &self.settings
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// Whether the next call would be answered from simulation.
    pub fn is_simulating(&self) -> bool {
        self.fallback.should_simulate()
    }

    pub async fn send_request(&self, prompt: &str) -> Result<String, AiError> {
        self.send_request_with(prompt, &GenerationOverrides::default(), &CancellationToken::new())
            .await
    }

    pub async fn send_request_with(
        &self,
        prompt: &str,
        overrides: &GenerationOverrides,
        cancel: &CancellationToken,
    ) -> Result<String, AiError> {
        let request_id = Uuid::new_v4().to_string();
        log_event(
            Level::Info,
            Some("AI-0100"),
            "ai.runtime",
            "Dispatching AI request",
            None,
            Some(json!({
                "request_id": request_id,
                "provider": self.provider,
                "model": self.settings.model,
                "prompt_sha": prompt_fingerprint(prompt),
            })),
        );
        log::debug!(target: "ai.runtime", "prompt preview: {}", prompt_preview(prompt));

        if self.fallback.should_simulate() {
            return self.serve_simulation(&request_id, cancel).await;
        }

        let request = self.settings.generation_request(prompt, overrides);
        let outcome = run_with_retry(&self.retry, cancel, &request_id, |attempt| {
            self.attempt(&request, &request_id, attempt)
        })
        .await?;

        match outcome {
            RetryOutcome::Success { value, attempts } => {
                log_event(
                    Level::Info,
                    Some("AI-0200"),
                    "ai.runtime",
                    "AI request succeeded",
                    None,
                    Some(json!({
                        "request_id": request_id,
                        "provider": self.provider,
                        "attempts": attempts,
                        "max_attempts": self.retry.max_attempts,
                        "chars": value.chars().count(),
                    })),
                );
                Ok(value)
            }
            RetryOutcome::Exhausted { attempts, last } => {
                if self.fallback.on_exhausted() {
                    log_event(
                        Level::Warn,
                        Some("AI-0301"),
                        "ai.fallback",
                        "Switching to simulation after repeated failures",
                        Some("Call reset_simulation once the backend is reachable again"),
                        Some(json!({
                            "request_id": request_id,
                            "provider": self.provider,
                            "attempts": attempts,
                            "last_error": last.to_string(),
                        })),
                    );
                    return self.serve_simulation(&request_id, cancel).await;
                }
                Err(AiError::Exhausted { attempts, last })
            }
        }
    }

    async fn attempt(
        &self,
        request: &GenerationRequest,
        request_id: &str,
        attempt: u32,
    ) -> Result<String, AttemptFailure> {
        let prepared = self
            .adapter
            .build_request(request, &self.settings)
            .map_err(AttemptFailure::Terminal)?;
        log::debug!(
            target: "ai.runtime",
            "request {request_id}: attempt {attempt}/{} to {}",
            self.retry.max_attempts,
            self.provider
        );
        let response = self
            .transport
            .send(&prepared.url, &prepared.body, &prepared.headers)
            .await?;
        self.adapter.extract_result(&response).map_err(|err| {
            log::debug!(
                target: "ai.runtime",
                "request {request_id}: unexpected {} response shape: {response}",
                self.provider
            );
            err.into()
        })
    }

    async fn serve_simulation(
        &self,
        request_id: &str,
        cancel: &CancellationToken,
    ) -> Result<String, AiError> {
        log_event(
            Level::Warn,
            Some("AI-0300"),
            "ai.fallback",
            "Serving simulated AI response",
            None,
            Some(json!({
                "request_id": request_id,
                "policy": self.fallback.policy(),
                "forced": self.fallback.is_forced(),
            })),
        );
        self.fallback.simulate(cancel).await
    }

    /// Send the canary prompt and check for the acknowledgement token. Never
    /// fails; any error is logged and reported as `false`.
    pub async fn test_connection(&self) -> bool {
        self.probe().await.0
    }

    async fn probe(&self) -> (bool, Option<String>) {
        let failure = match self.send_request(CANARY_PROMPT).await {
            Ok(reply) if reply.contains(CANARY_TOKEN) => return (true, None),
            Ok(_) => "canary reply did not contain the acknowledgement token".to_string(),
            Err(err) => err.to_string(),
        };
        log_event(
            Level::Error,
            Some("AI-0400"),
            "ai.runtime",
            "AI connection test failed",
            Some(&failure),
            Some(json!({ "provider": self.provider })),
        );
        (false, Some(failure))
    }

    /// Snapshot of the dispatcher. Issues a canary call to fill `connected`.
    pub async fn get_status(&self) -> AiStatus {
        let (connected, error) = self.probe().await;
        AiStatus {
            provider: self.provider,
            provider_name: self.provider.display_name(),
            model: self.settings.model.clone(),
            simulation_policy: self.fallback.policy(),
            forced_simulation: self.fallback.is_forced(),
            connected,
            error,
            checked_at: OffsetDateTime::now_utc().unix_timestamp(),
        }
    }

    pub fn reset_simulation(&self) {
        let was_forced = self.fallback.reset();
        log_event(
            Level::Info,
            Some("AI-0302"),
            "ai.fallback",
            "Simulation mode reset",
            None,
            Some(json!({ "was_forced": was_forced })),
        );
    }
}
