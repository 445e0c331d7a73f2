//! Offline fallback: the simulation policy, the latched forced-simulation flag
//! and the canned degraded-mode payload.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::errors::AiError;
use crate::retry::sleep_or_cancel;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationPolicy {
    /// Always answer with the canned payload; never touch the network.
    Enabled,
    /// Never simulate; exhausted retries surface as errors.
    Disabled,
    /// Simulate once retries have been exhausted, until reset.
    #[default]
    Auto,
}

impl SimulationPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for SimulationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimulationPolicy {
    type Err = AiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "enabled" => Ok(Self::Enabled),
            "disabled" => Ok(Self::Disabled),
            "auto" => Ok(Self::Auto),
            other => Err(AiError::configuration(format!(
                "unknown simulation policy: {other}"
            ))),
        }
    }
}

/// Owns the fallback gates for one dispatcher instance.
#[derive(Debug)]
pub struct FallbackController {
    policy: SimulationPolicy,
    forced: AtomicBool,
    delay: Duration,
}

impl FallbackController {
    pub fn new(policy: SimulationPolicy, delay: Duration) -> Self {
        Self {
            policy,
            forced: AtomicBool::new(false),
            delay,
        }
    }

    pub fn policy(&self) -> SimulationPolicy {
        self.policy
    }

    pub fn is_forced(&self) -> bool {
        self.forced.load(Ordering::Acquire)
    }

    pub fn should_simulate(&self) -> bool {
        match self.policy {
            SimulationPolicy::Enabled => true,
            SimulationPolicy::Auto => self.is_forced(),
            SimulationPolicy::Disabled => false,
        }
    }

    /// Called once retries are spent. Latches forced simulation under `auto`
    /// and reports whether the caller should be served the canned payload.
    pub fn on_exhausted(&self) -> bool {
        if self.policy == SimulationPolicy::Auto {
            self.forced.store(true, Ordering::Release);
            true
        } else {
            false
        }
    }

    /// Clear the latch. Returns whether it was set.
    pub fn reset(&self) -> bool {
        self.forced.swap(false, Ordering::AcqRel)
    }

    /// Produce the canned payload after the configured artificial latency.
    pub async fn simulate(&self, cancel: &CancellationToken) -> Result<String, AiError> {
        sleep_or_cancel(self.delay, cancel).await?;
        Ok(simulated_payload())
    }
}

pub fn simulated_report() -> Value {
    json!({
        "issues": [
            {
                "issueType": "Compliance",
                "description": "Document analysed in simulation mode. This is a placeholder result used to keep the workflow running while the AI backend is unreachable.",
                "pageNumber": 1,
                "paragraphNumber": 1,
                "suggestion": "For a real analysis, check the connection to the AI backend and turn simulation mode off."
            },
            {
                "issueType": "Structure",
                "description": "Document layout was not verified in simulation mode.",
                "pageNumber": 1,
                "paragraphNumber": 2,
                "suggestion": "Make sure the document follows the required standards."
            }
        ]
    })
}

/// The degraded-mode stand-in returned instead of a backend answer.
pub fn simulated_payload() -> String {
    format!("{:#}", simulated_report())
}
