//! Core library for dispatching prompts to interchangeable AI backends.
//!
//! Each module keeps one responsibility so the request path stays easy to
//! follow:
//! - [`agents`] holds provider settings, the per-provider adapters and the
//!   [`agents::AiOrchestrator`] entry point.
//! - [`transport`] performs single HTTP exchanges and classifies failures.
//! - [`retry`] runs the bounded, cancellable backoff loop.
//! - [`fallback`] owns the simulation policy and the canned offline payload.
//! - [`errors`] keeps the error catalogue with stable codes.
//! - [`logging`] writes structured diagnostics through the `log` facade.

pub mod agents;
pub mod errors;
pub mod fallback;
pub mod logging;
pub mod retry;
pub mod transport;

pub use agents::{AiOrchestrator, AiSettings, AiStatus, GenerationOverrides, ProviderKind};
pub use errors::AiError;
pub use fallback::SimulationPolicy;
pub use tokio_util::sync::CancellationToken;
