pub mod adapters;
pub mod config;
pub mod orchestrator;
pub mod providers;

pub use adapters::{GenerationOverrides, GenerationRequest, PreparedRequest, ProviderAdapter};
pub use config::{load_settings_file, AiSettings};
pub use orchestrator::{AiOrchestrator, AiStatus, CANARY_PROMPT};
pub use providers::{ProviderKind, PROVIDER_SEEDS};
