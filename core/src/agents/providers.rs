use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AiError;

/// The backends the dispatcher knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    CloudChat,
    CloudGenerative,
    LocalInference,
}

/// Static metadata for one provider.
#[derive(Debug)]
pub struct ProviderSeed {
    pub kind: ProviderKind,
    pub id: &'static str,
    pub aliases: &'static [&'static str],
    pub display: &'static str,
    pub requires_api_key: bool,
    /// Used when no explicit endpoint is configured. `{model}` is substituted.
    pub default_endpoint: &'static str,
}

pub const PROVIDER_SEEDS: &[ProviderSeed] = &[
    ProviderSeed {
        kind: ProviderKind::LocalInference,
        id: "local-inference",
        aliases: &["ollama", "local"],
        display: "Local inference server",
        requires_api_key: false,
        default_endpoint: "http://localhost:11434/api/generate",
    },
    ProviderSeed {
        kind: ProviderKind::CloudChat,
        id: "cloud-chat",
        aliases: &["openai"],
        display: "Cloud chat completions",
        requires_api_key: true,
        default_endpoint: "https://api.openai.com/v1/chat/completions",
    },
    ProviderSeed {
        kind: ProviderKind::CloudGenerative,
        id: "cloud-generative",
        aliases: &["gemini", "google"],
        display: "Cloud generative content",
        requires_api_key: true,
        default_endpoint:
            "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent",
    },
];

impl ProviderKind {
    pub fn seed(self) -> &'static ProviderSeed {
        match self {
            Self::LocalInference => &PROVIDER_SEEDS[0],
            Self::CloudChat => &PROVIDER_SEEDS[1],
            Self::CloudGenerative => &PROVIDER_SEEDS[2],
        }
    }

    pub fn id(self) -> &'static str {
        self.seed().id
    }

    pub fn display_name(self) -> &'static str {
        self.seed().display
    }

    pub fn requires_api_key(self) -> bool {
        self.seed().requires_api_key
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ProviderKind {
    type Err = AiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        PROVIDER_SEEDS
            .iter()
            .find(|seed| seed.id == wanted || seed.aliases.contains(&wanted.as_str()))
            .map(|seed| seed.kind)
            .ok_or_else(|| AiError::configuration(format!("unknown AI provider: {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_line_up_with_kinds() {
        for seed in PROVIDER_SEEDS {
            assert_eq!(seed.kind.seed().id, seed.id);
        }
    }

    #[test]
    fn parses_ids_and_legacy_aliases() {
        assert_eq!("cloud-chat".parse::<ProviderKind>().unwrap(), ProviderKind::CloudChat);
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::CloudChat);
        assert_eq!(
            " gemini ".parse::<ProviderKind>().unwrap(),
            ProviderKind::CloudGenerative
        );
        assert_eq!("ollama".parse::<ProviderKind>().unwrap(), ProviderKind::LocalInference);
    }

    #[test]
    fn unknown_provider_is_a_configuration_error() {
        let err = "anthropic".parse::<ProviderKind>().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("anthropic"));
    }

    #[test]
    fn only_cloud_providers_need_keys() {
        assert!(ProviderKind::CloudChat.requires_api_key());
        assert!(ProviderKind::CloudGenerative.requires_api_key());
        assert!(!ProviderKind::LocalInference.requires_api_key());
    }
}
