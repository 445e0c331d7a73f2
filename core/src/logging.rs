use log::Level;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Emit a structured diagnostic event through the `log` facade.
///
/// The shape mirrors the event catalogue used across the crate: a stable
/// `code`, the emitting `module` (used as the log target), a short message,
/// an optional human explanation and an optional JSON payload.
pub fn log_event(
    level: Level,
    code: Option<&str>,
    module: &'static str,
    message: &str,
    explain: Option<&str>,
    data: Option<Value>,
) {
    if !log::log_enabled!(target: module, level) {
        return;
    }
    let code = code.unwrap_or("-");
    let explain = explain.map(|e| format!(" ({e})")).unwrap_or_default();
    let data = data.map(|v| format!(" {v}")).unwrap_or_default();
    log::log!(target: module, level, "[{code}] {message}{explain}{data}");
}

/// Short, stable fingerprint so prompts can be correlated without logging them.
pub fn prompt_fingerprint(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}

pub fn prompt_preview(prompt: &str) -> String {
    prompt.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_short_and_deterministic() {
        let a = prompt_fingerprint("analyse this document");
        assert_eq!(a.len(), 12);
        assert_eq!(a, prompt_fingerprint("analyse this document"));
        assert_ne!(a, prompt_fingerprint("analyse that document"));
    }

    #[test]
    fn preview_truncates_on_char_boundaries() {
        let prompt = "é".repeat(300);
        assert_eq!(prompt_preview(&prompt).chars().count(), 200);
        assert_eq!(prompt_preview("short"), "short");
    }
}
