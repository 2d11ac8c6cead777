//! Environment overrides.

use super::Config;
use tracing::debug;

/// Credential variables, in order of precedence.
pub const API_KEY_VARS: &[&str] = &["FORMPILOT_API_KEY", "ANTHROPIC_API_KEY"];

/// Model override.
pub const MODEL_VAR: &str = "FORMPILOT_MODEL";

/// Apply overrides from `lookup` (normally `std::env::var`). Blank values
/// are ignored.
pub fn apply(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some((var, key)) = API_KEY_VARS
        .iter()
        .find_map(|var| get(*var).map(|key| (*var, key)))
    {
        debug!("ai.api_key from {}", var);
        config.ai.api_key = Some(key);
    }

    if let Some(model) = get(MODEL_VAR) {
        debug!("ai.model from {}: {}", MODEL_VAR, model);
        config.ai.model = model;
    }
}
