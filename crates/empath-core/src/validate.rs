//! Schema validation and typed decoding of model output.
//!
//! Model output is untrusted input. Before a response can replace a context
//! record or reach the user, it is validated against the JSON Schema derived
//! from the target Rust type, then deserialized. Engines add per-flow
//! semantic checks on top (e.g. suggestion arity) — anything that fails at
//! any of these stages routes to the fallback path, never to the caller.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use crate::json_schema_for;

/// Why a model response was rejected.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    /// The response does not conform to the declared JSON Schema.
    #[error("schema validation failed:\n{}", .errors.join("\n"))]
    Schema { errors: Vec<String> },
    /// The response passed schema validation but failed to deserialize.
    #[error("decode failed: {0}")]
    Decode(String),
    /// The response is well-formed but violates a flow-level rule.
    #[error("semantic check failed: {0}")]
    Semantic(String),
}

/// Validate `value` against the schema for `T`, then deserialize it.
///
/// Error strings carry the instance path of each violation so the rejection
/// is diagnosable from logs alone.
pub fn decode<T: DeserializeOwned + JsonSchema>(
    value: &serde_json::Value,
) -> Result<T, ValidationError> {
    let schema = json_schema_for::<T>();

    if let Ok(validator) = jsonschema::validator_for(&schema) {
        let errors: Vec<String> = validator
            .iter_errors(value)
            .map(|e| format!("  - {}: {e}", e.instance_path()))
            .collect();
        if !errors.is_empty() {
            return Err(ValidationError::Schema { errors });
        }
    }
    // If the schema itself failed to compile, fall through to serde — the
    // derive and the validator are generated from the same type, so this
    // only happens for a schemars/jsonschema incompatibility, not bad data.

    serde_json::from_value(value.clone()).map_err(|e| ValidationError::Decode(e.to_string()))
}

/// Check that a suggestions list has 1–2 items, none of them blank.
///
/// The JSON Schema alone cannot express "one or two non-empty strings", so
/// the reflection flow enforces it here.
pub fn check_suggestions(suggestions: &[String]) -> Result<(), ValidationError> {
    if suggestions.is_empty() || suggestions.len() > 2 {
        return Err(ValidationError::Semantic(format!(
            "expected 1-2 suggestions, got {}",
            suggestions.len()
        )));
    }
    if suggestions.iter().any(|s| s.trim().is_empty()) {
        return Err(ValidationError::Semantic("blank suggestion".into()));
    }
    Ok(())
}
