//! User-authoritative correction of the values/goals summary.
//!
//! Unlike every other flow, [`rectify`] has no long-term caution rule: the
//! user is correcting the record about themselves, and their feedback may
//! override prior text outright. The fallback concatenates the feedback onto
//! the current text, so a correction is never silently dropped even when
//! generation fails.

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::warn;

use crate::gateway::{GenerationRequest, TextGenerationGateway};
use crate::{json_schema_for, prompt, validate};

use super::{EngineConfig, FailureKind, ResultSource, call_gateway};

/// Model output payload for the rectification flow.
#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct RectifyPayload {
    updated_values: String,
}

/// Result of one rectification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RectifyOutcome {
    pub values: String,
    pub source: ResultSource,
}

/// Rewrite the values/goals summary to integrate the user's feedback.
pub async fn rectify<G: TextGenerationGateway>(
    gateway: &G,
    config: &EngineConfig,
    current_values: &str,
    user_feedback: &str,
) -> RectifyOutcome {
    let request = GenerationRequest {
        system: prompt::RECTIFY_SYSTEM.to_string(),
        user: prompt::render_rectify(current_values, user_feedback),
        schema_name: "RectifyPayload",
        output_schema: json_schema_for::<RectifyPayload>(),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        model: config.model.clone(),
    };

    let fallback = |kind: FailureKind| RectifyOutcome {
        values: format!("{current_values}\n\nUser Feedback: {user_feedback}"),
        source: ResultSource::Fallback(kind),
    };

    let value = match call_gateway(gateway, config, &request).await {
        Ok(value) => value,
        Err(error) => {
            warn!("Rectify fell back to appending feedback: {error}");
            return fallback(FailureKind::from(&error));
        }
    };

    match validate::decode::<RectifyPayload>(&value) {
        Ok(payload) => RectifyOutcome {
            values: payload.updated_values,
            source: ResultSource::Generated,
        },
        Err(error) => {
            warn!("Rectify output rejected, appending feedback instead: {error}");
            fallback(FailureKind::from(&error))
        }
    }
}
