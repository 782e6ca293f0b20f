//! Journal-entry reflection.
//!
//! [`ReflectionEngine::reflect`] turns a user's short-form entry into a
//! four-part reflection and evolves the long-term record under the same
//! caution rules as reconciliation. A missing long-term context means a
//! first-ever entry, not an error. Under total gateway failure the caller
//! still receives a well-formed outcome: a fixed supportive reflection and
//! the prior context unchanged.

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::warn;

use crate::gateway::{GenerationRequest, TextGenerationGateway};
use crate::schema::{LongTermContext, Reflection, ShortTermContext};
use crate::{json_schema_for, prompt, validate};

use super::{EngineConfig, FailureKind, ResultSource, call_gateway};

/// Model output payload for the reflection flow.
#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct ReflectPayload {
    reflection: Reflection,
    updated_long_term_context: LongTermContext,
}

/// Result of one reflection: user-facing content plus the evolved record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectOutcome {
    pub reflection: Reflection,
    pub long_term: LongTermContext,
    pub source: ResultSource,
}

/// The generic supportive reflection returned when generation fails.
/// Deliberately recognizable as fallback copy.
fn fallback_reflection() -> Reflection {
    Reflection {
        summary: "Thank you for sharing your thoughts today.".into(),
        connection: "I am still learning about your long-term patterns.".into(),
        insight: "Journaling is a great step towards self-awareness.".into(),
        suggestions: vec![
            "Take a moment for a few deep breaths.".into(),
            "Be kind to yourself today.".into(),
        ],
    }
}

/// Produces personalized reflections on journal entries.
pub struct ReflectionEngine<'a, G> {
    gateway: &'a G,
    config: EngineConfig,
}

impl<'a, G: TextGenerationGateway> ReflectionEngine<'a, G> {
    pub fn new(gateway: &'a G, config: EngineConfig) -> Self {
        Self { gateway, config }
    }

    /// Reflect on a new entry.
    ///
    /// `long_term` is `None` for a first entry. The outcome always carries a
    /// complete reflection and a complete long-term context — on failure the
    /// reflection is the fixed fallback and the context is the input
    /// unchanged (or an all-blank record if there was none).
    pub async fn reflect(
        &self,
        short_term: &ShortTermContext,
        long_term: Option<&LongTermContext>,
    ) -> ReflectOutcome {
        let request = GenerationRequest {
            system: prompt::REFLECT_SYSTEM.to_string(),
            user: prompt::render_reflect(short_term, long_term),
            schema_name: "ReflectPayload",
            output_schema: json_schema_for::<ReflectPayload>(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            model: self.config.model.clone(),
        };

        let fallback = |kind: FailureKind| ReflectOutcome {
            reflection: fallback_reflection(),
            long_term: long_term.cloned().unwrap_or_default(),
            source: ResultSource::Fallback(kind),
        };

        let value = match call_gateway(self.gateway, &self.config, &request).await {
            Ok(value) => value,
            Err(error) => {
                warn!("Reflection fell back to generic copy: {error}");
                return fallback(FailureKind::from(&error));
            }
        };

        let payload = match validate::decode::<ReflectPayload>(&value) {
            Ok(payload) => payload,
            Err(error) => {
                warn!("Reflection output rejected: {error}");
                return fallback(FailureKind::from(&error));
            }
        };

        if let Err(error) = validate::check_suggestions(&payload.reflection.suggestions) {
            warn!("Reflection output rejected: {error}");
            return fallback(FailureKind::from(&error));
        }

        ReflectOutcome {
            reflection: payload.reflection,
            long_term: payload.updated_long_term_context,
            source: ResultSource::Generated,
        }
    }
}
