//! Journal-title summarization.
//!
//! Condenses a user message into a short (≤20 words) title for the journal
//! list. The stakes are low, so the fallback is mechanical: the first 100
//! characters of the message.

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::warn;

use crate::gateway::{GenerationRequest, TextGenerationGateway};
use crate::{json_schema_for, prompt, validate};

use super::{EngineConfig, FailureKind, ResultSource, call_gateway};

/// Model output payload for the summarization flow.
#[derive(Deserialize, JsonSchema)]
struct SummarizePayload {
    summary: String,
}

/// Result of one summarization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizeOutcome {
    pub summary: String,
    pub source: ResultSource,
}

/// Truncation fallback: first 100 characters of the query.
fn truncated(query: &str) -> String {
    if query.chars().count() > 100 {
        let head: String = query.chars().take(100).collect();
        format!("{head}...")
    } else {
        query.to_string()
    }
}

/// Summarize a user message into a concise journal title.
pub async fn summarize_entry<G: TextGenerationGateway>(
    gateway: &G,
    config: &EngineConfig,
    query: &str,
) -> SummarizeOutcome {
    let request = GenerationRequest {
        system: prompt::SUMMARIZE_SYSTEM.to_string(),
        user: prompt::render_summarize(query),
        schema_name: "SummarizePayload",
        output_schema: json_schema_for::<SummarizePayload>(),
        max_tokens: 256,
        temperature: config.temperature,
        model: config.model.clone(),
    };

    let fallback = |kind: FailureKind| SummarizeOutcome {
        summary: truncated(query),
        source: ResultSource::Fallback(kind),
    };

    let value = match call_gateway(gateway, config, &request).await {
        Ok(value) => value,
        Err(error) => {
            warn!("Summarize fell back to truncation: {error}");
            return fallback(FailureKind::from(&error));
        }
    };

    match validate::decode::<SummarizePayload>(&value) {
        Ok(payload) if !payload.summary.trim().is_empty() => SummarizeOutcome {
            summary: payload.summary,
            source: ResultSource::Generated,
        },
        Ok(_) => {
            warn!("Summarize returned a blank summary, truncating instead");
            fallback(FailureKind::Validation)
        }
        Err(error) => {
            warn!("Summarize output rejected, truncating instead: {error}");
            fallback(FailureKind::from(&error))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedGateway;

    #[tokio::test]
    async fn success_returns_model_summary() {
        let gateway = ScriptedGateway::always(serde_json::json!({
            "summary": "Worried about tomorrow's exam",
        }));
        let outcome = summarize_entry(
            &gateway,
            &EngineConfig::default(),
            "I have an exam tomorrow and I can't stop worrying about it",
        )
        .await;
        assert_eq!(outcome.source, ResultSource::Generated);
        assert_eq!(outcome.summary, "Worried about tomorrow's exam");
    }

    #[tokio::test]
    async fn failure_truncates_short_query_verbatim() {
        let gateway = ScriptedGateway::failing();
        let outcome = summarize_entry(&gateway, &EngineConfig::default(), "short note").await;
        assert!(outcome.source.is_fallback());
        assert_eq!(outcome.summary, "short note");
    }

    #[tokio::test]
    async fn failure_truncates_long_query_to_100_chars() {
        let gateway = ScriptedGateway::failing();
        let query = "a".repeat(250);
        let outcome = summarize_entry(&gateway, &EngineConfig::default(), &query).await;
        assert_eq!(outcome.summary.chars().count(), 103);
        assert!(outcome.summary.ends_with("..."));
    }

    #[tokio::test]
    async fn blank_summary_rejected() {
        let gateway = ScriptedGateway::always(serde_json::json!({"summary": "   "}));
        let outcome = summarize_entry(&gateway, &EngineConfig::default(), "note").await;
        assert_eq!(
            outcome.source,
            ResultSource::Fallback(FailureKind::Validation)
        );
        assert_eq!(outcome.summary, "note");
    }
}
