//! The text-generation seam the engines call through.
//!
//! [`TextGenerationGateway`] is the one external collaborator of this crate:
//! free-text instructions plus a declared output schema go in, a raw JSON
//! value comes out (or a [`GatewayError`]). Engines treat the gateway as an
//! opaque function — everything about transport, retries, and providers
//! lives behind the trait.
//!
//! [`OpenRouterGateway`] is the production implementation, backed by the
//! [`OpenRouterClient`](crate::OpenRouterClient) in the crate root. Tests
//! drive the engines with scripted gateways instead.

pub mod retry;

use std::future::Future;
use std::pin::Pin;

use crate::{ChatRequest, Message, OpenRouterClient, ResponseFormat};

/// Errors from a generation call.
///
/// Engines never surface these to their callers; every variant routes to
/// the fallback path. The distinction matters only for retry classification
/// and for what gets logged.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// Transport or HTTP-level failure (includes status-code errors).
    #[error("gateway HTTP failure: {0}")]
    Http(String),
    /// The provider returned a well-formed error payload.
    #[error("gateway API error: {0}")]
    Api(String),
    /// The call completed but produced no content.
    #[error("gateway returned empty content")]
    Empty,
    /// The call exceeded the configured timeout.
    #[error("gateway call timed out")]
    Timeout,
    /// The content was not parseable as JSON.
    #[error("gateway output was not valid JSON: {0}")]
    Parse(String),
}

/// Boxed future returned by [`TextGenerationGateway::generate`].
///
/// Type alias to keep trait signatures and implementations readable.
pub type GenerateFuture<'a> =
    Pin<Box<dyn Future<Output = Result<serde_json::Value, GatewayError>> + Send + 'a>>;

/// A fully-assembled generation request.
///
/// Built by pure functions in [`prompt`](crate::prompt) — by the time a
/// request reaches the gateway, all templating decisions are already made.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// System instructions for the flow.
    pub system: String,
    /// The rendered user prompt (context snapshots, history, entry text).
    pub user: String,
    /// Name of the expected output shape, for logging.
    pub schema_name: &'static str,
    /// JSON Schema the output must conform to.
    pub output_schema: serde_json::Value,
    /// Completion token cap.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Model identifier.
    pub model: String,
}

/// Opaque text-generation function: structured instructions in, schema-shaped
/// JSON out.
///
/// Implementors must return `Err` for anything short of usable JSON content —
/// partial success does not exist at this seam.
pub trait TextGenerationGateway: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> GenerateFuture<'_>;
}

// ── OpenRouter implementation ──────────────────────────────────────

/// Production gateway backed by the OpenRouter chat completions API.
///
/// Requests `json_object` output and embeds the declared schema in the
/// system message; the engines validate the result against the same schema
/// afterwards, so a model that ignores the instructions still cannot corrupt
/// a context record.
pub struct OpenRouterGateway {
    client: OpenRouterClient,
}

impl OpenRouterGateway {
    /// Create a gateway with the given OpenRouter API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        Ok(Self {
            client: OpenRouterClient::new(api_key)?,
        })
    }

    /// Wrap an existing client (custom headers, shared connection pool).
    pub fn with_client(client: OpenRouterClient) -> Self {
        Self { client }
    }

    fn system_with_schema(request: &GenerationRequest) -> String {
        format!(
            "{}\n\n## Output format\n\n\
             Respond with a single JSON object and nothing else. \
             The object must conform to this JSON Schema:\n\n{}",
            request.system, request.output_schema
        )
    }
}

impl TextGenerationGateway for OpenRouterGateway {
    fn generate(&self, request: &GenerationRequest) -> GenerateFuture<'_> {
        let body = ChatRequest {
            model: Some(request.model.clone()),
            messages: vec![
                Message::system(Self::system_with_schema(request)),
                Message::user(request.user.as_str()),
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: Some(ResponseFormat::json_object()),
        };
        let schema_name = request.schema_name;
        Box::pin(async move {
            let completion = self.client.chat(&body).await.map_err(classify_client_error)?;
            let content = completion.content.ok_or(GatewayError::Empty)?;
            if content.trim().is_empty() {
                return Err(GatewayError::Empty);
            }
            tracing::debug!(
                "Gateway output for {schema_name}: {} chars",
                content.len()
            );
            parse_json_content(&content)
        })
    }
}

/// Map the client's string errors onto the gateway taxonomy.
fn classify_client_error(error: String) -> GatewayError {
    if error.contains("API error") {
        GatewayError::Api(error)
    } else {
        GatewayError::Http(error)
    }
}

/// Parse model content as JSON, tolerating a Markdown code fence around the
/// object. Anything else is a [`GatewayError::Parse`].
pub fn parse_json_content(content: &str) -> Result<serde_json::Value, GatewayError> {
    let trimmed = content.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    // Models occasionally wrap JSON in a ```json fence despite instructions.
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .map(str::trim);
    if let Some(inner) = unfenced {
        if let Ok(value) = serde_json::from_str(inner) {
            return Ok(value);
        }
    }

    Err(GatewayError::Parse(format!(
        "first {} bytes: {:?}",
        trimmed.len().min(80),
        trimmed.chars().take(80).collect::<String>()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_json() {
        let value = parse_json_content(r#"{"a": 1}"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn parse_fenced_json() {
        let value = parse_json_content("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(value["a"], 1);

        let value = parse_json_content("```\n{\"b\": 2}\n```").unwrap();
        assert_eq!(value["b"], 2);
    }

    #[test]
    fn parse_garbage_is_parse_error() {
        let err = parse_json_content("I'm sorry, I can't do that.").unwrap_err();
        assert!(matches!(err, GatewayError::Parse(_)));
    }

    #[test]
    fn classify_api_vs_http() {
        assert!(matches!(
            classify_client_error("OpenRouter API error: overloaded".into()),
            GatewayError::Api(_)
        ));
        assert!(matches!(
            classify_client_error("OpenRouter API HTTP 502: bad gateway".into()),
            GatewayError::Http(_)
        ));
    }

    #[test]
    fn system_message_embeds_schema() {
        let request = GenerationRequest {
            system: "You are a test.".into(),
            user: "hi".into(),
            schema_name: "Test",
            output_schema: serde_json::json!({"type": "object"}),
            max_tokens: 64,
            temperature: 0.2,
            model: "test-model".into(),
        };
        let system = OpenRouterGateway::system_with_schema(&request);
        assert!(system.starts_with("You are a test."));
        assert!(system.contains("## Output format"));
        assert!(system.contains("\"type\""));
    }
}
