//! Journal-context reconciliation core for an AI-assisted journaling app.
//!
//! `empath-core` is the server-side brain of a mental-health-support chat
//! application. The UI collects conversation turns and journal entries; this
//! crate turns them into durable user context. The core abstraction is a pair
//! of records per user — a slowly-evolving [`LongTermContext`](schema::LongTermContext)
//! and a session-scoped [`ChatJournal`](schema::ChatJournal) — plus the
//! engines that update them by calling a hosted LLM with a structured-output
//! contract:
//!
//! - [`ReconciliationEngine`](engine::reconcile::ReconciliationEngine) merges
//!   a finished conversation into both records, with strict rules about what
//!   may reach long-term memory.
//! - [`ReflectionEngine`](engine::reflect::ReflectionEngine) turns a journal
//!   entry into a four-part user-facing reflection and evolves the long-term
//!   record.
//! - [`rectify`](engine::rectify) applies direct user corrections to the
//!   values/goals summary — user feedback is authoritative and may override.
//! - [`summarize_entry`](engine::summarize) condenses a message into a short
//!   journal title.
//!
//! Every engine call is wrapped in the same fallback discipline: if the model
//! call fails, times out, or returns output that does not validate against
//! the declared schema, the caller gets the prior context back unchanged (or
//! a fixed supportive reflection). A failed call never erases data and never
//! surfaces as an error.
//!
//! # Getting started
//!
//! ```ignore
//! use empath_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     let api_key = std::env::var("OPENROUTER_KEY").unwrap();
//!     let gateway = OpenRouterGateway::new(api_key).unwrap();
//!     let config = EngineConfig::default();
//!
//!     let mut record = UserRecord::default();
//!     let history = vec![
//!         ConversationTurn::user("I skipped the team dinner again."),
//!         ConversationTurn::assistant("What made you decide to skip it?"),
//!     ];
//!
//!     let outcome = ReconciliationEngine::new(&gateway, config)
//!         .reconcile(&history, &record.long_term, &record.chat_journal)
//!         .await;
//!     record.apply_reconciliation(outcome);
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Data model:** [`schema`] — context records, journal entries,
//!   conversation turns. Copy-in/copy-out: engines take snapshots and return
//!   replacements, never mutate shared state.
//! - **Engines:** [`engine`] — the four flows plus
//!   [`EngineConfig`](engine::EngineConfig) (model, timeout, retry) and
//!   [`ResultSource`](engine::ResultSource), which tells the caller whether
//!   an outcome was freshly generated or a fallback.
//! - **Gateway:** [`gateway`] — the
//!   [`TextGenerationGateway`](gateway::TextGenerationGateway) seam the
//!   engines call through, and the OpenRouter-backed implementation.
//! - **Validation:** [`validate`] — JSON-Schema validation of model output;
//!   anything malformed routes to the fallback path.
//! - **Persistence:** [`store`] — [`ContextStore`](store::ContextStore) with
//!   explicit, atomic load/save of one user's record.
//!
//! # Design principles
//!
//! 1. **Long-term memory changes slowly.** Only explicit, significant,
//!    plausibly recurring signal may reach [`LongTermContext`](schema::LongTermContext);
//!    single-session detail belongs in the [`ChatJournal`](schema::ChatJournal),
//!    which is rewritten freely and reset each session.
//! 2. **Failure is never destructive.** Gateway and validation failures
//!    produce fallback outcomes carrying the inputs unchanged. The only
//!    error a caller ever sees is a corrupt snapshot on load.
//! 3. **The model's output is untrusted.** Every response is validated
//!    against the declared schema before it replaces anything; partial or
//!    malformed output is treated exactly like a failed call.
//! 4. **Engines are pure aside from the one call.** Same inputs plus the
//!    same gateway response give the same outputs; prompt assembly is a
//!    pure function of the snapshots.

pub mod engine;
pub mod gateway;
pub mod prelude;
pub mod prompt;
pub mod schema;
pub mod store;
pub mod validate;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// Re-export schemars for downstream crates.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default model for all generation calls.
pub const DEFAULT_MODEL: &str = "z-ai/glm-5";

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. This is the bridge between the strong Rust types
/// in [`schema`] and the schema text the gateway embeds in its instructions
/// (and that [`validate`] checks responses against).
///
/// # Example
///
/// ```
/// use empath_core::json_schema_for;
/// use empath_core::schema::ChatJournal;
///
/// let schema = json_schema_for::<ChatJournal>();
/// assert_eq!(schema["type"], "object");
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body for the OpenRouter API. Only the fields this
/// crate uses — unused optional fields are omitted from serialization.
#[derive(Serialize, Debug, Default)]
pub struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "is_zero_f32")]
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}
fn is_zero_f32(v: &f32) -> bool {
    *v == 0.0
}

/// JSON output format type.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ResponseFormatType {
    #[serde(rename = "json_object")]
    JsonObject,
}

/// JSON output mode. Every flow in this crate requests `json_object`; the
/// declared output schema travels in the system message and is enforced
/// after the fact by [`validate`].
#[derive(Serialize, Debug)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub fmt_type: ResponseFormatType,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            fmt_type: ResponseFormatType::JsonObject,
        }
    }
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message sent to the completions API.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

// ── Response types ─────────────────────────────────────────────────

/// Raw API response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Clean return type from `OpenRouterClient::chat()`.
#[derive(Debug)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the OpenRouter chat completions API.
///
/// This is the transport under [`OpenRouterGateway`](gateway::OpenRouterGateway);
/// engines never see it directly.
pub struct OpenRouterClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) referer: String,
    pub(crate) title: String,
}

impl OpenRouterClient {
    /// Create a new client with the given API key and default headers.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        Self::with_headers(api_key, "https://github.com/empath-core", "empath-core")
    }

    /// Create a new client with custom Referer and X-Title headers.
    pub fn with_headers(
        api_key: impl Into<String>,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("empath-core/0.1")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            referer: referer.into(),
            title: title.into(),
        })
    }

    /// Send a chat completion request.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion, String> {
        debug!(
            "LLM request: model={}, messages={}, max_tokens={}, temp={}",
            body.model.as_deref().unwrap_or("(none)"),
            body.messages.len(),
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(format!("OpenRouter API HTTP {status}: {text}"));
        }

        let parsed: RawChatResponse =
            serde_json::from_str(&text).map_err(|e| format!("failed to parse response: {e}"))?;

        if let Some(err) = parsed.error {
            return Err(format!("OpenRouter API error: {}", err.message));
        }

        if let Some(ref usage) = parsed.usage {
            debug!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
                usage.total_tokens.unwrap_or(0),
            );
        }

        let choice = parsed.choices.and_then(|c| c.into_iter().next());

        match choice {
            Some(c) => {
                debug!(
                    "LLM output: {} chars text",
                    c.message.content.as_ref().map_or(0, |s| s.len())
                );
                Ok(ChatCompletion {
                    content: c.message.content,
                    usage: parsed.usage,
                    finish_reason: c.finish_reason,
                })
            }
            None => {
                debug!("LLM output: empty (no choices)");
                Ok(ChatCompletion {
                    content: None,
                    usage: parsed.usage,
                    finish_reason: None,
                })
            }
        }
    }
}
