//! Engines: the four generation flows and their shared fallback policy.
//!
//! - [`reconcile::ReconciliationEngine`] — merge a conversation into the
//!   long-term/short-term records.
//! - [`reflect::ReflectionEngine`] — reflect on a journal entry and evolve
//!   the long-term record.
//! - [`rectify`] — user-authoritative rewrite of the values summary.
//! - [`summarize`] — condense a message into a journal title.
//!
//! Every flow follows the same shape: build the request from snapshots, make
//! one gateway call (with timeout and optional retry), validate the output,
//! and on any failure return a safe substitute instead of an error. The
//! caller can tell the two apart through [`ResultSource`], but is never
//! handed a broken or partial record.

pub mod reconcile;
pub mod rectify;
pub mod reflect;
pub mod summarize;

use std::time::Duration;

use crate::DEFAULT_MODEL;
use crate::gateway::retry::{self, RetryConfig};
use crate::gateway::{GatewayError, GenerationRequest, TextGenerationGateway};
use crate::validate::ValidationError;

pub use reconcile::{ReconcileOutcome, ReconciliationEngine};
pub use rectify::{RectifyOutcome, rectify};
pub use reflect::{ReflectOutcome, ReflectionEngine};
pub use summarize::{SummarizeOutcome, summarize_entry};

// ── Configuration ──────────────────────────────────────────────────

/// Shared configuration for all engine flows.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Model identifier passed to the gateway.
    pub model: String,
    /// Completion token cap per call.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Per-call deadline. An elapsed deadline is treated exactly like any
    /// other gateway failure. There is no cancellation beyond this.
    pub call_timeout: Duration,
    /// Retry policy for transient gateway failures.
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 2048,
            temperature: 0.4,
            call_timeout: Duration::from_secs(60),
            retry: RetryConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

// ── Fallback policy surface ────────────────────────────────────────

/// The class of failure that triggered a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The gateway call failed, timed out, or produced no usable JSON.
    Gateway,
    /// The gateway produced JSON that does not conform to the flow's schema.
    Validation,
}

/// Where an outcome came from.
///
/// Each call starts in the normal state; a failure degrades that one call
/// only and is surfaced here so the UI can show a generic notice. Nothing
/// persists across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    /// Freshly generated and validated model output.
    Generated,
    /// The inputs required no call (e.g. empty history) and were returned
    /// unchanged.
    Unchanged,
    /// The call failed; the outcome carries the safe substitute.
    Fallback(FailureKind),
}

impl ResultSource {
    /// True when the outcome is a fallback substitute.
    pub fn is_fallback(&self) -> bool {
        matches!(self, ResultSource::Fallback(_))
    }
}

impl From<&GatewayError> for FailureKind {
    fn from(error: &GatewayError) -> Self {
        match error {
            // Unparseable content is a malformed response, not a transport
            // problem.
            GatewayError::Parse(_) => FailureKind::Validation,
            _ => FailureKind::Gateway,
        }
    }
}

impl From<&ValidationError> for FailureKind {
    fn from(_: &ValidationError) -> Self {
        FailureKind::Validation
    }
}

// ── Shared call path ───────────────────────────────────────────────

/// Make one gateway call with the configured timeout, retrying transient
/// failures per the retry policy.
pub(crate) async fn call_gateway<G: TextGenerationGateway>(
    gateway: &G,
    config: &EngineConfig,
    request: &GenerationRequest,
) -> Result<serde_json::Value, GatewayError> {
    let mut attempt = 0u32;
    loop {
        let result = match tokio::time::timeout(config.call_timeout, gateway.generate(request))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= config.retry.max_retries || !retry::is_transient(&error) {
                    return Err(error);
                }
                let delay = config.retry.delay_for_attempt(attempt);
                tracing::debug!(
                    "Transient gateway failure for {} (attempt {}): {error}; retrying in {:?}",
                    request.schema_name,
                    attempt + 1,
                    delay,
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

// ── Test support ───────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::gateway::{GatewayError, GenerateFuture, GenerationRequest, TextGenerationGateway};

    /// Gateway that replays a scripted queue of responses.
    pub struct ScriptedGateway {
        responses: Mutex<VecDeque<Result<serde_json::Value, GatewayError>>>,
        pub calls: AtomicUsize,
        pub last_user_prompt: Mutex<Option<String>>,
    }

    impl ScriptedGateway {
        pub fn new(responses: Vec<Result<serde_json::Value, GatewayError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
                last_user_prompt: Mutex::new(None),
            }
        }

        /// Gateway whose every call succeeds with `value`.
        pub fn always(value: serde_json::Value) -> Self {
            Self::new(vec![Ok(value)])
        }

        /// Gateway whose every call fails with a transport error.
        pub fn failing() -> Self {
            Self::new(vec![])
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TextGenerationGateway for ScriptedGateway {
        fn generate(&self, request: &GenerationRequest) -> GenerateFuture<'_> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_user_prompt.lock().unwrap() = Some(request.user.clone());
            let next = self.responses.lock().unwrap().pop_front();
            Box::pin(async move {
                match next {
                    Some(result) => result,
                    None => Err(GatewayError::Http("request failed: scripted outage".into())),
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testing::ScriptedGateway;

    fn request() -> GenerationRequest {
        GenerationRequest {
            system: "sys".into(),
            user: "user".into(),
            schema_name: "Test",
            output_schema: serde_json::json!({"type": "object"}),
            max_tokens: 64,
            temperature: 0.2,
            model: "test-model".into(),
        }
    }

    fn fast_retry(retries: u32) -> EngineConfig {
        EngineConfig::default().with_retry(RetryConfig {
            max_retries: retries,
            initial_delay: Duration::from_millis(1),
            jitter: false,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn call_succeeds_first_try() {
        let gateway = ScriptedGateway::always(serde_json::json!({"ok": true}));
        let value = call_gateway(&gateway, &EngineConfig::default(), &request())
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn transient_failure_retried_then_succeeds() {
        let gateway = ScriptedGateway::new(vec![
            Err(GatewayError::Http("OpenRouter API HTTP 503: busy".into())),
            Ok(serde_json::json!({"ok": true})),
        ]);
        let value = call_gateway(&gateway, &fast_retry(2), &request())
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(gateway.call_count(), 2);
    }

    #[tokio::test]
    async fn permanent_failure_not_retried() {
        let gateway = ScriptedGateway::new(vec![Err(GatewayError::Api("overloaded".into()))]);
        let err = call_gateway(&gateway, &fast_retry(3), &request())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Api(_)));
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn retries_exhausted() {
        let gateway = ScriptedGateway::new(vec![
            Err(GatewayError::Http("request failed: timed out".into())),
            Err(GatewayError::Http("request failed: timed out".into())),
            Err(GatewayError::Http("request failed: timed out".into())),
        ]);
        let err = call_gateway(&gateway, &fast_retry(2), &request())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Http(_)));
        assert_eq!(gateway.call_count(), 3);
    }

    #[test]
    fn failure_kind_mapping() {
        assert_eq!(
            FailureKind::from(&GatewayError::Parse("x".into())),
            FailureKind::Validation
        );
        assert_eq!(
            FailureKind::from(&GatewayError::Timeout),
            FailureKind::Gateway
        );
        assert!(ResultSource::Fallback(FailureKind::Gateway).is_fallback());
        assert!(!ResultSource::Generated.is_fallback());
    }
}
