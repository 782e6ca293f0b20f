//! Conversation-to-journal reconciliation.
//!
//! After a conversation ends, [`ReconciliationEngine::reconcile`] merges its
//! evidence into the user's records: cautiously into [`LongTermContext`]
//! (only explicit, significant, plausibly recurring signal), freely into the
//! session [`ChatJournal`]. A failed or invalid generation returns both
//! inputs unchanged — a reconciliation can never lose data.

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::gateway::{GenerationRequest, TextGenerationGateway};
use crate::schema::{ChatJournal, ConversationTurn, LongTermContext};
use crate::{json_schema_for, prompt, validate};

use super::{EngineConfig, FailureKind, ResultSource, call_gateway};

/// Model output payload for the reconciliation flow.
#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct ReconcilePayload {
    updated_user_context: LongTermContext,
    updated_chat_journal: ChatJournal,
}

/// Result of one reconciliation: replacement snapshots plus provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub long_term: LongTermContext,
    pub chat_journal: ChatJournal,
    pub source: ResultSource,
}

/// Merges finished conversations into the user's context records.
pub struct ReconciliationEngine<'a, G> {
    gateway: &'a G,
    config: EngineConfig,
}

impl<'a, G: TextGenerationGateway> ReconciliationEngine<'a, G> {
    pub fn new(gateway: &'a G, config: EngineConfig) -> Self {
        Self { gateway, config }
    }

    /// Reconcile a conversation into the current records.
    ///
    /// `history` must be in chronological order. An empty history is legal
    /// and returns the inputs untouched without a gateway call. Aside from
    /// that one call, this is pure: the inputs are never mutated, and the
    /// same inputs with the same gateway response produce the same outcome.
    pub async fn reconcile(
        &self,
        history: &[ConversationTurn],
        long_term: &LongTermContext,
        chat_journal: &ChatJournal,
    ) -> ReconcileOutcome {
        if history.is_empty() {
            debug!("Reconcile: empty history, nothing to merge");
            return ReconcileOutcome {
                long_term: long_term.clone(),
                chat_journal: chat_journal.clone(),
                source: ResultSource::Unchanged,
            };
        }

        let request = GenerationRequest {
            system: prompt::RECONCILE_SYSTEM.to_string(),
            user: prompt::render_reconcile(history, long_term, chat_journal),
            schema_name: "ReconcilePayload",
            output_schema: json_schema_for::<ReconcilePayload>(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            model: self.config.model.clone(),
        };

        let fallback = |kind: FailureKind| ReconcileOutcome {
            long_term: long_term.clone(),
            chat_journal: chat_journal.clone(),
            source: ResultSource::Fallback(kind),
        };

        let value = match call_gateway(self.gateway, &self.config, &request).await {
            Ok(value) => value,
            Err(error) => {
                warn!("Reconcile fell back, prior context kept: {error}");
                return fallback(FailureKind::from(&error));
            }
        };

        match validate::decode::<ReconcilePayload>(&value) {
            Ok(payload) => ReconcileOutcome {
                long_term: payload.updated_user_context,
                chat_journal: payload.updated_chat_journal,
                source: ResultSource::Generated,
            },
            Err(error) => {
                warn!("Reconcile output rejected, prior context kept: {error}");
                fallback(FailureKind::from(&error))
            }
        }
    }
}
