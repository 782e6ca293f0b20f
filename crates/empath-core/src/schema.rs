//! Data model: context records, journal entries, conversation turns.
//!
//! These types are the whole contract between the engines and their callers.
//! Engines receive snapshots and return replacement snapshots — nothing in
//! this module is shared or internally mutable. Serde names are camelCase to
//! match the JSON the journaling app has always persisted, and the same
//! derives feed [`json_schema_for`](crate::json_schema_for) so the model's
//! output schema and the Rust types can never drift apart.
//!
//! Two records with very different lifetimes:
//!
//! - [`LongTermContext`] is durable and evolves slowly; fields are merged
//!   into, never wholesale replaced (except `values` via the
//!   user-authoritative [`rectify`](crate::engine::rectify) flow).
//! - [`ChatJournal`] is session-scoped, rewritten freely, and reset on every
//!   new conversation.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ── Long-term record ───────────────────────────────────────────────

/// Per-domain notes within a user's long-term context. Each domain stays
/// blank until conversations actually touch it.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LifeDomains {
    /// Notes on the user's business and career life.
    pub business: String,
    /// Notes on the user's romantic and social relationships.
    pub relationships: String,
    /// Notes on the user's family life.
    pub family: String,
    /// Notes on the user's physical and mental health.
    pub health: String,
    /// Notes on the user's financial situation.
    pub finances: String,
    /// Notes on the user's personal growth journey.
    pub personal_growth: String,
}

/// The durable, slowly-evolving profile of one user.
///
/// Invariant: fields are evolved, never replaced. A session that surfaces no
/// new durable signal must leave every field byte-for-byte unchanged — the
/// engines enforce this by falling back to the input snapshot whenever the
/// model call fails or its output does not validate.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LongTermContext {
    /// High-level summary of the core themes in the user's life.
    pub core_themes: String,
    /// Detailed notes on specific areas of the user's life.
    ///
    /// Older persisted records may lack this field entirely; it reads as
    /// all-blank rather than failing.
    #[serde(default)]
    pub life_domains: LifeDomains,
    /// Core personality traits observed across all conversations.
    pub personality_traits: String,
    /// Main long-term challenges and recurring stressors, qualified by
    /// intensity, frequency, or duration where known.
    pub recurring_problems: String,
    /// Core values and life goals.
    pub values: String,
    /// Mood patterns and significant milestones over time.
    pub mood_history: String,
}

// ── Session record ─────────────────────────────────────────────────

/// Session-scoped notes for the current conversation.
///
/// Reset on every new conversation; never merged across sessions.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatJournal {
    /// Potential solutions or coping strategies discussed in the current chat.
    pub suggested_solutions: String,
    /// Assessment of the user's progress within the current chat session.
    pub progress_summary: String,
}

// ── Journal entries ────────────────────────────────────────────────

/// A user's short-form journal submission: four free-text fields, all of
/// which may be empty but must be present.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShortTermContext {
    /// Current mood.
    pub mood: String,
    /// Recent events or triggers.
    pub events: String,
    /// Current concerns.
    pub concerns: String,
    /// What the user has tried so far.
    pub coping_attempts: String,
}

/// The four-part reflection returned to the user for a journal entry.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reflection {
    /// Short, empathetic restatement of what the user experienced.
    pub summary: String,
    /// Explicit link to long-term patterns or goals (or to their absence on
    /// a first entry).
    pub connection: String,
    /// One personalized insight or gentle reframe.
    pub insight: String,
    /// 1–2 small, actionable suggestions.
    pub suggestions: Vec<String>,
}

/// One entry in the user's append-only journal log.
///
/// Immutable after creation. The `reflection` is set exactly once, at
/// creation time — the fallback path still sets one, so a stored entry is
/// never missing its reflection for lack of model output.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: String,
    pub date: DateTime<Utc>,
    pub short_term: ShortTermContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reflection: Option<Reflection>,
}

impl JournalEntry {
    /// Create a new entry with a fresh id, stamped now.
    pub fn new(short_term: ShortTermContext, reflection: Option<Reflection>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            date: Utc::now(),
            short_term,
            reflection,
        }
    }
}

// ── Conversation turns ─────────────────────────────────────────────

/// Speaker of a conversation turn.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// One turn of a conversation, consumed read-only by reconciliation.
/// Turns must be supplied in chronological order within a session.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_term_context_round_trips_camel_case() {
        let mut ctx = LongTermContext::default();
        ctx.core_themes = "career pressure".into();
        ctx.life_domains.personal_growth = "started journaling".into();

        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["coreThemes"], "career pressure");
        assert_eq!(json["lifeDomains"]["personalGrowth"], "started journaling");

        let back: LongTermContext = serde_json::from_value(json).unwrap();
        assert_eq!(back, ctx);
    }

    #[test]
    fn long_term_context_missing_life_domains_reads_as_blank() {
        // Older persisted records predate the lifeDomains split.
        let json = serde_json::json!({
            "coreThemes": "t",
            "personalityTraits": "p",
            "recurringProblems": "r",
            "values": "v",
            "moodHistory": "m",
        });
        let ctx: LongTermContext = serde_json::from_value(json).unwrap();
        assert_eq!(ctx.life_domains, LifeDomains::default());
        assert_eq!(ctx.core_themes, "t");
    }

    #[test]
    fn long_term_context_missing_required_field_fails() {
        let json = serde_json::json!({
            "coreThemes": "t",
            "personalityTraits": "p",
            "recurringProblems": "r",
            "values": "v",
            // moodHistory absent
        });
        assert!(serde_json::from_value::<LongTermContext>(json).is_err());
    }

    #[test]
    fn journal_entry_gets_unique_ids() {
        let a = JournalEntry::new(ShortTermContext::default(), None);
        let b = JournalEntry::new(ShortTermContext::default(), None);
        assert_ne!(a.id, b.id);
        assert!(a.reflection.is_none());
    }

    #[test]
    fn journal_entry_skips_absent_reflection() {
        let entry = JournalEntry::new(ShortTermContext::default(), None);
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("reflection").is_none());
    }

    #[test]
    fn turn_role_serializes_lowercase() {
        let turn = ConversationTurn::user("hello");
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(TurnRole::Assistant.to_string(), "assistant");
    }
}
