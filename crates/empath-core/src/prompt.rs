//! Prompt assembly for the four generation flows.
//!
//! Everything here is a pure function of the snapshots: context in, strings
//! out. No behavioral branching hides in the templates — a first entry and a
//! populated one render different sections, but the engines treat both the
//! same way. [`PromptBuilder`] replaces manual string concatenation with
//! named sections that are silently skipped when empty.

use crate::schema::{ChatJournal, ConversationTurn, LongTermContext, ShortTermContext};

// ── Builder ────────────────────────────────────────────────────────

/// Builder for multi-section prompts.
///
/// Sections are joined with double newlines and rendered with `## ` headings.
/// Sections with empty content are skipped.
///
/// # Example
///
/// ```
/// use empath_core::prompt::PromptBuilder;
///
/// let prompt = PromptBuilder::new("A conversation has just concluded.")
///     .section("History", "user: hi")
///     .section("Empty", "")
///     .build();
///
/// assert!(prompt.contains("## History"));
/// assert!(!prompt.contains("## Empty"));
/// ```
pub struct PromptBuilder {
    sections: Vec<String>,
}

impl PromptBuilder {
    /// Create a new builder with an initial preamble (no heading).
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            sections: vec![preamble.into()],
        }
    }

    /// Append a named section. Skipped if `content` is empty.
    pub fn section(mut self, heading: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections.push(format!("## {heading}\n\n{content}"));
        }
        self
    }

    /// Append raw text with no heading. Skipped if empty.
    pub fn raw(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections.push(content);
        }
        self
    }

    /// Join all sections into the final prompt.
    pub fn build(self) -> String {
        self.sections.join("\n\n")
    }
}

// ── System instructions ────────────────────────────────────────────

/// System instructions for the reconciliation flow.
///
/// Carries the three merge rules: long-term caution (only significant,
/// plausibly recurring signal), short-term latitude (session notes are
/// rewritten freely), and non-destructive synthesis (evolve, never discard).
pub const RECONCILE_SYSTEM: &str = "\
You are an analytical psychologist AI. You maintain a user's journal, split \
into a long-term user context and a short-term chat journal. Your analysis \
must be clinical, objective, and insightful.

Guiding principles:
1. Synthesize and evolve. Never simply replace information — integrate new \
insights from the latest conversation into the existing notes so the \
profile evolves over time.
2. Differentiate the two contexts. The user context is the enduring profile \
and should change slowly: only add significant, recurring themes, traits, \
or problems that are clearly established. Never add fleeting details from a \
single chat. The chat journal covers the current conversation only: update \
it freely to reflect the immediate discussion, the strategies covered, and \
progress made within this session.
3. Use objective, third-person clinical language (\"The user expresses...\", \
\"A pattern of avoidance was noted...\").

Process: review the full conversation history, compare it against the \
current user context and chat journal, then produce both updated records. \
When noting recurring problems, qualify intensity, frequency, or duration \
when the user gives enough information. Summarize and infer patterns (e.g. \
several avoided social events suggest possible social avoidance). If the \
conversation reveals no new long-term insight, return the current user \
context fields unchanged — never blank them.";

/// System instructions for the journal-reflection flow.
pub const REFLECT_SYSTEM: &str = "\
You are an AI therapist inside a journaling app. You integrate the user's \
long-term context (personality, recurring issues, values, history) with \
their short-term entry (current mood, events, concerns, coping attempts) to \
produce a personalized, empathetic, practical reflection.

Reasoning process:
1. Review the new entry, then the existing long-term context.
2. Identify links between today's events and long-term patterns — does \
today's work stress connect to a recurring perfectionism theme? Did a \
coping attempt align with a stated goal?
3. Subtly update the long-term context: a significant new stressor joins \
the recurring problems; a newly shown strength joins the personality \
traits. Evolve it — never rewrite it wholesale.
4. Tailor suggestions to the user's personality and history. Acknowledge \
resilience where you see it; offer grounding where you see anxiety.
5. Highlight growth whenever the user handled a trigger better than before.

Response structure (the reflection object):
- summary: a short, empathetic restatement of today's experience.
- connection: an explicit link to long-term patterns or goals (\"This seems \
to connect to the pattern of...\"). On a first entry, say you are just \
getting to know them.
- insight: one personalized insight or gentle reframe.
- suggestions: 1-2 small, realistic next steps aligned with their goals.

Keep reflections concise but meaningful, never generic. Balance empathy \
(\"That sounds incredibly tough...\") with practical guidance (\"For \
tomorrow, perhaps you could try...\").";

/// System instructions for the values-rectification flow. User feedback is
/// authoritative here — there is no caution rule.
pub const RECTIFY_SYSTEM: &str = "\
You are an analytical AI assistant maintaining the values-and-goals section \
of a user's long-term journal. The user has given direct feedback on your \
current understanding. Read the current summary, read the corrections, and \
rewrite the section so it accurately integrates the feedback. Merge the \
corrections logically and keep the text clear and structured — do not just \
append the feedback; produce a cohesive, comprehensive rewrite. The user's \
stated corrections always win over the prior text.";

/// System instructions for the entry-title summarization flow.
pub const SUMMARIZE_SYSTEM: &str = "\
You summarize a user's message into a concise journal entry title of no \
more than 20 words. Output only the summary.";

// ── Rendering ──────────────────────────────────────────────────────

fn render_long_term(ctx: &LongTermContext) -> String {
    format!(
        "Core Themes: {}\n\
         Life Domains:\n\
         - Business: {}\n\
         - Relationships: {}\n\
         - Family: {}\n\
         - Health: {}\n\
         - Finances: {}\n\
         - Personal Growth: {}\n\
         Personality Traits: {}\n\
         Recurring Problems / Stressors: {}\n\
         Values / Goals: {}\n\
         Mood History: {}",
        ctx.core_themes,
        ctx.life_domains.business,
        ctx.life_domains.relationships,
        ctx.life_domains.family,
        ctx.life_domains.health,
        ctx.life_domains.finances,
        ctx.life_domains.personal_growth,
        ctx.personality_traits,
        ctx.recurring_problems,
        ctx.values,
        ctx.mood_history,
    )
}

fn render_history(history: &[ConversationTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the user prompt for [`reconcile`](crate::engine::reconcile):
/// both current snapshots plus the full history, in chronological order.
pub fn render_reconcile(
    history: &[ConversationTurn],
    long_term: &LongTermContext,
    chat_journal: &ChatJournal,
) -> String {
    PromptBuilder::new(
        "A conversation has just concluded. Here is the full history and the \
         current state of the journals.",
    )
    .section("Current User Context (Long-Term)", render_long_term(long_term))
    .section(
        "Current Chat Journal (This Session)",
        format!(
            "Suggested Solutions: {}\nProgress Summary: {}",
            chat_journal.suggested_solutions, chat_journal.progress_summary
        ),
    )
    .section("Full Conversation History", render_history(history))
    .raw(
        "Analyze the conversation and generate the updated user context and \
         chat journal with a clinical and analytical approach.",
    )
    .build()
}

/// Render the user prompt for [`reflect`](crate::engine::reflect). An absent
/// `long_term` renders as a first-entry notice rather than an empty section.
pub fn render_reflect(
    short_term: &ShortTermContext,
    long_term: Option<&LongTermContext>,
) -> String {
    let long_term_section = match long_term {
        Some(ctx) => render_long_term(ctx),
        None => "This is the user's first journal entry.".to_string(),
    };
    PromptBuilder::new(
        "A user has submitted a new journal entry. Here is their historical \
         context and their entry for today.",
    )
    .section("Long-Term Context (Previous)", long_term_section)
    .section(
        "Short-Term Context (Today's Entry)",
        format!(
            "Current Mood: {}\n\
             Recent Events/Triggers: {}\n\
             Current Concerns: {}\n\
             Coping Attempts: {}",
            short_term.mood, short_term.events, short_term.concerns, short_term.coping_attempts
        ),
    )
    .raw(
        "Analyze both contexts, generate an updated long-term context, and \
         create a personalized reflection for the user.",
    )
    .build()
}

/// Render the user prompt for [`rectify`](crate::engine::rectify).
pub fn render_rectify(current_values: &str, user_feedback: &str) -> String {
    PromptBuilder::new(
        "Here is the current values-and-goals summary and the user's feedback.",
    )
    .section("Current Values & Goals", current_values)
    .section("User's Corrective Feedback", user_feedback)
    .raw("Generate the updated values-and-goals summary.")
    .build()
}

/// Render the user prompt for [`summarize_entry`](crate::engine::summarize).
pub fn render_summarize(query: &str) -> String {
    format!("User message:\n\n{query}")
}
