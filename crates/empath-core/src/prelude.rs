//! Convenience re-exports for common `empath-core` types.
//!
//! Meant to be glob-imported by the session layer:
//!
//! ```ignore
//! use empath_core::prelude::*;
//! ```
//!
//! This pulls in the data model, the engines and their config, the gateway
//! seam, and the store. Specialized items (retry config, validation
//! internals, prompt constants) are intentionally excluded — import those
//! from their modules directly when needed.

// ── Data model ──────────────────────────────────────────────────────
pub use crate::schema::{
    ChatJournal, ConversationTurn, JournalEntry, LifeDomains, LongTermContext, Reflection,
    ShortTermContext, TurnRole,
};

// ── Engines ─────────────────────────────────────────────────────────
pub use crate::engine::{
    EngineConfig, FailureKind, ReconcileOutcome, ReconciliationEngine, RectifyOutcome,
    ReflectOutcome, ReflectionEngine, ResultSource, SummarizeOutcome, rectify, summarize_entry,
};

// ── Gateway ─────────────────────────────────────────────────────────
pub use crate::gateway::{
    GatewayError, GenerateFuture, GenerationRequest, OpenRouterGateway, TextGenerationGateway,
};

// ── Persistence ─────────────────────────────────────────────────────
pub use crate::store::{ContextStore, StoreError, UserRecord};

// ── Wire types ──────────────────────────────────────────────────────
pub use crate::{Message, OpenRouterClient, json_schema_for};
