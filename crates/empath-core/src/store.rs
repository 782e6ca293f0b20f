//! Per-user context records and their persistence.
//!
//! [`ContextStore`] owns the durable state for users of the journaling app:
//! one [`UserRecord`] per user, saved as a single JSON file with atomic
//! writes (temp file + rename). Load and save are explicit — the caller
//! decides the lifecycle points (load at startup, save after every applied
//! outcome) and is responsible for serializing access per user; the store
//! assumes at most one in-flight update per user and provides no locking.
//!
//! Engines never touch the store. They take snapshots out of a record and
//! hand replacement snapshots back; [`UserRecord::apply_reconciliation`] and
//! friends are the only write paths.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{ReconcileOutcome, ReflectOutcome};
use crate::schema::{ChatJournal, JournalEntry, LongTermContext, ShortTermContext};

/// Errors from loading or saving a user record.
///
/// `Corrupt` is the one failure in this crate that legitimately reaches the
/// caller: a persisted snapshot that no longer conforms to the schema cannot
/// be substituted with a guess, so the store refuses to load it.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error for user record: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt user record at {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("failed to serialize user record: {0}")]
    Serialize(String),
}

// ── UserRecord ─────────────────────────────────────────────────────

/// All durable state for one user.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Long-term profile, evolved across all sessions.
    pub long_term: LongTermContext,
    /// Notes for the current conversation only.
    pub chat_journal: ChatJournal,
    /// Append-only reflection log, oldest first.
    pub entries: Vec<JournalEntry>,
}

impl UserRecord {
    /// Start a new conversation: the chat journal resets, the long-term
    /// context is untouched.
    pub fn begin_session(&mut self) {
        self.chat_journal = ChatJournal::default();
    }

    /// Replace both context snapshots from a reconciliation outcome.
    ///
    /// A fallback outcome carries the prior snapshots, so applying it is a
    /// no-op by construction.
    pub fn apply_reconciliation(&mut self, outcome: ReconcileOutcome) {
        self.long_term = outcome.long_term;
        self.chat_journal = outcome.chat_journal;
    }

    /// Record a reflected journal entry: appends the entry (reflection set
    /// exactly once, here) and adopts the evolved long-term context.
    /// Returns the id of the new entry.
    pub fn apply_reflection(
        &mut self,
        short_term: ShortTermContext,
        outcome: ReflectOutcome,
    ) -> String {
        let entry = JournalEntry::new(short_term, Some(outcome.reflection));
        let id = entry.id.clone();
        self.long_term = outcome.long_term;
        self.entries.push(entry);
        id
    }

    /// Adopt a rectified values summary. User feedback is authoritative, so
    /// this is a direct overwrite of the one field.
    pub fn apply_rectified_values(&mut self, values: String) {
        self.long_term.values = values;
    }

    /// Append a pre-built entry (e.g. migrated from an older format).
    pub fn push_entry(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }
}

// ── ContextStore ───────────────────────────────────────────────────

/// File-backed store of user records, one JSON file per user.
///
/// Layout:
/// ```text
/// records_dir/
///   user-a1b2.json
///   user-c3d4.json
/// ```
pub struct ContextStore {
    records_dir: PathBuf,
}

impl ContextStore {
    /// Create a store, ensuring the records directory exists.
    pub fn new(records_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let records_dir = records_dir.into();
        std::fs::create_dir_all(&records_dir)?;
        Ok(Self { records_dir })
    }

    /// The records root directory.
    pub fn dir(&self) -> &Path {
        &self.records_dir
    }

    fn record_path(&self, user_id: &str) -> PathBuf {
        self.records_dir.join(format!("{user_id}.json"))
    }

    /// Load a user's record. Returns `Ok(None)` if the user has no record
    /// yet; a record that exists but does not parse against the schema is a
    /// [`StoreError::Corrupt`].
    pub fn load(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        let path = self.record_path(user_id);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: UserRecord =
            serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        debug!(
            "Loaded record for {user_id}: {} entries",
            record.entries.len()
        );
        Ok(Some(record))
    }

    /// Atomic write: serialize to a temp file, then rename into place.
    pub fn save(&self, user_id: &str, record: &UserRecord) -> Result<(), StoreError> {
        let final_path = self.record_path(user_id);
        let tmp_path = self.records_dir.join(format!(".{user_id}.json.tmp"));

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| StoreError::Serialize(e.to_string()))?;
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &final_path)?;

        debug!("Saved record for {user_id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ResultSource;
    use crate::schema::Reflection;

    fn populated_record() -> UserRecord {
        let mut record = UserRecord::default();
        record.long_term.recurring_problems = "mild work stress".into();
        record.chat_journal.progress_summary = "good session".into();
        record
    }

    #[test]
    fn begin_session_resets_journal_only() {
        let mut record = populated_record();
        record.begin_session();
        assert_eq!(record.chat_journal, ChatJournal::default());
        assert_eq!(record.long_term.recurring_problems, "mild work stress");
    }

    #[test]
    fn apply_reconciliation_replaces_snapshots() {
        let mut record = populated_record();
        let mut long_term = record.long_term.clone();
        long_term.mood_history = "improving".into();
        record.apply_reconciliation(ReconcileOutcome {
            long_term,
            chat_journal: ChatJournal {
                suggested_solutions: "walks".into(),
                progress_summary: "named a pattern".into(),
            },
            source: ResultSource::Generated,
        });
        assert_eq!(record.long_term.mood_history, "improving");
        assert_eq!(record.chat_journal.suggested_solutions, "walks");
    }

    #[test]
    fn apply_reflection_appends_entry_with_reflection() {
        let mut record = UserRecord::default();
        let short_term = ShortTermContext {
            mood: "anxious".into(),
            ..Default::default()
        };
        let id = record.apply_reflection(
            short_term,
            ReflectOutcome {
                reflection: Reflection {
                    summary: "s".into(),
                    connection: "c".into(),
                    insight: "i".into(),
                    suggestions: vec!["rest".into()],
                },
                long_term: LongTermContext::default(),
                source: ResultSource::Generated,
            },
        );
        assert_eq!(record.entries.len(), 1);
        let entry = &record.entries[0];
        assert_eq!(entry.id, id);
        assert_eq!(entry.short_term.mood, "anxious");
        assert!(entry.reflection.is_some());
    }

    #[test]
    fn entries_accumulate_in_order() {
        let mut record = UserRecord::default();
        let first = JournalEntry::new(ShortTermContext::default(), None);
        let second = JournalEntry::new(ShortTermContext::default(), None);
        let first_id = first.id.clone();
        record.push_entry(first);
        record.push_entry(second);
        assert_eq!(record.entries.len(), 2);
        assert_eq!(record.entries[0].id, first_id);
    }

    #[test]
    fn rectified_values_overwrite() {
        let mut record = populated_record();
        record.apply_rectified_values("autonomy first".into());
        assert_eq!(record.long_term.values, "autonomy first");
    }

    #[test]
    fn load_missing_user_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::new(dir.path()).unwrap();
        assert!(store.load("nobody").unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::new(dir.path()).unwrap();

        let mut record = populated_record();
        record.apply_reflection(
            ShortTermContext::default(),
            ReflectOutcome {
                reflection: Reflection {
                    summary: "s".into(),
                    connection: "c".into(),
                    insight: "i".into(),
                    suggestions: vec!["rest".into()],
                },
                long_term: record.long_term.clone(),
                source: ResultSource::Generated,
            },
        );
        store.save("user-1", &record).unwrap();

        let loaded = store.load("user-1").unwrap().unwrap();
        assert_eq!(loaded, record);
        // No temp file left behind.
        assert!(!dir.path().join(".user-1.json.tmp").exists());
    }

    #[test]
    fn corrupt_record_is_an_error_not_a_guess() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("user-1.json"), "{ not json").unwrap();

        let err = store.load("user-1").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn record_with_wrong_shape_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::new(dir.path()).unwrap();
        std::fs::write(
            dir.path().join("user-1.json"),
            r#"{"longTerm": "not an object", "chatJournal": {}, "entries": []}"#,
        )
        .unwrap();

        let err = store.load("user-1").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
