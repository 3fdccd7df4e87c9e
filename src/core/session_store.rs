//! Named session records on disk.
//!
//! Each session lives in `<dir>/<record id>.json`. Writes go to a temporary
//! file in the same directory and are renamed into place, so a reader sees
//! either the previous record or the new one.

use crate::core::config::data::path_display;
use crate::core::persona::Persona;
use crate::core::session::Session;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

pub const RECORD_EXTENSION: &str = "json";
pub const FORMAT_VERSION: u32 = 1;
pub const MAX_NAME_LEN: usize = 50;
pub const DEFAULT_MAX_RECORD_BYTES: u64 = 10 * 1024 * 1024;

/// Sanitized file stem identifying a stored session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    /// Build an id from user input. Characters outside `[A-Za-z0-9_.-]` are
    /// dropped, trailing `.json` suffixes and leading dots are removed and the
    /// result is capped at 50 characters. Returns `None` if nothing usable
    /// remains. Sanitizing an existing id returns it unchanged.
    pub fn sanitize(name: &str) -> Option<Self> {
        let cleaned: String = strip_record_affixes(name.trim())
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            .take(MAX_NAME_LEN)
            .collect();
        let cleaned = strip_record_affixes(&cleaned);
        if cleaned.is_empty() {
            None
        } else {
            Some(Self(cleaned.to_string()))
        }
    }

    /// Timestamped id used when the caller gives no name.
    pub fn generated() -> Self {
        Self(format!("Session_{}", Local::now().format("%Y%m%d_%H%M%S")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn file_name(&self) -> String {
        format!("{}.{RECORD_EXTENSION}", self.0)
    }
}

fn strip_record_affixes(mut name: &str) -> &str {
    let suffix = format!(".{RECORD_EXTENSION}");
    loop {
        let next = name
            .strip_suffix(suffix.as_str())
            .unwrap_or(name)
            .trim_start_matches('.');
        if next.len() == name.len() {
            return name;
        }
        name = next;
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors that can occur while reading or writing session records.
#[derive(Debug)]
pub enum SessionStoreError {
    /// No record with this name exists.
    NotFound(String),

    /// The record exists but does not parse into a session.
    Corrupt { record_id: String, reason: String },

    /// The name contains no usable characters.
    InvalidName(String),

    /// The serialized session exceeds the configured record size limit.
    TooLarge { size: u64, limit: u64 },

    /// Filesystem failure.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The session could not be serialized.
    Serialize(serde_json::Error),
}

impl fmt::Display for SessionStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStoreError::NotFound(name) => write!(f, "Session '{name}' not found"),
            SessionStoreError::Corrupt { record_id, reason } => {
                write!(f, "Session '{record_id}' is corrupt: {reason}")
            }
            SessionStoreError::InvalidName(name) => write!(
                f,
                "Invalid session name '{name}': use letters, digits, '_', '-' or '.'"
            ),
            SessionStoreError::TooLarge { size, limit } => write!(
                f,
                "Session is too large to save ({size} bytes, limit {limit} bytes)"
            ),
            SessionStoreError::Io { path, source } => {
                write!(f, "I/O error at {}: {source}", path_display(path))
            }
            SessionStoreError::Serialize(err) => write!(f, "Failed to serialize session: {err}"),
        }
    }
}

impl std::error::Error for SessionStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionStoreError::Io { source, .. } => Some(source),
            SessionStoreError::Serialize(err) => Some(err),
            _ => None,
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SessionStoreError + '_ {
    move |source| SessionStoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// On-disk envelope around a session.
#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    #[serde(default = "default_format_version")]
    format_version: u32,
    saved_at: DateTime<Utc>,
    #[serde(flatten)]
    session: Session,
}

fn default_format_version() -> u32 {
    FORMAT_VERSION
}

/// Lightweight description of a stored session for pickers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub record_id: RecordId,
    pub name: String,
    pub saved_at: DateTime<Utc>,
    pub message_count: usize,
    pub model_reference: String,
    pub persona: Option<Persona>,
    pub roleplay_enabled: bool,
    pub preview: String,
}

pub struct SessionStore {
    dir: PathBuf,
    max_sessions: usize,
    max_record_bytes: u64,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>, max_sessions: usize) -> Self {
        Self {
            dir: dir.into(),
            max_sessions: max_sessions.max(1),
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }

    pub fn with_max_record_bytes(mut self, limit: u64) -> Self {
        self.max_record_bytes = limit;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, record_id: &RecordId) -> PathBuf {
        self.dir.join(record_id.file_name())
    }

    fn ensure_dir(&self) -> Result<(), SessionStoreError> {
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(err) = fs::set_permissions(&self.dir, fs::Permissions::from_mode(0o700)) {
                debug!(error = %err, "could not restrict session directory permissions");
            }
        }
        Ok(())
    }

    /// Write `session` under `name`, replacing any record with the same
    /// name. An empty name gets a timestamped id.
    pub fn save(&self, name: &str, session: &Session) -> Result<RecordId, SessionStoreError> {
        let record_id = if name.trim().is_empty() {
            RecordId::generated()
        } else {
            RecordId::sanitize(name)
                .ok_or_else(|| SessionStoreError::InvalidName(name.to_string()))?
        };

        let record = SessionRecord {
            format_version: FORMAT_VERSION,
            saved_at: Utc::now(),
            session: session.clone(),
        };
        let contents = serde_json::to_vec_pretty(&record).map_err(SessionStoreError::Serialize)?;
        let size = contents.len() as u64;
        if size > self.max_record_bytes {
            return Err(SessionStoreError::TooLarge {
                size,
                limit: self.max_record_bytes,
            });
        }

        self.ensure_dir()?;
        let path = self.path_for(&record_id);
        let is_new = !path.is_file();

        let mut temp_file = NamedTempFile::new_in(&self.dir).map_err(io_error(&self.dir))?;
        temp_file.write_all(&contents).map_err(io_error(&path))?;
        temp_file.as_file_mut().sync_all().map_err(io_error(&path))?;
        temp_file
            .persist(&path)
            .map_err(|err| io_error(&path)(err.error))?;

        info!(record = %record_id, messages = session.message_count(), "session saved");
        if is_new {
            self.prune_excess(&record_id);
        }
        Ok(record_id)
    }

    /// Load the record saved under `name`.
    pub fn load(&self, name: &str) -> Result<Session, SessionStoreError> {
        let record_id =
            RecordId::sanitize(name).ok_or_else(|| SessionStoreError::NotFound(name.to_string()))?;
        self.read_record(&record_id).map(|record| record.session)
    }

    fn read_record(&self, record_id: &RecordId) -> Result<SessionRecord, SessionStoreError> {
        let path = self.path_for(record_id);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(SessionStoreError::NotFound(record_id.to_string()))
            }
            Err(err) => return Err(io_error(&path)(err)),
        };

        if metadata.len() > self.max_record_bytes {
            return Err(SessionStoreError::Corrupt {
                record_id: record_id.to_string(),
                reason: format!(
                    "record is {} bytes, limit is {} bytes",
                    metadata.len(),
                    self.max_record_bytes
                ),
            });
        }

        let contents = fs::read(&path).map_err(io_error(&path))?;
        serde_json::from_slice(&contents).map_err(|err| SessionStoreError::Corrupt {
            record_id: record_id.to_string(),
            reason: err.to_string(),
        })
    }

    /// Summaries of every readable record, newest first. Unreadable records
    /// are skipped.
    pub fn list(&self) -> Result<Vec<SessionSummary>, SessionStoreError> {
        let mut summaries: Vec<SessionSummary> = self
            .record_ids()?
            .into_iter()
            .filter_map(|record_id| match self.read_record(&record_id) {
                Ok(record) => Some(SessionSummary {
                    name: record.session.name.clone(),
                    saved_at: record.saved_at,
                    message_count: record.session.message_count(),
                    model_reference: record.session.model_reference.clone(),
                    persona: record.session.active_persona,
                    roleplay_enabled: record.session.roleplay_enabled,
                    preview: record.session.preview(),
                    record_id,
                }),
                Err(err) => {
                    warn!(record = %record_id, error = %err, "skipping unreadable session");
                    None
                }
            })
            .collect();

        summaries.sort_by(|a, b| {
            b.saved_at
                .cmp(&a.saved_at)
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
        Ok(summaries)
    }

    pub fn delete(&self, name: &str) -> Result<(), SessionStoreError> {
        let record_id =
            RecordId::sanitize(name).ok_or_else(|| SessionStoreError::NotFound(name.to_string()))?;
        let path = self.path_for(&record_id);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(record = %record_id, "session deleted");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(SessionStoreError::NotFound(record_id.to_string()))
            }
            Err(err) => Err(io_error(&path)(err)),
        }
    }

    fn record_ids(&self) -> Result<Vec<RecordId>, SessionStoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_error(&self.dir)(err)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_error(&self.dir))?;
            let path = entry.path();
            let is_record = path.extension().and_then(|ext| ext.to_str()) == Some(RECORD_EXTENSION);
            if !is_record || !path.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if let Some(id) = RecordId::sanitize(stem).filter(|id| id.as_str() == stem) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Delete the oldest records beyond `max_sessions`, never `keep`.
    fn prune_excess(&self, keep: &RecordId) {
        let summaries = match self.list() {
            Ok(summaries) => summaries,
            Err(err) => {
                warn!(error = %err, "could not list sessions for pruning");
                return;
            }
        };
        if summaries.len() <= self.max_sessions {
            return;
        }

        let excess = summaries.len() - self.max_sessions;
        let oldest = summaries
            .iter()
            .rev()
            .filter(|summary| &summary.record_id != keep)
            .take(excess);
        for summary in oldest {
            let path = self.path_for(&summary.record_id);
            match fs::remove_file(&path) {
                Ok(()) => info!(record = %summary.record_id, "pruned old session"),
                Err(err) => {
                    warn!(record = %summary.record_id, error = %err, "could not prune session")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Message;
    use crate::utils::test_utils::create_test_session;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> SessionStore {
        SessionStore::new(dir.path().join("sessions"), 50)
    }

    #[test]
    fn save_then_load_round_trips_every_field() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let mut session = create_test_session("round trip");
        session.generation_settings.set("temperature", "0.31").unwrap();
        session.generation_settings.set("stop", "###").unwrap();
        session.model_params.n_gpu_layers = -1;
        session.model_params.n_threads = Some(6);
        session.messages.push(Message::system("Model loaded"));

        let record_id = store.save(&session.name, &session).unwrap();
        assert_eq!(record_id.as_str(), "roundtrip");

        let loaded = store.load(record_id.as_str()).unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn reload_keeps_persona_and_message_count() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let session = create_test_session("test1");
        assert_eq!(session.active_persona, Some(Persona::Pirate));

        store.save("test1", &session).unwrap();
        let loaded = store.load("test1").unwrap();
        assert_eq!(loaded.active_persona, Some(Persona::Pirate));
        assert_eq!(loaded.messages.len(), 2);
    }

    #[test]
    fn saving_same_name_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut session = create_test_session("chat");
        store.save("chat", &session).unwrap();

        session.messages.push(Message::user("one more"));
        store.save("chat", &session).unwrap();

        assert_eq!(store.load("chat").unwrap().messages.len(), 3);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn missing_record_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(matches!(
            store.load("nothing-here"),
            Err(SessionStoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("nothing-here"),
            Err(SessionStoreError::NotFound(_))
        ));
    }

    #[test]
    fn unparsable_record_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.dir().join("broken.json"), "{\"name\": 12").unwrap();
        fs::write(store.dir().join("shape.json"), r#"{"messages": "nope"}"#).unwrap();

        assert!(matches!(
            store.load("broken"),
            Err(SessionStoreError::Corrupt { .. })
        ));
        assert!(matches!(
            store.load("shape"),
            Err(SessionStoreError::Corrupt { .. })
        ));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn oversized_records_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).with_max_record_bytes(256);
        let mut session = create_test_session("big");
        session.messages.push(Message::user("x".repeat(512)));

        assert!(matches!(
            store.save("big", &session),
            Err(SessionStoreError::TooLarge { .. })
        ));

        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.dir().join("big.json"), "x".repeat(300)).unwrap();
        assert!(matches!(
            store.load("big"),
            Err(SessionStoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn names_are_sanitized() {
        assert_eq!(
            RecordId::sanitize("my chat/../notes!.json").unwrap().as_str(),
            "mychat..notes"
        );
        assert_eq!(RecordId::sanitize("...hidden").unwrap().as_str(), "hidden");
        assert!(RecordId::sanitize("///").is_none());
        assert_eq!(
            RecordId::sanitize(&"a".repeat(80)).unwrap().as_str().len(),
            MAX_NAME_LEN
        );

        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(matches!(
            store.save("???", &create_test_session("x")),
            Err(SessionStoreError::InvalidName(_))
        ));
    }

    #[test]
    fn sanitized_ids_are_stable() {
        for name in ["notes.json.json", "a.js?on", ".json.json", "x..json", "plain"] {
            if let Some(id) = RecordId::sanitize(name) {
                assert_eq!(RecordId::sanitize(id.as_str()), Some(id.clone()), "{name}");
                assert!(!id.as_str().ends_with(".json"), "{name}");
            }
        }
        assert!(RecordId::sanitize(".json").is_none());
        assert_eq!(RecordId::sanitize("notes.json.json").unwrap().as_str(), "notes");
    }

    #[test]
    fn repeated_suffix_names_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let session = create_test_session("notes.json.json");

        let record_id = store.save(&session.name, &session).unwrap();
        assert_eq!(store.load(record_id.as_str()).unwrap(), session);
        assert_eq!(store.load("notes.json.json").unwrap(), session);

        let listed: Vec<RecordId> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|summary| summary.record_id)
            .collect();
        assert_eq!(listed, vec![record_id.clone()]);
        store.delete(record_id.as_str()).unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn empty_name_generates_timestamped_id() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let record_id = store.save("  ", &create_test_session("")).unwrap();
        assert!(record_id.as_str().starts_with("Session_"));
        assert!(store.load(record_id.as_str()).is_ok());
    }

    #[test]
    fn list_reports_summaries() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.list().unwrap().is_empty());

        let session = create_test_session("pirate talk");
        store.save("pirate-talk", &session).unwrap();
        fs::write(store.dir().join("notes.txt"), "ignored").unwrap();

        let summaries = store.list().unwrap();
        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.record_id.as_str(), "pirate-talk");
        assert_eq!(summary.name, "pirate talk");
        assert_eq!(summary.message_count, 2);
        assert_eq!(summary.persona, Some(Persona::Pirate));
        assert!(summary.roleplay_enabled);
        assert_eq!(summary.preview, "Hello");
        assert!(summary.model_reference.ends_with(".gguf"));
    }

    #[test]
    fn oldest_records_are_pruned_at_capacity() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("sessions"), 3);
        for name in ["a", "b", "c"] {
            store.save(name, &create_test_session(name)).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        // Overwriting does not prune.
        store.save("b", &create_test_session("b")).unwrap();
        assert_eq!(store.list().unwrap().len(), 3);

        std::thread::sleep(std::time::Duration::from_millis(5));
        store.save("d", &create_test_session("d")).unwrap();
        let ids: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|s| s.record_id.to_string())
            .collect();
        assert_eq!(ids, vec!["d", "b", "c"]);
    }

    #[test]
    fn failed_write_at_capacity_keeps_existing_records() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("sessions"), 2);
        for name in ["a", "b"] {
            store.save(name, &create_test_session(name)).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        // A directory where the record file should go makes the final rename fail.
        fs::create_dir(store.dir().join("blocked.json")).unwrap();
        fs::write(store.dir().join("blocked.json").join("inner"), "x").unwrap();

        assert!(matches!(
            store.save("blocked", &create_test_session("blocked")),
            Err(SessionStoreError::Io { .. })
        ));
        assert!(store.load("a").is_ok());
        assert!(store.load("b").is_ok());
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn session_directory_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save("p", &create_test_session("p")).unwrap();
        let mode = fs::metadata(store.dir()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn saved_file_is_readable_json() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save("plain", &create_test_session("plain")).unwrap();

        let raw = fs::read_to_string(store.dir().join("plain.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["format_version"], 1);
        assert_eq!(value["active_persona"], "pirate");
        assert_eq!(value["generation_settings"]["top_k"], 40);
        assert!(value["saved_at"].is_string());
        let leftovers: Vec<_> = fs::read_dir(store.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) != Some("json"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
