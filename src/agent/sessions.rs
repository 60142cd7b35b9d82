//! Persistent agent sessions
//!
//! Saves the transcript and outcome of a run to disk as JSON.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::controller::AgentReport;
use super::conversation::{AgentOutcome, Turn};

/// A saved agent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session ID (the run's trace ID)
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// The original task that started this session
    pub task: String,
    /// Model used for this session
    pub model: String,
    /// Full transcript
    pub turns: Vec<Turn>,
    /// Model calls made
    pub iterations: usize,
    /// `None` while the run is still going
    pub outcome: Option<AgentOutcome>,
}

impl Session {
    pub fn new(id: impl Into<String>, task: impl Into<String>, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            task: task.into(),
            model: model.into(),
            turns: Vec::new(),
            iterations: 0,
            outcome: None,
        }
    }

    /// Record the transcript and result of a finished run
    pub fn record(&mut self, turns: &[Turn], report: &AgentReport) {
        self.turns = turns.to_vec();
        self.iterations = report.iterations;
        self.outcome = Some(report.outcome.clone());
        self.updated_at = Utc::now();
    }
}

/// Session storage manager
pub struct SessionStore {
    /// Base directory for session files
    base_dir: PathBuf,
}

impl SessionStore {
    /// Create a new session store, creating the directory if needed
    pub fn new(base_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Save a session to disk, returning its path
    pub fn save(&self, session: &Session) -> std::io::Result<PathBuf> {
        let path = self.session_path(&session.id);
        let json = serde_json::to_string_pretty(session)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Load a session from disk
    pub fn load(&self, session_id: &str) -> std::io::Result<Session> {
        let json = std::fs::read_to_string(self.session_path(session_id))?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: AgentOutcome) -> AgentReport {
        AgentReport {
            outcome,
            final_response: Some("Done.".to_string()),
            iterations: 2,
            tool_calls_made: 1,
            trace_id: "trace-1".to_string(),
        }
    }

    #[test]
    fn test_session_creation() {
        let session = Session::new("s1", "Start a VM", "qwen3");
        assert_eq!(session.id, "s1");
        assert_eq!(session.task, "Start a VM");
        assert!(session.turns.is_empty());
        assert!(session.outcome.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions")).unwrap();

        let mut session = Session::new("s1", "Start a VM", "qwen3");
        let turns = vec![Turn::system("sys"), Turn::user("Start a VM"), Turn::assistant("Done.")];
        session.record(&turns, &report(AgentOutcome::Completed));

        let path = store.save(&session).unwrap();
        assert!(path.ends_with("s1.json"));

        let loaded = store.load("s1").unwrap();
        assert_eq!(loaded.turns, turns);
        assert_eq!(loaded.iterations, 2);
        assert_eq!(loaded.outcome, Some(AgentOutcome::Completed));
        assert_eq!(loaded.created_at, session.created_at);
    }

    #[test]
    fn test_load_missing_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        assert_eq!(
            store.load("nope").unwrap_err().kind(),
            std::io::ErrorKind::NotFound
        );
    }
}
