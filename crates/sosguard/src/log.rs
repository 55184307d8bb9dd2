//! In-memory emergency log.
//!
//! Keeps the most recent session events, newest first, so a status screen
//! can show what was sent and when. Nothing here is persisted.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Something that happened to an alert session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    /// The arming countdown started.
    Armed,
    /// The user cancelled during the arming countdown.
    ArmingCancelled,
    /// An alert was handed to the dispatcher.
    Dispatched {
        /// Attempt number.
        attempt: u32,
    },
    /// The dispatcher finished with an alert.
    DispatchCompleted {
        /// Attempt number.
        attempt: u32,
        /// Whether the dispatcher reported success.
        ok: bool,
    },
    /// The acknowledgement window passed with no response.
    NoResponse {
        /// Attempt that went unanswered.
        attempt: u32,
    },
    /// Help was confirmed.
    Resolved,
    /// The user stopped an in-flight session.
    Stopped,
    /// The user placed a direct call to a contact.
    Call {
        /// Who was called.
        name: String,
        /// Number dialled.
        number: String,
        /// Map link for the session's location, if one was captured.
        #[serde(skip_serializing_if = "Option::is_none")]
        location: Option<String>,
    },
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Armed => write!(f, "armed"),
            Self::ArmingCancelled => write!(f, "arming cancelled"),
            Self::Dispatched { attempt } => write!(f, "alert #{attempt} dispatched"),
            Self::DispatchCompleted { attempt, ok: true } => {
                write!(f, "alert #{attempt} delivered")
            }
            Self::DispatchCompleted { attempt, ok: false } => {
                write!(f, "alert #{attempt} failed")
            }
            Self::NoResponse { attempt } => write!(f, "no response to alert #{attempt}"),
            Self::Resolved => write!(f, "help confirmed"),
            Self::Stopped => write!(f, "stopped"),
            Self::Call { name, number, .. } => write!(f, "called {name} at {number}"),
        }
    }
}

/// One log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// Session the event belongs to.
    pub session_id: u64,
    /// What happened.
    pub event: LogEvent,
}

/// A bounded, newest-first event log.
#[derive(Debug, Clone)]
pub struct EmergencyLog {
    entries: VecDeque<LogEntry>,
    limit: usize,
}

impl EmergencyLog {
    /// Create a log that keeps at most `limit` entries.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit.min(256)),
            limit: limit.max(1),
        }
    }

    /// Record an event, evicting the oldest entry if the log is full.
    pub fn record(&mut self, session_id: u64, event: LogEvent) {
        if self.entries.len() == self.limit {
            self.entries.pop_back();
        }
        self.entries.push_front(LogEntry {
            timestamp: Utc::now(),
            session_id,
            event,
        });
    }

    /// The `n` most recent entries, newest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<LogEntry> {
        self.entries.iter().take(n).cloned().collect()
    }

    /// Number of entries held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
