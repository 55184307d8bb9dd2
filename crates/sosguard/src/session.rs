//! The alert session state machine.
//!
//! ```text
//!            begin_arming                 tick → 0 / confirm
//!  Idle ─────────────────► ArmingCountdown ──────────────────► Dispatching
//!   ▲  ▲                        │ cancel                            │
//!   │  └────────────────────────┘                                   ▼
//!   │                                          AwaitingAcknowledgement ◄──┐
//!   │   stop (any active phase)                   │ ack window elapsed     │
//!   │                                             ▼                        │
//!   │                                       RetryCountdown ── tick → 0 ────┘
//!   │                                             │           / retry_now
//!   │          acknowledge (awaiting or retry)    ▼             (via Dispatching)
//!   └──── begin_arming ◄───────────────────── Resolved
//! ```
//!
//! This module is pure: it knows nothing about timers or dispatchers. Each
//! transition checks the current phase and returns `false` without touching
//! anything if it does not apply. [`crate::controller::SosController`] drives
//! it and performs the side effects.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::location::Location;

/// Where a session is in its lifecycle.
///
/// Countdown phases carry their own remaining count, so at most one
/// countdown can exist at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlertPhase {
    /// No session.
    #[default]
    Idle,
    /// Counting down before the first alert; the user can still cancel.
    ArmingCountdown {
        /// Ticks left before the first alert goes out.
        seconds_remaining: u32,
    },
    /// An alert is being handed to the dispatcher.
    Dispatching,
    /// Waiting for someone to confirm help arrived.
    AwaitingAcknowledgement,
    /// No acknowledgement came; counting down to the next alert.
    RetryCountdown {
        /// Ticks left before the next alert goes out.
        seconds_remaining: u32,
    },
    /// Help was confirmed; the session is over.
    Resolved,
}

impl AlertPhase {
    /// The phase without its payload.
    #[must_use]
    pub fn kind(&self) -> PhaseKind {
        match self {
            Self::Idle => PhaseKind::Idle,
            Self::ArmingCountdown { .. } => PhaseKind::ArmingCountdown,
            Self::Dispatching => PhaseKind::Dispatching,
            Self::AwaitingAcknowledgement => PhaseKind::AwaitingAcknowledgement,
            Self::RetryCountdown { .. } => PhaseKind::RetryCountdown,
            Self::Resolved => PhaseKind::Resolved,
        }
    }

    /// Whether a session is in flight (a new one cannot be armed).
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle | Self::Resolved)
    }
}

/// Phase discriminant, for display and serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// See [`AlertPhase::Idle`].
    Idle,
    /// See [`AlertPhase::ArmingCountdown`].
    ArmingCountdown,
    /// See [`AlertPhase::Dispatching`].
    Dispatching,
    /// See [`AlertPhase::AwaitingAcknowledgement`].
    AwaitingAcknowledgement,
    /// See [`AlertPhase::RetryCountdown`].
    RetryCountdown,
    /// See [`AlertPhase::Resolved`].
    Resolved,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::ArmingCountdown => write!(f, "arming_countdown"),
            Self::Dispatching => write!(f, "dispatching"),
            Self::AwaitingAcknowledgement => write!(f, "awaiting_acknowledgement"),
            Self::RetryCountdown => write!(f, "retry_countdown"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

/// Result of advancing a countdown by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    /// Still counting; this many ticks remain.
    Ticking(u32),
    /// The countdown reached zero.
    Elapsed,
}

/// One emergency alert, from arming to resolution or abort.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertSession {
    id: u64,
    phase: AlertPhase,
    attempt_count: u32,
    location: Option<Location>,
    started_at: Option<DateTime<Utc>>,
    last_dispatch_at: Option<DateTime<Utc>>,
}

impl AlertSession {
    /// Session identifier; 0 when idle.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> AlertPhase {
        self.phase
    }

    /// Alerts sent so far in this session.
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Location captured at arming time.
    #[must_use]
    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// When the most recent alert was issued.
    #[must_use]
    pub fn last_dispatch_at(&self) -> Option<DateTime<Utc>> {
        self.last_dispatch_at
    }

    /// Start a new session in the arming countdown.
    ///
    /// Only allowed from `Idle` or `Resolved`.
    pub fn begin_arming(
        &mut self,
        id: u64,
        location: Option<Location>,
        arming_ticks: u32,
        now: DateTime<Utc>,
    ) -> bool {
        if self.phase.is_active() {
            return false;
        }
        *self = Self {
            id,
            phase: AlertPhase::ArmingCountdown {
                seconds_remaining: arming_ticks,
            },
            attempt_count: 0,
            location,
            started_at: Some(now),
            last_dispatch_at: None,
        };
        true
    }

    /// Abandon the session during the arming countdown.
    pub fn cancel_arming(&mut self) -> bool {
        if !matches!(self.phase, AlertPhase::ArmingCountdown { .. }) {
            return false;
        }
        self.reset();
        true
    }

    /// Advance whichever countdown is running by one tick.
    ///
    /// Returns `None` if the session is not in a countdown phase.
    pub fn tick(&mut self) -> Option<Countdown> {
        let remaining = match &mut self.phase {
            AlertPhase::ArmingCountdown { seconds_remaining }
            | AlertPhase::RetryCountdown { seconds_remaining } => seconds_remaining,
            _ => return None,
        };
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            Some(Countdown::Elapsed)
        } else {
            Some(Countdown::Ticking(*remaining))
        }
    }

    /// Enter `Dispatching` and count the attempt.
    ///
    /// Allowed from either countdown. Returns the new attempt number.
    pub fn begin_dispatch(&mut self, now: DateTime<Utc>) -> Option<u32> {
        if !matches!(
            self.phase,
            AlertPhase::ArmingCountdown { .. } | AlertPhase::RetryCountdown { .. }
        ) {
            return None;
        }
        self.phase = AlertPhase::Dispatching;
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.last_dispatch_at = Some(now);
        Some(self.attempt_count)
    }

    /// Leave `Dispatching` to wait for acknowledgement.
    pub fn await_acknowledgement(&mut self) -> bool {
        if self.phase != AlertPhase::Dispatching {
            return false;
        }
        self.phase = AlertPhase::AwaitingAcknowledgement;
        true
    }

    /// The acknowledgement window passed; start counting down to a retry.
    pub fn begin_retry_countdown(&mut self, retry_ticks: u32) -> bool {
        if self.phase != AlertPhase::AwaitingAcknowledgement {
            return false;
        }
        self.phase = AlertPhase::RetryCountdown {
            seconds_remaining: retry_ticks,
        };
        true
    }

    /// Help arrived. Allowed any time after the first alert.
    pub fn resolve(&mut self) -> bool {
        if !matches!(
            self.phase,
            AlertPhase::AwaitingAcknowledgement | AlertPhase::RetryCountdown { .. }
        ) {
            return false;
        }
        self.phase = AlertPhase::Resolved;
        self.attempt_count = 0;
        true
    }

    /// Abort an in-flight session without marking it resolved.
    pub fn stop(&mut self) -> bool {
        if !self.phase.is_active() {
            return false;
        }
        self.reset();
        true
    }

    /// Discard the session unconditionally.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Read-only projection for display.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let (arming, retry) = match self.phase {
            AlertPhase::ArmingCountdown { seconds_remaining } => (Some(seconds_remaining), None),
            AlertPhase::RetryCountdown { seconds_remaining } => (None, Some(seconds_remaining)),
            _ => (None, None),
        };
        SessionSnapshot {
            phase: self.phase.kind(),
            arming_seconds_remaining: arming,
            retry_seconds_remaining: retry,
            attempt_count: self.attempt_count,
            session_id: (self.phase != AlertPhase::Idle).then_some(self.id),
            location: self.location.clone(),
            started_at: self.started_at,
            last_dispatch_at: self.last_dispatch_at,
        }
    }
}

/// What the presentation layer is allowed to see of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Current phase.
    pub phase: PhaseKind,
    /// Ticks left in the arming countdown, if it is running.
    pub arming_seconds_remaining: Option<u32>,
    /// Ticks left in the retry countdown, if it is running.
    pub retry_seconds_remaining: Option<u32>,
    /// Alerts sent so far.
    pub attempt_count: u32,
    /// Session identifier, absent when idle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<u64>,
    /// Location captured at arming time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// When the session was armed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the most recent alert was issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_dispatch_at: Option<DateTime<Utc>>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        AlertSession::default().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed(ticks: u32) -> AlertSession {
        let mut session = AlertSession::default();
        assert!(session.begin_arming(1, None, ticks, Utc::now()));
        session
    }

    #[test]
    fn test_default_is_idle() {
        let session = AlertSession::default();
        assert_eq!(session.phase(), AlertPhase::Idle);
        assert_eq!(session.attempt_count(), 0);
        assert!(session.snapshot().session_id.is_none());
    }

    #[test]
    fn test_begin_arming() {
        let session = armed(5);
        assert_eq!(
            session.phase(),
            AlertPhase::ArmingCountdown {
                seconds_remaining: 5
            }
        );
        assert_eq!(session.attempt_count(), 0);
        assert_eq!(session.snapshot().arming_seconds_remaining, Some(5));
        assert_eq!(session.snapshot().retry_seconds_remaining, None);
    }

    #[test]
    fn test_begin_arming_rejected_while_active() {
        let mut session = armed(5);
        assert!(!session.begin_arming(2, None, 5, Utc::now()));
        assert_eq!(session.id(), 1);
    }

    #[test]
    fn test_begin_arming_allowed_after_resolved() {
        let mut session = armed(5);
        session.begin_dispatch(Utc::now());
        session.await_acknowledgement();
        assert!(session.resolve());
        assert!(session.begin_arming(2, None, 5, Utc::now()));
        assert_eq!(session.id(), 2);
    }

    #[test]
    fn test_tick_counts_down_to_elapsed() {
        let mut session = armed(2);
        assert_eq!(session.tick(), Some(Countdown::Ticking(1)));
        assert_eq!(session.tick(), Some(Countdown::Elapsed));
    }

    #[test]
    fn test_tick_outside_countdown() {
        let mut session = AlertSession::default();
        assert_eq!(session.tick(), None);
    }

    #[test]
    fn test_cancel_arming_only_while_arming() {
        let mut session = armed(5);
        assert!(session.cancel_arming());
        assert_eq!(session.phase(), AlertPhase::Idle);

        let mut session = armed(5);
        session.begin_dispatch(Utc::now());
        session.await_acknowledgement();
        assert!(!session.cancel_arming());
        assert_eq!(session.phase(), AlertPhase::AwaitingAcknowledgement);
    }

    #[test]
    fn test_dispatch_cycle_increments_attempts() {
        let mut session = armed(5);
        assert_eq!(session.begin_dispatch(Utc::now()), Some(1));
        assert_eq!(session.phase(), AlertPhase::Dispatching);
        assert!(session.last_dispatch_at().is_some());
        assert!(session.await_acknowledgement());

        assert!(session.begin_retry_countdown(30));
        assert_eq!(session.snapshot().retry_seconds_remaining, Some(30));
        assert_eq!(session.snapshot().arming_seconds_remaining, None);

        assert_eq!(session.begin_dispatch(Utc::now()), Some(2));
        assert!(session.await_acknowledgement());
        assert_eq!(session.attempt_count(), 2);
    }

    #[test]
    fn test_begin_dispatch_rejected_while_awaiting() {
        let mut session = armed(5);
        session.begin_dispatch(Utc::now());
        session.await_acknowledgement();
        assert_eq!(session.begin_dispatch(Utc::now()), None);
        assert_eq!(session.attempt_count(), 1);
    }

    #[test]
    fn test_resolve_requires_a_dispatch() {
        let mut session = armed(5);
        assert!(!session.resolve());

        session.begin_dispatch(Utc::now());
        session.await_acknowledgement();
        session.begin_retry_countdown(30);
        assert!(session.resolve());
        assert_eq!(session.phase(), AlertPhase::Resolved);
        assert_eq!(session.attempt_count(), 0);
        assert_eq!(session.snapshot().retry_seconds_remaining, None);
    }

    #[test]
    fn test_stop_from_any_active_phase() {
        let mut session = armed(5);
        assert!(session.stop());
        assert_eq!(session.phase(), AlertPhase::Idle);
        assert!(!session.stop());

        let mut session = armed(5);
        session.begin_dispatch(Utc::now());
        session.await_acknowledgement();
        session.resolve();
        assert!(!session.stop());
        assert_eq!(session.phase(), AlertPhase::Resolved);
    }

    #[test]
    fn test_phase_kind_display() {
        assert_eq!(PhaseKind::ArmingCountdown.to_string(), "arming_countdown");
        assert_eq!(PhaseKind::RetryCountdown.to_string(), "retry_countdown");
    }

    #[test]
    fn test_snapshot_serialization() {
        let json = serde_json::to_string(&armed(5).snapshot()).unwrap();
        assert!(json.contains(r#""phase":"arming_countdown""#));
        assert!(json.contains(r#""arming_seconds_remaining":5"#));
    }
}
