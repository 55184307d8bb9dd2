//! The SOS escalation controller.
//!
//! Drives an [`AlertSession`] with tokio timers: the arming countdown, the
//! acknowledgement window after each alert, and the retry countdown that
//! re-sends the alert until someone confirms help arrived.
//!
//! At most one timer task exists at a time. Every transition aborts the
//! stored handle and bumps an epoch; a timer that wakes up with an old epoch
//! does nothing, so a callback racing a user action can never dispatch after
//! the session moved on.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::{Config, EscalationConfig};
use crate::dispatch::{
    alert_message, AlertDispatcher, ContactDirectory, DispatchRequest, EmergencyContact, Notice,
    Notifier,
};
use crate::location::{Location, LocationProvider};
use crate::log::{EmergencyLog, LogEntry, LogEvent};
use crate::session::{AlertPhase, AlertSession, Countdown, SessionSnapshot};

/// Handle to the escalation controller.
///
/// Cheap to clone; all clones drive the same session. Dropping the last
/// clone cancels any pending timer.
#[derive(Clone)]
pub struct SosController {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<State>,
    dispatcher: Arc<dyn AlertDispatcher>,
    notifier: Arc<dyn Notifier>,
    timing: EscalationConfig,
    contacts: ContactDirectory,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

struct State {
    session: AlertSession,
    timer: Option<JoinHandle<()>>,
    epoch: u64,
    last_session_id: u64,
    log: EmergencyLog,
}

#[derive(Debug, Clone, Copy)]
enum TimerKind {
    Countdown,
    AcknowledgementWindow,
}

impl fmt::Debug for SosController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SosController")
            .field("timing", &self.shared.timing)
            .field("contacts", &self.shared.contacts.contacts().len())
            .field("snapshot", &*self.shared.snapshot_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl SosController {
    /// Create a controller from configuration and the two capabilities it
    /// calls into.
    #[must_use]
    pub fn new(
        config: &Config,
        dispatcher: Arc<dyn AlertDispatcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    session: AlertSession::default(),
                    timer: None,
                    epoch: 0,
                    last_session_id: 0,
                    log: EmergencyLog::new(config.history.limit),
                }),
                dispatcher,
                notifier,
                timing: config.escalation.clone(),
                contacts: config.contact_directory(),
                snapshot_tx,
            }),
        }
    }

    /// Current state of the session.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot_tx.borrow().clone()
    }

    /// Receive a fresh snapshot after every transition and countdown tick.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    /// The `n` most recent emergency log entries, newest first.
    pub async fn recent_log(&self, n: usize) -> Vec<LogEntry> {
        self.shared.state.lock().await.log.recent(n)
    }

    /// Start the arming countdown for a new session.
    ///
    /// Ignored while another session is in flight. When the countdown runs
    /// out the first alert is sent, exactly as if the user had confirmed.
    pub async fn begin_arming(&self, location: Option<Location>) -> bool {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        let id = state.last_session_id + 1;
        if !state
            .session
            .begin_arming(id, location, shared.timing.arming_ticks, Utc::now())
        {
            debug!(phase = %state.session.phase().kind(), "begin_arming ignored");
            return false;
        }
        state.last_session_id = id;
        state.log.record(id, LogEvent::Armed);
        info!(session = id, ticks = shared.timing.arming_ticks, "SOS arming");
        shared.notifier.notify(Notice::warning(format!(
            "Auto-activating SOS in {}...",
            shared.countdown_text(shared.timing.arming_ticks)
        )));
        shared.schedule(&mut state, TimerKind::Countdown);
        shared.publish(&state);
        true
    }

    /// Query `provider` once and start arming with whatever it returns.
    ///
    /// A failing provider does not block the alert; the session proceeds
    /// without a location.
    pub async fn begin_arming_from(&self, provider: &dyn LocationProvider) -> bool {
        let location = match provider.current_location().await {
            Ok(location) => location,
            Err(e) => {
                warn!(error = %e, "location lookup failed, arming without location");
                None
            }
        };
        self.begin_arming(location).await
    }

    /// Abort during the arming countdown. Nothing is sent.
    pub async fn cancel_arming(&self) -> bool {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        let id = state.session.id();
        if !state.session.cancel_arming() {
            debug!(phase = %state.session.phase().kind(), "cancel_arming ignored");
            return false;
        }
        shared.cancel_timer(&mut state);
        state.log.record(id, LogEvent::ArmingCancelled);
        info!(session = id, "SOS arming cancelled");
        shared.notifier.notify(Notice::info("SOS activation cancelled"));
        shared.publish(&state);
        true
    }

    /// Skip the rest of the arming countdown and send the first alert now.
    pub async fn confirm_and_dispatch(&self) -> bool {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        if !matches!(state.session.phase(), AlertPhase::ArmingCountdown { .. }) {
            debug!(phase = %state.session.phase().kind(), "confirm ignored");
            return false;
        }
        shared.dispatch(&mut state);
        true
    }

    /// Help arrived: stop escalating and mark the session resolved.
    pub async fn acknowledge_help_arrived(&self) -> bool {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        let id = state.session.id();
        let attempts = state.session.attempt_count();
        if !state.session.resolve() {
            debug!(phase = %state.session.phase().kind(), "acknowledge ignored");
            return false;
        }
        shared.cancel_timer(&mut state);
        state.log.record(id, LogEvent::Resolved);
        info!(session = id, attempts, "SOS resolved");
        shared.notifier.notify(Notice::success(
            "Emergency response confirmed! Help is on the way.",
        ));
        shared.publish(&state);
        true
    }

    /// Re-send the alert immediately instead of waiting out the retry
    /// countdown.
    pub async fn retry_now(&self) -> bool {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        if !matches!(state.session.phase(), AlertPhase::RetryCountdown { .. }) {
            debug!(phase = %state.session.phase().kind(), "retry_now ignored");
            return false;
        }
        shared.dispatch(&mut state);
        true
    }

    /// Abort an in-flight session without marking it resolved.
    pub async fn stop_session(&self) -> bool {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        let id = state.session.id();
        if !state.session.stop() {
            debug!(phase = %state.session.phase().kind(), "stop ignored");
            return false;
        }
        shared.cancel_timer(&mut state);
        state.log.record(id, LogEvent::Stopped);
        info!(session = id, "SOS stopped");
        shared.notifier.notify(Notice::info("SOS deactivated - Stay safe!"));
        shared.publish(&state);
        true
    }

    /// Log a direct call to `contact`, whatever the session phase.
    ///
    /// The call is attributed to the in-flight session (0 when idle) and
    /// carries its location link, if any.
    pub async fn record_call(&self, contact: &EmergencyContact) {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        let id = state.session.id();
        let location = state.session.location().map(Location::maps_url);
        state.log.record(
            id,
            LogEvent::Call {
                name: contact.name.clone(),
                number: contact.number.clone(),
                location,
            },
        );
        info!(session = id, to = %contact.name, number = %contact.number, "emergency call");
        shared
            .notifier
            .notify(Notice::success(format!("Calling {}...", contact.name)));
    }

    /// Cancel every timer and discard the session, whatever its phase.
    pub async fn shutdown(&self) {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        shared.cancel_timer(&mut state);
        if state.session.phase() != AlertPhase::Idle {
            debug!(session = state.session.id(), "session discarded on shutdown");
        }
        state.session.reset();
        shared.publish(&state);
    }
}

impl Shared {
    fn publish(&self, state: &State) {
        self.snapshot_tx.send_replace(state.session.snapshot());
    }

    fn cancel_timer(&self, state: &mut State) {
        state.epoch = state.epoch.wrapping_add(1);
        if let Some(handle) = state.timer.take() {
            handle.abort();
        }
    }

    fn schedule(self: &Arc<Self>, state: &mut State, kind: TimerKind) {
        self.cancel_timer(state);
        let epoch = state.epoch;
        let weak = Arc::downgrade(self);
        let handle = match kind {
            TimerKind::Countdown => {
                tokio::spawn(run_countdown(weak, epoch, self.timing.tick_interval()))
            }
            TimerKind::AcknowledgementWindow => tokio::spawn(run_acknowledgement_window(
                weak,
                epoch,
                self.timing.acknowledgement_window(),
            )),
        };
        state.timer = Some(handle);
    }

    fn countdown_text(&self, ticks: u32) -> String {
        format_duration(self.timing.span(ticks))
    }

    /// Send the next alert and start the acknowledgement window.
    ///
    /// Valid from either countdown; callers check which one applies.
    fn dispatch(self: &Arc<Self>, state: &mut State) {
        let Some(attempt) = state.session.begin_dispatch(Utc::now()) else {
            return;
        };
        self.cancel_timer(state);

        let session_id = state.session.id();
        let request = DispatchRequest {
            session_id,
            attempt,
            location: state.session.location().cloned(),
            recipients: self.contacts.recipients_for(attempt),
            message: alert_message(attempt, state.session.location()),
            requested_at: state.session.last_dispatch_at().unwrap_or_else(Utc::now),
        };
        state.log.record(session_id, LogEvent::Dispatched { attempt });
        info!(
            session = session_id,
            attempt,
            recipients = request.recipients.len(),
            "dispatching SOS alert"
        );
        self.notify_dispatched(&request);

        let dispatcher = Arc::clone(&self.dispatcher);
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let ok = match dispatcher.dispatch_alert(&request).await {
                Ok(receipt) => {
                    debug!(
                        session = request.session_id,
                        attempt = request.attempt,
                        delivered_to = receipt.delivered_to,
                        "alert delivered"
                    );
                    true
                }
                Err(e) => {
                    warn!(
                        session = request.session_id,
                        attempt = request.attempt,
                        error = %e,
                        "alert dispatch failed"
                    );
                    false
                }
            };
            if let Some(shared) = weak.upgrade() {
                shared.state.lock().await.log.record(
                    request.session_id,
                    LogEvent::DispatchCompleted {
                        attempt: request.attempt,
                        ok,
                    },
                );
            }
        });

        state.session.await_acknowledgement();
        self.schedule(state, TimerKind::AcknowledgementWindow);
        self.publish(state);
    }

    fn notify_dispatched(&self, request: &DispatchRequest) {
        if request.is_retry() {
            self.notifier.notify(Notice::warning(format!(
                "Retry SOS alert #{} sent!",
                request.attempt
            )));
            self.notifier.notify(Notice::info(
                "Escalating emergency - sending to additional contacts!",
            ));
        } else {
            self.notifier
                .notify(Notice::success("Emergency alert sent to authorities!"));
            if request.location.is_some() {
                self.notifier
                    .notify(Notice::success("Location shared with emergency contacts!"));
            }
            self.notifier
                .notify(Notice::success("SMS alerts sent to emergency contacts!"));
        }
    }

    /// Apply one countdown tick. Returns `false` once the timer should stop.
    fn on_tick(self: &Arc<Self>, state: &mut State, epoch: u64) -> bool {
        if state.epoch != epoch {
            return false;
        }
        match state.session.tick() {
            Some(Countdown::Ticking(remaining)) => {
                trace!(session = state.session.id(), remaining, "countdown tick");
                self.publish(state);
                true
            }
            Some(Countdown::Elapsed) => {
                self.dispatch(state);
                false
            }
            None => false,
        }
    }

    fn on_acknowledgement_timeout(self: &Arc<Self>, state: &mut State, epoch: u64) {
        if state.epoch != epoch {
            return;
        }
        let attempt = state.session.attempt_count();
        if !state.session.begin_retry_countdown(self.timing.retry_ticks) {
            return;
        }
        let session_id = state.session.id();
        state.log.record(session_id, LogEvent::NoResponse { attempt });
        info!(
            session = session_id,
            attempt,
            retry_ticks = self.timing.retry_ticks,
            "no acknowledgement, retry scheduled"
        );
        self.notifier.notify(Notice::warning(format!(
            "No response received. Auto-retry in {}...",
            self.countdown_text(self.timing.retry_ticks)
        )));
        self.schedule(state, TimerKind::Countdown);
        self.publish(state);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(handle) = self.state.get_mut().timer.take() {
            handle.abort();
        }
    }
}

async fn run_countdown(weak: Weak<Shared>, epoch: u64, tick: Duration) {
    let mut interval = time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;
    loop {
        interval.tick().await;
        let Some(shared) = weak.upgrade() else {
            return;
        };
        let mut state = shared.state.lock().await;
        if !shared.on_tick(&mut state, epoch) {
            return;
        }
    }
}

async fn run_acknowledgement_window(weak: Weak<Shared>, epoch: u64, window: Duration) {
    time::sleep(window).await;
    let Some(shared) = weak.upgrade() else {
        return;
    };
    let mut state = shared.state.lock().await;
    shared.on_acknowledgement_timeout(&mut state, epoch);
}

/// Format a duration as `30s`, `1m 30s`, or `500ms`.
fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs == 0 {
        format!("{}ms", d.as_millis())
    } else if secs < 60 {
        format!("{secs}s")
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
