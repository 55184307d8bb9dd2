//! Capabilities the escalation controller calls into.
//!
//! The controller owns *when* an alert goes out; these traits own *how*.
//! [`AlertDispatcher`] reaches emergency contacts and authorities, and
//! [`Notifier`] surfaces short status messages to whoever is holding the
//! device.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::location::Location;

/// Who an emergency contact is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    /// Police, ambulance, fire and similar services.
    Authority,
    /// Family, friends, travel companions.
    Personal,
}

impl fmt::Display for ContactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authority => write!(f, "authority"),
            Self::Personal => write!(f, "personal"),
        }
    }
}

/// A single party that can be alerted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    /// Display name.
    pub name: String,
    /// Phone number to call or text.
    pub number: String,
    /// Kind of contact.
    pub kind: ContactKind,
    /// Primary contacts are alerted on the first dispatch; the rest only
    /// once the alert escalates.
    #[serde(default = "default_primary")]
    pub primary: bool,
}

fn default_primary() -> bool {
    true
}

impl EmergencyContact {
    /// Create a primary authority contact.
    #[must_use]
    pub fn authority(name: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            number: number.into(),
            kind: ContactKind::Authority,
            primary: true,
        }
    }

    /// Create a personal contact.
    #[must_use]
    pub fn personal(name: impl Into<String>, number: impl Into<String>, primary: bool) -> Self {
        Self {
            name: name.into(),
            number: number.into(),
            kind: ContactKind::Personal,
            primary,
        }
    }
}

/// The set of parties an alert may be sent to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContactDirectory {
    contacts: Vec<EmergencyContact>,
}

impl ContactDirectory {
    /// Build a directory from a list of contacts.
    #[must_use]
    pub fn new(contacts: Vec<EmergencyContact>) -> Self {
        Self { contacts }
    }

    /// All contacts, in configuration order.
    #[must_use]
    pub fn contacts(&self) -> &[EmergencyContact] {
        &self.contacts
    }

    /// Recipients for the given attempt.
    ///
    /// The first attempt goes to authorities and primary contacts. Every
    /// retry escalates to the whole directory.
    #[must_use]
    pub fn recipients_for(&self, attempt: u32) -> Vec<EmergencyContact> {
        self.contacts
            .iter()
            .filter(|c| attempt > 1 || c.kind == ContactKind::Authority || c.primary)
            .cloned()
            .collect()
    }
}

/// Everything a dispatcher needs to send one alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchRequest {
    /// Session this alert belongs to.
    pub session_id: u64,
    /// 1-based attempt number within the session.
    pub attempt: u32,
    /// Where the user was when the session was armed.
    pub location: Option<Location>,
    /// Parties to alert.
    pub recipients: Vec<EmergencyContact>,
    /// Alert text.
    pub message: String,
    /// When the controller issued the request.
    pub requested_at: DateTime<Utc>,
}

impl DispatchRequest {
    /// Whether this request escalates a previous, unacknowledged alert.
    #[must_use]
    pub fn is_retry(&self) -> bool {
        self.attempt > 1
    }
}

/// Alert text for the given attempt, with a map link when the location is
/// known.
#[must_use]
pub fn alert_message(attempt: u32, location: Option<&Location>) -> String {
    let text = if attempt <= 1 {
        "Emergency SOS activated - immediate assistance required".to_string()
    } else {
        format!("Retry SOS alert #{attempt} - escalating emergency")
    };
    match location {
        Some(location) => format!("{text}. {}", location.share_text()),
        None => text,
    }
}

/// Proof that a dispatcher accepted an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReceipt {
    /// Number of recipients the alert was handed to.
    pub delivered_to: usize,
}

/// Sends alerts to emergency contacts and authorities.
///
/// The controller does not wait on this: the call is spawned and its outcome
/// is only logged.
#[async_trait::async_trait]
pub trait AlertDispatcher: Send + Sync {
    /// Deliver one alert.
    ///
    /// # Errors
    ///
    /// Returns an error if the alert could not be handed to any channel.
    async fn dispatch_alert(&self, request: &DispatchRequest) -> Result<DispatchReceipt>;
}

/// A dispatcher that writes alerts to the log and reports success.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDispatcher;

#[async_trait::async_trait]
impl AlertDispatcher for LogDispatcher {
    async fn dispatch_alert(&self, request: &DispatchRequest) -> Result<DispatchReceipt> {
        let (location, maps) = match &request.location {
            Some(location) => (location.to_string(), location.maps_url()),
            None => ("unknown".to_string(), "none".to_string()),
        };
        for contact in &request.recipients {
            info!(
                session = request.session_id,
                attempt = request.attempt,
                to = %contact.name,
                number = %contact.number,
                %location,
                %maps,
                "{}",
                request.message
            );
        }
        Ok(DispatchReceipt {
            delivered_to: request.recipients.len(),
        })
    }
}

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    /// Neutral status.
    Info,
    /// Something the user asked for worked.
    Success,
    /// Needs the user's attention.
    Warning,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A short message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Text to show.
    pub message: String,
}

impl Notice {
    /// An informational notice.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    /// A success notice.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    /// A warning notice.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }
}

/// Surfaces notices to the user (toasts, banners, console lines).
///
/// Called with the controller's lock held, so implementations must not block.
pub trait Notifier: Send + Sync {
    /// Show one notice.
    fn notify(&self, notice: Notice);
}

/// A notifier that forwards notices to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Warning => warn!("{}", notice.message),
            NoticeLevel::Info | NoticeLevel::Success => info!("{}", notice.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> ContactDirectory {
        ContactDirectory::new(vec![
            EmergencyContact::authority("Police", "100"),
            EmergencyContact::personal("Asha", "+91-98470-00001", true),
            EmergencyContact::personal("Ravi", "+91-98470-00002", false),
        ])
    }

    #[test]
    fn test_recipients_first_attempt() {
        let names: Vec<_> = directory()
            .recipients_for(1)
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Police", "Asha"]);
    }

    #[test]
    fn test_recipients_escalate_on_retry() {
        assert_eq!(directory().recipients_for(2).len(), 3);
        assert_eq!(directory().recipients_for(7).len(), 3);
    }

    #[test]
    fn test_alert_message() {
        assert!(alert_message(1, None).contains("immediate assistance"));
        assert!(alert_message(3, None).contains("#3"));
        assert!(!alert_message(1, None).contains("maps.google.com"));
    }

    #[test]
    fn test_alert_message_carries_map_link() {
        let loc = Location::new(9.9312, 76.2673, None).unwrap();
        let message = alert_message(2, Some(&loc));
        assert!(message.starts_with("Retry SOS alert #2"));
        assert!(message.ends_with("Emergency location: https://maps.google.com/?q=9.9312,76.2673"));
    }

    #[test]
    fn test_contact_kind_display() {
        assert_eq!(ContactKind::Authority.to_string(), "authority");
        assert_eq!(ContactKind::Personal.to_string(), "personal");
    }

    #[test]
    fn test_contact_deserialize_defaults_primary() {
        let json = r#"{"name": "Ravi", "number": "123", "kind": "personal"}"#;
        let contact: EmergencyContact = serde_json::from_str(json).unwrap();
        assert!(contact.primary);
        assert_eq!(contact.kind, ContactKind::Personal);
    }

    #[test]
    fn test_notice_constructors() {
        assert_eq!(Notice::info("a").level, NoticeLevel::Info);
        assert_eq!(Notice::success("b").level, NoticeLevel::Success);
        assert_eq!(Notice::warning("c").level, NoticeLevel::Warning);
    }

    #[test]
    fn test_tracing_notifier_accepts_all_levels() {
        crate::logging::init_test_logging();
        let notifier: &dyn Notifier = &TracingNotifier;
        notifier.notify(Notice::info("SOS activation cancelled"));
        notifier.notify(Notice::warning("No response received"));
    }

    #[tokio::test]
    async fn test_log_dispatcher_reports_recipients() {
        let request = DispatchRequest {
            session_id: 1,
            attempt: 1,
            location: Some(Location::new(9.9312, 76.2673, None).unwrap()),
            recipients: directory().recipients_for(1),
            message: alert_message(1, None),
            requested_at: Utc::now(),
        };
        assert!(!request.is_retry());
        let receipt = LogDispatcher.dispatch_alert(&request).await.unwrap();
        assert_eq!(receipt.delivered_to, 2);
    }
}
