//! `sosguard` - SOS alert escalation controller
//!
//! Once a user commits to raising an emergency alert, the controller either
//! keeps escalating until someone confirms help arrived, or the user aborts
//! during a short arming window before anything is sent.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod location;
pub mod log;
pub mod logging;
pub mod session;

pub use config::Config;
pub use controller::SosController;
pub use dispatch::{
    AlertDispatcher, ContactDirectory, DispatchReceipt, DispatchRequest, EmergencyContact,
    LogDispatcher, Notice, NoticeLevel, Notifier, TracingNotifier,
};
pub use error::{Error, Result};
pub use location::{Location, LocationProvider, StaticLocation};
pub use logging::init_logging;
pub use session::{AlertPhase, AlertSession, PhaseKind, SessionSnapshot};
