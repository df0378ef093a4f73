//! Compliance tracking for legally mandated marriage forms.
//!
//! Deadlines are anchored to the ceremony date, reminders are scheduled against those
//! deadlines, and periodic sweeps keep record status and alerts current.

pub mod compliance;
pub mod config;
pub mod error;
pub mod telemetry;
