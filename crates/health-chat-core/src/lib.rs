//! Health Chat Core Library
//!
//! Records and rules behind the patient chat.
//!
//! # Flow
//!
//! ```text
//! patient message ─▶ detect_intent ─┬─ AppointmentChange ─▶ TimeParser ─▶ appointment_change_requests
//!                                   ├─ MedicationChange  ─▶ canned reply
//!                                   └─ General           ─▶ conversation_history ─▶ LLM prompt
//!
//! every exchange ─▶ messages (append-only)
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite store for patients, messages and appointment requests
//! - [`models`]: Domain types (Patient, Message, AppointmentChangeRequest)
//! - [`intent`]: Keyword intent detection
//! - [`timeparse`]: Requested appointment time parsing and formatting
//! - [`history`]: Word-budgeted conversation window for prompts

pub mod db;
pub mod history;
pub mod intent;
pub mod models;
pub mod timeparse;

// Re-export commonly used types
pub use db::{Database, DbError, DbResult};
pub use history::{conversation_history, DEFAULT_HISTORY_TOKENS, HISTORY_MESSAGE_LIMIT};
pub use intent::{detect_appointment_change, detect_intent, detect_medication_change, Intent};
pub use models::{AppointmentChangeRequest, Message, NewPatient, Patient, Sender};
pub use timeparse::{format_appointment, parse_requested_time, TimeParser};
