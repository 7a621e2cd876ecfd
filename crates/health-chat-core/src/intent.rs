//! Keyword intent detection.
//!
//! Plain substring search over the lower-cased message. Appointment
//! vocabulary is checked before medication vocabulary and the first hit wins.

use serde::{Deserialize, Serialize};

/// Words that mark a request to move or book an appointment.
pub const APPOINTMENT_KEYWORDS: &[&str] =
    &["reschedule", "appointment", "schedule", "cancel", "book"];

/// Phrases that mark a request to change medication.
pub const MEDICATION_KEYWORDS: &[&str] = &[
    "medication change",
    "change medication",
    "new medication",
    "stop medication",
    "dosage",
    "increase dosage",
    "decrease dosage",
];

/// What the patient is asking for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    AppointmentChange,
    MedicationChange,
    /// Anything else; answered by the LLM
    General,
}

/// Classify a message.
pub fn detect_intent(text: &str) -> Intent {
    if detect_appointment_change(text) {
        Intent::AppointmentChange
    } else if detect_medication_change(text) {
        Intent::MedicationChange
    } else {
        Intent::General
    }
}

pub fn detect_appointment_change(text: &str) -> bool {
    contains_any(text, APPOINTMENT_KEYWORDS)
}

pub fn detect_medication_change(text: &str) -> bool {
    contains_any(text, MEDICATION_KEYWORDS)
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let lower = text.to_lowercase();
    keywords.iter().any(|keyword| lower.contains(keyword))
}
