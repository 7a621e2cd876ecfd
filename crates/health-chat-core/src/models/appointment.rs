//! Appointment change requests raised from the chat.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A patient's request to move their appointment.
///
/// Created by the chat flow when a time could be parsed; `reviewed` is only
/// flipped by admin tooling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentChangeRequest {
    pub id: i64,
    pub patient_id: i64,
    pub requested_time: NaiveDateTime,
    pub timestamp: DateTime<Utc>,
    pub reviewed: bool,
}

impl AppointmentChangeRequest {
    /// Admin-facing description, given the requesting patient's first name.
    pub fn describe(&self, first_name: &str) -> String {
        format!(
            "{} requested appointment change to {}",
            first_name, self.requested_time
        )
    }
}
