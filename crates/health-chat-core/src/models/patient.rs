//! Patient models.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A stored patient record.
///
/// Patients are created through admin tooling and only read by the chat flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Row ID assigned by the store
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub phone_number: String,
    pub email: String,
    /// Primary condition (e.g., "Type 2 diabetes")
    pub medical_condition: String,
    /// Free-text medication regimen
    pub medication_regimen: String,
    pub last_appointment: NaiveDateTime,
    pub next_appointment: NaiveDateTime,
    /// Treating doctor, without the "Dr." prefix
    pub doctor_name: String,
}

impl Patient {
    /// Full display name ("first last").
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl fmt::Display for Patient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

/// Fields for a patient that has not been stored yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub phone_number: String,
    pub email: String,
    pub medical_condition: String,
    pub medication_regimen: String,
    pub last_appointment: NaiveDateTime,
    pub next_appointment: NaiveDateTime,
    pub doctor_name: String,
}

impl NewPatient {
    /// Attach a store-assigned ID.
    pub fn with_id(self, id: i64) -> Patient {
        Patient {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            date_of_birth: self.date_of_birth,
            phone_number: self.phone_number,
            email: self.email,
            medical_condition: self.medical_condition,
            medication_regimen: self.medication_regimen,
            last_appointment: self.last_appointment,
            next_appointment: self.next_appointment,
            doctor_name: self.doctor_name,
        }
    }
}
