//! SQLite schema definition.

/// Complete database schema for the patient chat.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients (admin-managed, read-only from the chat)
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    date_of_birth TEXT NOT NULL,
    phone_number TEXT NOT NULL,
    email TEXT NOT NULL,
    medical_condition TEXT NOT NULL,
    medication_regimen TEXT NOT NULL,
    last_appointment TEXT NOT NULL,
    next_appointment TEXT NOT NULL,
    doctor_name TEXT NOT NULL
);

-- ============================================================================
-- Messages (append-only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    sender TEXT NOT NULL CHECK (sender IN ('patient', 'bot')),
    text TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_patient ON messages(patient_id, timestamp);

-- ============================================================================
-- Appointment change requests
-- ============================================================================

CREATE TABLE IF NOT EXISTS appointment_change_requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    requested_time TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    reviewed INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_appointment_requests_patient
    ON appointment_change_requests(patient_id, reviewed);
"#;
