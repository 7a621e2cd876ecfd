//! Patient database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::{NewPatient, Patient};

const PATIENT_COLUMNS: &str = r#"
    id, first_name, last_name, date_of_birth, phone_number, email,
    medical_condition, medication_regimen, last_appointment, next_appointment,
    doctor_name
"#;

impl Database {
    /// Insert a new patient and return it with its assigned ID.
    pub fn insert_patient(&self, patient: &NewPatient) -> DbResult<Patient> {
        self.conn.execute(
            r#"
            INSERT INTO patients (
                first_name, last_name, date_of_birth, phone_number, email,
                medical_condition, medication_regimen, last_appointment,
                next_appointment, doctor_name
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                patient.first_name,
                patient.last_name,
                patient.date_of_birth,
                patient.phone_number,
                patient.email,
                patient.medical_condition,
                patient.medication_regimen,
                patient.last_appointment,
                patient.next_appointment,
                patient.doctor_name,
            ],
        )?;
        Ok(patient.clone().with_id(self.conn.last_insert_rowid()))
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: i64) -> DbResult<Option<Patient>> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?");
        self.conn
            .query_row(&sql, [id], patient_from_row)
            .optional()
            .map_err(Into::into)
    }

    /// The patient the chat talks to: the earliest record.
    pub fn first_patient(&self) -> DbResult<Option<Patient>> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients ORDER BY id LIMIT 1");
        self.conn
            .query_row(&sql, [], patient_from_row)
            .optional()
            .map_err(Into::into)
    }

    /// List all patients by ID.
    pub fn list_patients(&self) -> DbResult<Vec<Patient>> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], patient_from_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?);
        }
        Ok(patients)
    }

    /// Delete a patient together with their messages and requests.
    pub fn delete_patient(&self, id: i64) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM patients WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        date_of_birth: row.get(3)?,
        phone_number: row.get(4)?,
        email: row.get(5)?,
        medical_condition: row.get(6)?,
        medication_regimen: row.get(7)?,
        last_appointment: row.get(8)?,
        next_appointment: row.get(9)?,
        doctor_name: row.get(10)?,
    })
}
