//! Appointment change request operations.

use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Row};

use super::{Database, DbResult};
use crate::models::AppointmentChangeRequest;

impl Database {
    /// Record a requested appointment time. New requests start unreviewed.
    pub fn insert_appointment_request(
        &self,
        patient_id: i64,
        requested_time: NaiveDateTime,
    ) -> DbResult<AppointmentChangeRequest> {
        let timestamp = Utc::now();
        self.conn.execute(
            r#"
            INSERT INTO appointment_change_requests (patient_id, requested_time, timestamp, reviewed)
            VALUES (?1, ?2, ?3, 0)
            "#,
            params![patient_id, requested_time, timestamp],
        )?;

        Ok(AppointmentChangeRequest {
            id: self.conn.last_insert_rowid(),
            patient_id,
            requested_time,
            timestamp,
            reviewed: false,
        })
    }

    /// Requests for a patient still waiting on review, oldest first.
    pub fn list_unreviewed_appointment_requests(
        &self,
        patient_id: i64,
    ) -> DbResult<Vec<AppointmentChangeRequest>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, patient_id, requested_time, timestamp, reviewed
            FROM appointment_change_requests
            WHERE patient_id = ? AND reviewed = 0
            ORDER BY timestamp, id
            "#,
        )?;
        let rows = stmt.query_map([patient_id], request_from_row)?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?);
        }
        Ok(requests)
    }

    /// Every request across patients, newest first.
    pub fn list_appointment_requests(&self) -> DbResult<Vec<AppointmentChangeRequest>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, patient_id, requested_time, timestamp, reviewed
            FROM appointment_change_requests
            ORDER BY timestamp DESC, id DESC
            "#,
        )?;
        let rows = stmt.query_map([], request_from_row)?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?);
        }
        Ok(requests)
    }

    /// Flag a request as reviewed. Returns false if no such request exists.
    pub fn mark_appointment_reviewed(&self, id: i64) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE appointment_change_requests SET reviewed = 1 WHERE id = ?",
            [id],
        )?;
        Ok(rows_affected > 0)
    }
}

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<AppointmentChangeRequest> {
    Ok(AppointmentChangeRequest {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        requested_time: row.get(2)?,
        timestamp: row.get(3)?,
        reviewed: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_new_patient;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_insert_request_unreviewed() {
        let db = Database::open_in_memory().unwrap();
        let patient = db.insert_patient(&sample_new_patient()).unwrap();

        let request = db.insert_appointment_request(patient.id, at(3, 10)).unwrap();
        assert!(!request.reviewed);

        let pending = db.list_unreviewed_appointment_requests(patient.id).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].requested_time, at(3, 10));
        assert_eq!(pending[0].id, request.id);
    }

    #[test]
    fn test_mark_reviewed_hides_request() {
        let db = Database::open_in_memory().unwrap();
        let patient = db.insert_patient(&sample_new_patient()).unwrap();

        let first = db.insert_appointment_request(patient.id, at(3, 10)).unwrap();
        let second = db.insert_appointment_request(patient.id, at(4, 11)).unwrap();

        assert!(db.mark_appointment_reviewed(first.id).unwrap());
        assert!(!db.mark_appointment_reviewed(999).unwrap());

        let pending = db.list_unreviewed_appointment_requests(patient.id).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second.id);

        let all = db.list_appointment_requests().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert!(all[1].reviewed);
    }
}
