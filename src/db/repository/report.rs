use std::str::FromStr;

use rusqlite::{params, Connection};

use crate::db::repository::parse_timestamp;
use crate::db::DatabaseError;
use crate::models::{DiseaseType, ImageResult, Report};

pub fn insert_report(conn: &Connection, report: &Report) -> Result<(), DatabaseError> {
    let image_results = serde_json::to_string(&report.image_results)
        .map_err(|e| DatabaseError::CorruptRow(e.to_string()))?;

    conn.execute(
        "INSERT INTO reports (report_id, patient_email, patient_name, patient_age,
                              patient_gender, doctor_email, disease_type, disease_name,
                              probability, has_disease, confidence_percentage,
                              image_results, images_requested, images_evaluated, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            report.report_id,
            report.patient_email,
            report.patient_name,
            report.patient_age,
            report.patient_gender,
            report.doctor_email,
            report.disease_type.as_str(),
            report.disease_name,
            report.probability,
            report.has_disease,
            report.confidence_percentage,
            image_results,
            report.images_requested,
            report.images_evaluated,
            report.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_report(conn: &Connection, report_id: &str) -> Result<Option<Report>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT report_id, patient_email, patient_name, patient_age, patient_gender,
                doctor_email, disease_type, disease_name, probability, has_disease,
                confidence_percentage, image_results, images_requested, images_evaluated,
                created_at
         FROM reports WHERE report_id = ?1",
    )?;

    let mut rows = stmt.query_map(params![report_id], row_to_parts)?;
    match rows.next() {
        Some(row) => Ok(Some(report_from_row(row?)?)),
        None => Ok(None),
    }
}

/// All reports for one patient, newest first. Feeds the clinician's
/// history view.
pub fn reports_for_patient(
    conn: &Connection,
    patient_email: &str,
) -> Result<Vec<Report>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT report_id, patient_email, patient_name, patient_age, patient_gender,
                doctor_email, disease_type, disease_name, probability, has_disease,
                confidence_percentage, image_results, images_requested, images_evaluated,
                created_at
         FROM reports WHERE patient_email = ?1 ORDER BY created_at DESC",
    )?;

    let rows = stmt.query_map(params![patient_email], row_to_parts)?;
    let mut reports = Vec::new();
    for row in rows {
        reports.push(report_from_row(row?)?);
    }
    Ok(reports)
}

type ReportParts = (
    String,
    Option<String>,
    String,
    Option<u32>,
    Option<String>,
    String,
    String,
    String,
    f64,
    bool,
    f64,
    String,
    u32,
    u32,
    String,
);

fn row_to_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReportParts> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
        row.get(13)?,
        row.get(14)?,
    ))
}

fn report_from_row(parts: ReportParts) -> Result<Report, DatabaseError> {
    let (
        report_id,
        patient_email,
        patient_name,
        patient_age,
        patient_gender,
        doctor_email,
        disease_type,
        disease_name,
        probability,
        has_disease,
        confidence_percentage,
        image_results,
        images_requested,
        images_evaluated,
        created_at,
    ) = parts;

    let image_results: Vec<ImageResult> = serde_json::from_str(&image_results)
        .map_err(|e| DatabaseError::CorruptRow(e.to_string()))?;

    Ok(Report {
        report_id,
        patient_email,
        patient_name,
        patient_age,
        patient_gender,
        doctor_email,
        disease_type: DiseaseType::from_str(&disease_type)?,
        disease_name,
        probability,
        has_disease,
        confidence_percentage,
        image_results,
        images_requested,
        images_evaluated,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::Utc;

    fn sample_report(id: &str, patient: Option<&str>) -> Report {
        Report {
            report_id: id.into(),
            patient_email: patient.map(String::from),
            patient_name: "Pat Doe".into(),
            patient_age: Some(51),
            patient_gender: Some("male".into()),
            doctor_email: "doc@example.com".into(),
            disease_type: DiseaseType::Pneumonia,
            disease_name: "Pneumonia".into(),
            probability: 0.8833,
            has_disease: true,
            confidence_percentage: 88.33,
            image_results: vec![
                ImageResult {
                    probability: 0.9,
                    label: "Pneumonia".into(),
                },
                ImageResult {
                    probability: 0.8,
                    label: "Pneumonia".into(),
                },
            ],
            images_requested: 3,
            images_evaluated: 2,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn insert_and_fetch_round_trips_image_results() {
        let conn = open_memory_database().unwrap();
        insert_report(&conn, &sample_report("RPT-1", Some("pat@example.com"))).unwrap();

        let fetched = get_report(&conn, "RPT-1").unwrap().unwrap();
        assert_eq!(fetched.disease_type, DiseaseType::Pneumonia);
        assert_eq!(fetched.image_results.len(), 2);
        assert_eq!(fetched.images_requested, 3);
        assert_eq!(fetched.images_evaluated, 2);
        assert_eq!(fetched.patient_email.as_deref(), Some("pat@example.com"));
    }

    #[test]
    fn duplicate_report_id_is_rejected() {
        let conn = open_memory_database().unwrap();
        insert_report(&conn, &sample_report("RPT-1", None)).unwrap();
        assert!(insert_report(&conn, &sample_report("RPT-1", None)).is_err());
    }

    #[test]
    fn reports_for_patient_filters_by_email() {
        let conn = open_memory_database().unwrap();
        insert_report(&conn, &sample_report("RPT-1", Some("a@example.com"))).unwrap();
        insert_report(&conn, &sample_report("RPT-2", Some("b@example.com"))).unwrap();

        let reports = reports_for_patient(&conn, "a@example.com").unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].report_id, "RPT-1");
    }
}
