use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::domain::{ApplicationRecord, EnrollmentResults};

/// Turns a computed roster into a downloadable artifact.
pub trait ReportRenderer: Send + Sync {
    /// Write the artifact to `destination`, returning the path that was written.
    fn render(
        &self,
        results: &EnrollmentResults,
        destination: &Path,
    ) -> Result<PathBuf, ReportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to write enrollment report: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode enrollment report: {0}")]
    Csv(#[from] csv::Error),
}

const HEADERS: [&str; 10] = [
    "program",
    "capacity",
    "outcome",
    "position",
    "application_id",
    "person_key",
    "name",
    "phone",
    "priority",
    "score",
];

/// Flat CSV roster: one row per enrolled or rejected application, grouped by program.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvReportRenderer;

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    program: &'a str,
    capacity: u32,
    outcome: &'static str,
    position: usize,
    application_id: &'a str,
    person_key: &'a str,
    name: &'a str,
    phone: &'a str,
    priority: u32,
    score: u32,
}

impl<'a> ReportRow<'a> {
    fn new(
        program: &'a str,
        capacity: u32,
        outcome: &'static str,
        position: usize,
        record: &'a ApplicationRecord,
    ) -> Self {
        Self {
            program,
            capacity,
            outcome,
            position,
            application_id: &record.id.0,
            person_key: &record.person_key.0,
            name: record.name.as_deref().unwrap_or("-"),
            phone: record.phone.as_deref().unwrap_or("-"),
            priority: record.priority,
            score: record.effective_score(),
        }
    }
}

impl CsvReportRenderer {
    pub fn write<W: Write>(
        &self,
        results: &EnrollmentResults,
        writer: W,
    ) -> Result<(), ReportError> {
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        csv_writer.write_record(HEADERS)?;

        for result in results.values() {
            let program = result.program_name.as_str();
            for (index, record) in result.enrolled.iter().enumerate() {
                csv_writer.serialize(ReportRow::new(
                    program,
                    result.capacity,
                    "enrolled",
                    index + 1,
                    record,
                ))?;
            }
            for (index, record) in result.rejected.iter().enumerate() {
                csv_writer.serialize(ReportRow::new(
                    program,
                    result.capacity,
                    "rejected",
                    index + 1,
                    record,
                ))?;
            }
        }

        csv_writer.flush()?;
        Ok(())
    }
}

impl ReportRenderer for CsvReportRenderer {
    fn render(
        &self,
        results: &EnrollmentResults,
        destination: &Path,
    ) -> Result<PathBuf, ReportError> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(destination)?;
        self.write(results, file)?;
        Ok(destination.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::enrollment::domain::{ApplicationId, EnrollmentResult, PersonKey};

    fn record(
        id: &str,
        person: &str,
        name: Option<&str>,
        score: Option<u32>,
    ) -> ApplicationRecord {
        ApplicationRecord {
            id: ApplicationId(id.to_string()),
            person_key: PersonKey(person.to_string()),
            program: "Physics".to_string(),
            priority: 1,
            score,
            name: name.map(str::to_string),
            phone: None,
        }
    }

    #[test]
    fn writes_enrolled_rows_before_rejected_rows() {
        let mut physics = EnrollmentResult::new("Physics", 1);
        physics
            .enrolled
            .push(record("a1", "P1", Some("Anna Volkova"), Some(280)));
        physics.rejected.push(record("a2", "P2", None, None));
        let mut results = EnrollmentResults::new();
        results.insert("Physics".to_string(), physics);
        results.insert("Law".to_string(), EnrollmentResult::new("Law", 2));

        let mut buffer = Vec::new();
        CsvReportRenderer
            .write(&results, &mut buffer)
            .expect("report writes");
        let output = String::from_utf8(buffer).expect("utf8 output");
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(
            lines,
            vec![
                "program,capacity,outcome,position,application_id,person_key,name,phone,priority,score",
                "Physics,1,enrolled,1,a1,P1,Anna Volkova,-,1,280",
                "Physics,1,rejected,1,a2,P2,-,-,1,0",
            ]
        );
    }

    #[test]
    fn render_creates_parent_directories() {
        let dir = std::env::temp_dir()
            .join(format!("admissions-report-{}", uuid::Uuid::new_v4()))
            .join("nested");
        let destination = dir.join("enrollment.csv");

        let written = CsvReportRenderer
            .render(&EnrollmentResults::new(), &destination)
            .expect("render succeeds");

        assert_eq!(written, destination);
        let contents = fs::read_to_string(&destination).expect("report readable");
        assert!(contents.starts_with("program,capacity,outcome"));
        let _ = fs::remove_dir_all(dir.parent().unwrap_or(&dir));
    }
}
