use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use super::domain::{ApplicationId, ApplicationRecord, PersonKey, Program};

/// Administrative status that removes an application from allocation entirely.
pub const TERMINAL_REJECTION_STATUS: &str = "rejected";

/// Read-only source of the program capacity table and the open application snapshot.
pub trait SnapshotSource: Send + Sync {
    /// Programs flagged active, with their seat counts.
    fn active_programs(&self) -> Result<Vec<Program>, SnapshotError>;
    /// Applications not in the terminal rejection state, in storage order.
    fn open_applications(&self) -> Result<Vec<ApplicationRecord>, SnapshotError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to open snapshot file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid snapshot CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("snapshot source unavailable: {0}")]
    Unavailable(String),
}

/// Fixed snapshot held in memory, for tests and one-off runs.
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotSource {
    programs: Vec<Program>,
    applications: Vec<ApplicationRecord>,
}

impl InMemorySnapshotSource {
    pub fn new(programs: Vec<Program>, applications: Vec<ApplicationRecord>) -> Self {
        Self {
            programs,
            applications,
        }
    }
}

impl SnapshotSource for InMemorySnapshotSource {
    fn active_programs(&self) -> Result<Vec<Program>, SnapshotError> {
        Ok(self.programs.clone())
    }

    fn open_applications(&self) -> Result<Vec<ApplicationRecord>, SnapshotError> {
        Ok(self.applications.clone())
    }
}

/// Snapshot exported as two CSV files, re-read on every call so each run sees current data.
#[derive(Debug, Clone)]
pub struct CsvSnapshotSource {
    programs_path: PathBuf,
    applications_path: PathBuf,
}

impl CsvSnapshotSource {
    pub fn new(programs_path: impl Into<PathBuf>, applications_path: impl Into<PathBuf>) -> Self {
        Self {
            programs_path: programs_path.into(),
            applications_path: applications_path.into(),
        }
    }

    pub fn programs_path(&self) -> &Path {
        &self.programs_path
    }

    pub fn applications_path(&self) -> &Path {
        &self.applications_path
    }
}

impl SnapshotSource for CsvSnapshotSource {
    fn active_programs(&self) -> Result<Vec<Program>, SnapshotError> {
        let file = open(&self.programs_path)?;
        Ok(read_programs(file)?)
    }

    fn open_applications(&self) -> Result<Vec<ApplicationRecord>, SnapshotError> {
        let file = open(&self.applications_path)?;
        Ok(read_applications(file)?)
    }
}

fn open(path: &Path) -> Result<File, SnapshotError> {
    File::open(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse `name,capacity[,active]` rows, keeping active programs only.
pub fn read_programs<R: Read>(reader: R) -> Result<Vec<Program>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut programs = Vec::new();

    for row in csv_reader.deserialize::<ProgramRow>() {
        let row = row?;
        if row.active {
            programs.push(Program::new(row.name, row.capacity));
        }
    }

    Ok(programs)
}

/// Parse application rows, skipping records in the terminal rejection state.
pub fn read_applications<R: Read>(reader: R) -> Result<Vec<ApplicationRecord>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut applications = Vec::new();

    for row in csv_reader.deserialize::<ApplicationRow>() {
        let row = row?;
        if row.is_terminally_rejected() {
            continue;
        }
        applications.push(row.into_record());
    }

    Ok(applications)
}

#[derive(Debug, Deserialize)]
struct ProgramRow {
    name: String,
    capacity: u32,
    #[serde(default = "active_by_default", deserialize_with = "flag")]
    active: bool,
}

#[derive(Debug, Deserialize)]
struct ApplicationRow {
    id: String,
    person_key: String,
    program: String,
    priority: u32,
    #[serde(default)]
    score: Option<u32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    phone: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    status: Option<String>,
}

impl ApplicationRow {
    fn is_terminally_rejected(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|status| status.eq_ignore_ascii_case(TERMINAL_REJECTION_STATUS))
    }

    fn into_record(self) -> ApplicationRecord {
        ApplicationRecord {
            id: ApplicationId(self.id),
            person_key: PersonKey(self.person_key),
            program: self.program,
            priority: self.priority,
            score: self.score,
            name: self.name,
            phone: self.phone,
        }
    }
}

fn active_by_default() -> bool {
    true
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "1" | "true" | "yes" | "y" => Ok(true),
        "0" | "false" | "no" | "n" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected a boolean flag, got '{other}'"
        ))),
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn programs_skip_inactive_rows() {
        let csv = "name,capacity,active\nPhysics,10,1\nArchived,5,0\nBiology,0,true\nLaw,3,\n";

        let programs = read_programs(Cursor::new(csv)).expect("programs parse");

        assert_eq!(
            programs,
            vec![
                Program::new("Physics", 10),
                Program::new("Biology", 0),
                Program::new("Law", 3),
            ]
        );
    }

    #[test]
    fn programs_default_to_active_without_column() {
        let csv = "name,capacity\nPhysics,2\n";

        let programs = read_programs(Cursor::new(csv)).expect("programs parse");

        assert_eq!(programs, vec![Program::new("Physics", 2)]);
    }

    #[test]
    fn programs_reject_unknown_flags() {
        let csv = "name,capacity,active\nPhysics,2,maybe\n";

        assert!(read_programs(Cursor::new(csv)).is_err());
    }

    #[test]
    fn applications_drop_terminal_rejections_and_blank_scores() {
        let csv = "id,person_key,program,priority,score,name,phone,status\n\
                   1,111-222,Physics,1,245,Ivan Petrov,+70000000001,new\n\
                   2,111-222,Biology,2,,Ivan Petrov,,in_review\n\
                   3,333-444,Physics,1,199,Olga Smirnova,+70000000002,Rejected\n";

        let applications = read_applications(Cursor::new(csv)).expect("applications parse");

        assert_eq!(applications.len(), 2);
        assert_eq!(applications[0].score, Some(245));
        assert_eq!(applications[0].name.as_deref(), Some("Ivan Petrov"));
        assert_eq!(applications[1].score, None);
        assert_eq!(applications[1].phone, None);
        assert_eq!(applications[1].priority, 2);
        assert_eq!(applications[1].person_key, PersonKey("111-222".to_string()));
    }

    #[test]
    fn applications_accept_minimal_columns() {
        let csv = "id,person_key,program,priority\nA1,P1,Physics,1\n";

        let applications = read_applications(Cursor::new(csv)).expect("applications parse");

        assert_eq!(applications.len(), 1);
        assert_eq!(applications[0].score, None);
        assert_eq!(applications[0].effective_score(), 0);
    }

    #[test]
    fn csv_source_reports_missing_files() {
        let source = CsvSnapshotSource::new(
            "/nonexistent/admissions/programs.csv",
            "/nonexistent/admissions/applications.csv",
        );

        match source.active_programs() {
            Err(SnapshotError::Io { path, .. }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/admissions/programs.csv"))
            }
            other => panic!("expected io error, got {other:?}"),
        }
    }
}
