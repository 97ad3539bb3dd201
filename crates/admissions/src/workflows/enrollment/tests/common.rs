use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::response::Response;
use serde_json::Value;

use crate::workflows::enrollment::domain::{
    ApplicationId, ApplicationRecord, EnrollmentResults, PersonKey, Program,
};
use crate::workflows::enrollment::jobs::{InMemoryJobStore, JobId, JobRecord, JobStage, JobStore};
use crate::workflows::enrollment::report::{CsvReportRenderer, ReportError, ReportRenderer};
use crate::workflows::enrollment::service::{EnrollmentJobService, ReportSettings};
use crate::workflows::enrollment::snapshot::{
    InMemorySnapshotSource, SnapshotError, SnapshotSource,
};
use crate::workflows::enrollment::AllocationEngine;

pub(super) type MemoryService =
    EnrollmentJobService<InMemorySnapshotSource, InMemoryJobStore, CsvReportRenderer>;

pub(super) fn application(
    id: &str,
    person: &str,
    program: &str,
    priority: u32,
    score: Option<u32>,
) -> ApplicationRecord {
    ApplicationRecord {
        id: ApplicationId(id.to_string()),
        person_key: PersonKey(person.to_string()),
        program: program.to_string(),
        priority,
        score,
        name: Some(format!("Applicant {person}")),
        phone: None,
    }
}

/// X outranks Y on A; X keeps B as a backup that ends up withdrawn.
pub(super) fn contested_snapshot() -> InMemorySnapshotSource {
    InMemorySnapshotSource::new(
        vec![Program::new("A", 1), Program::new("B", 1)],
        vec![
            application("x-a", "X", "A", 1, Some(100)),
            application("x-b", "X", "B", 2, Some(100)),
            application("y-a", "Y", "A", 1, Some(90)),
        ],
    )
}

pub(super) fn temp_report_dir() -> PathBuf {
    std::env::temp_dir().join(format!("admissions-jobs-{}", uuid::Uuid::new_v4()))
}

pub(super) fn settings(report_dir: &Path) -> ReportSettings {
    ReportSettings {
        report_dir: report_dir.to_path_buf(),
        public_prefix: "/uploads/enrollment".to_string(),
    }
}

pub(super) fn build_service<S, R>(
    source: S,
    renderer: R,
) -> (
    Arc<EnrollmentJobService<S, InMemoryJobStore, R>>,
    Arc<InMemoryJobStore>,
    PathBuf,
)
where
    S: SnapshotSource + 'static,
    R: ReportRenderer + 'static,
{
    let report_dir = temp_report_dir();
    let jobs = Arc::new(InMemoryJobStore::default());
    let service = Arc::new(EnrollmentJobService::new(
        Arc::new(source),
        jobs.clone(),
        Arc::new(renderer),
        AllocationEngine::default(),
        settings(&report_dir),
    ));
    (service, jobs, report_dir)
}

pub(super) fn memory_service() -> (Arc<MemoryService>, Arc<InMemoryJobStore>, PathBuf) {
    build_service(contested_snapshot(), CsvReportRenderer)
}

/// Poll until the job reaches a terminal stage, collecting every stage observed on the way.
pub(super) async fn wait_for_terminal<S, J, R>(
    service: &Arc<EnrollmentJobService<S, J, R>>,
    job_id: &JobId,
) -> (JobRecord, Vec<JobStage>)
where
    S: SnapshotSource + 'static,
    J: JobStore + 'static,
    R: ReportRenderer + 'static,
{
    let mut observed = Vec::new();
    for _ in 0..500 {
        let record = service.status(job_id).expect("job registered");
        if observed.last() != Some(&record.stage) {
            observed.push(record.stage);
        }
        if record.stage.is_terminal() {
            return (record, observed);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not finish; stages seen: {observed:?}");
}

pub(super) fn stage_rank(stage: JobStage) -> u8 {
    match stage {
        JobStage::Pending => 0,
        JobStage::Processing => 1,
        JobStage::Completed | JobStage::Error => 2,
    }
}

pub(super) fn cleanup(report_dir: &Path) {
    let _ = std::fs::remove_dir_all(report_dir);
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) struct UnavailableSource;

impl SnapshotSource for UnavailableSource {
    fn active_programs(&self) -> Result<Vec<Program>, SnapshotError> {
        Err(SnapshotError::Unavailable("database offline".to_string()))
    }

    fn open_applications(&self) -> Result<Vec<ApplicationRecord>, SnapshotError> {
        Err(SnapshotError::Unavailable("database offline".to_string()))
    }
}

pub(super) struct PanickingSource;

impl SnapshotSource for PanickingSource {
    fn active_programs(&self) -> Result<Vec<Program>, SnapshotError> {
        panic!("corrupted capacity table");
    }

    fn open_applications(&self) -> Result<Vec<ApplicationRecord>, SnapshotError> {
        Ok(Vec::new())
    }
}

pub(super) struct FailingRenderer;

impl ReportRenderer for FailingRenderer {
    fn render(
        &self,
        _results: &EnrollmentResults,
        _destination: &Path,
    ) -> Result<PathBuf, ReportError> {
        Err(ReportError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only volume",
        )))
    }
}

/// Writes the CSV roster under a different extension next to the requested destination.
pub(super) struct RenamingRenderer;

impl ReportRenderer for RenamingRenderer {
    fn render(
        &self,
        results: &EnrollmentResults,
        destination: &Path,
    ) -> Result<PathBuf, ReportError> {
        CsvReportRenderer.render(results, &destination.with_extension("xlsx.csv"))
    }
}

/// Writes the CSV roster into a subdirectory of the requested destination's folder.
pub(super) struct NestedRenderer;

impl ReportRenderer for NestedRenderer {
    fn render(
        &self,
        results: &EnrollmentResults,
        destination: &Path,
    ) -> Result<PathBuf, ReportError> {
        let parent = destination.parent().unwrap_or(Path::new("."));
        let name = destination.file_name().unwrap_or_default();
        CsvReportRenderer.render(results, &parent.join("nested").join(name))
    }
}
