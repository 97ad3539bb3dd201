use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tracing::{debug, error, info, warn};

use super::allocation::{AllocationEngine, AllocationReport};
use super::domain::{summarize, ProgramSummary};
use super::jobs::{JobId, JobRecord, JobStage, JobStore, JobUpdate};
use super::report::{ReportError, ReportRenderer};
use super::snapshot::{SnapshotError, SnapshotSource};

/// Where rendered reports are written and how their download location is published.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub report_dir: PathBuf,
    pub public_prefix: String,
}

impl ReportSettings {
    pub fn public_location(&self, filename: &str) -> String {
        format!("{}/{}", self.public_prefix.trim_end_matches('/'), filename)
    }
}

/// Dispatcher running allocation jobs in the background and recording their progress.
pub struct EnrollmentJobService<S, J, R> {
    source: Arc<S>,
    jobs: Arc<J>,
    renderer: Arc<R>,
    engine: AllocationEngine,
    settings: ReportSettings,
}

struct CompletedRun {
    result_location: String,
    summary: Vec<ProgramSummary>,
}

impl<S, J, R> EnrollmentJobService<S, J, R>
where
    S: SnapshotSource + 'static,
    J: JobStore + 'static,
    R: ReportRenderer + 'static,
{
    pub fn new(
        source: Arc<S>,
        jobs: Arc<J>,
        renderer: Arc<R>,
        engine: AllocationEngine,
        settings: ReportSettings,
    ) -> Self {
        Self {
            source,
            jobs,
            renderer,
            engine,
            settings,
        }
    }

    /// Register a pending job and start its run on the tokio runtime.
    ///
    /// Returns as soon as the job is registered; callers poll [`Self::status`] for progress.
    /// Must be called from within a tokio runtime.
    pub fn submit(self: &Arc<Self>) -> JobId {
        let job_id = self.jobs.create();
        info!(%job_id, "enrollment calculation submitted");

        let service = Arc::clone(self);
        let background_id = job_id.clone();
        tokio::spawn(async move {
            service.execute(&background_id).await;
        });

        job_id
    }

    pub fn status(&self, job_id: &JobId) -> Option<JobRecord> {
        self.jobs.get(job_id)
    }

    pub fn forget(&self, job_id: &JobId) -> bool {
        self.jobs.delete(job_id)
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    /// Drive one job to a terminal stage. Failures end up on the job record, never here.
    pub async fn execute(self: Arc<Self>, job_id: &JobId) {
        match Arc::clone(&self).run(job_id).await {
            Ok(run) => {
                info!(%job_id, location = %run.result_location, "enrollment calculation completed");
                self.jobs.update(
                    job_id,
                    JobUpdate::stage(JobStage::Completed)
                        .progress(100)
                        .message("enrollment calculation completed")
                        .result_location(run.result_location)
                        .summary(run.summary),
                );
            }
            Err(err) => {
                error!(%job_id, error = %err, "enrollment calculation failed");
                self.jobs.update(
                    job_id,
                    JobUpdate::stage(JobStage::Error)
                        .progress(0)
                        .message("enrollment calculation failed")
                        .error(err.to_string()),
                );
            }
        }
    }

    /// Read the current snapshot and allocate seats over it.
    pub fn allocate(&self) -> Result<AllocationReport, EnrollmentJobError> {
        let programs = self.source.active_programs()?;
        let applications = self.source.open_applications()?;
        Ok(self.engine.compute(&programs, &applications))
    }

    /// Resolve a report filename published by a completed job to its path on disk.
    pub async fn report_file(&self, filename: &str) -> Result<PathBuf, ReportLookupError> {
        if !is_plain_filename(filename) {
            return Err(ReportLookupError::InvalidName);
        }
        let path = self.settings.report_dir.join(filename);
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(path),
            _ => Err(ReportLookupError::NotFound),
        }
    }

    async fn run(self: Arc<Self>, job_id: &JobId) -> Result<CompletedRun, EnrollmentJobError> {
        self.advance(job_id, 10, "starting enrollment calculation");
        self.advance(job_id, 30, "processing applicant data");

        let service = Arc::clone(&self);
        let report = tokio::task::spawn_blocking(move || service.allocate()).await??;
        let stats = &report.stats;
        info!(
            %job_id,
            persons = stats.persons,
            enrolled = stats.enrolled_persons,
            unplaced = stats.unplaced_persons,
            withdrawn = stats.withdrawn_applications,
            dangling = stats.dangling_applications,
            "allocation computed"
        );
        if stats.dangling_applications > 0 {
            debug!(
                %job_id,
                dangling = stats.dangling_applications,
                "applications naming inactive or unknown programs were dropped"
            );
        }
        if stats.swept_applications > 0 {
            warn!(
                %job_id,
                swept = stats.swept_applications,
                "unclassified applications were rejected by the safety sweep"
            );
        }

        self.advance(job_id, 60, "generating report");
        let filename = report_filename(job_id);
        let destination = self.settings.report_dir.join(&filename);
        let summary = summarize(&report.results);
        let service = Arc::clone(&self);
        let written = tokio::task::spawn_blocking(move || {
            service.renderer.render(&report.results, &destination)
        })
        .await??;
        let published = self.published_name(&written)?;

        Ok(CompletedRun {
            result_location: self.settings.public_location(&published),
            summary,
        })
    }

    /// Name under which a rendered artifact is published; it must sit directly in the report
    /// directory.
    fn published_name(&self, written: &Path) -> Result<String, EnrollmentJobError> {
        let name = written
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| is_plain_filename(name));
        match name {
            Some(name) if written.parent() == Some(self.settings.report_dir.as_path()) => {
                Ok(name.to_string())
            }
            _ => Err(EnrollmentJobError::MisplacedReport {
                path: written.to_path_buf(),
                report_dir: self.settings.report_dir.clone(),
            }),
        }
    }

    fn advance(&self, job_id: &JobId, progress: u8, message: &str) {
        self.jobs.update(
            job_id,
            JobUpdate::stage(JobStage::Processing)
                .progress(progress)
                .message(message),
        );
    }
}

fn report_filename(job_id: &JobId) -> String {
    format!(
        "enrollment_{}_{}.csv",
        Local::now().format("%Y%m%d_%H%M%S"),
        job_id.short()
    )
}

fn is_plain_filename(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Error raised while running an enrollment job.
#[derive(Debug, thiserror::Error)]
pub enum EnrollmentJobError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("enrollment run aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
    #[error(
        "report {} was written outside the report directory {}",
        path.display(),
        report_dir.display()
    )]
    MisplacedReport { path: PathBuf, report_dir: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReportLookupError {
    #[error("invalid report filename")]
    InvalidName,
    #[error("report not found")]
    NotFound,
}
