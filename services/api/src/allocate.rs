use admissions::error::AppError;
use admissions::workflows::enrollment::{
    AllocationEngine, AllocationOptions, AllocationReport, CsvReportRenderer, CsvSnapshotSource,
    ReportRenderer, SnapshotSource, TieBreak,
};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct AllocateArgs {
    /// Programs CSV export (name,capacity[,active])
    #[arg(long)]
    pub(crate) programs: PathBuf,
    /// Applications CSV export (id,person_key,program,priority,score[,name,phone,status])
    #[arg(long)]
    pub(crate) applications: PathBuf,
    /// How equally scored applicants are ordered (input_order or person_key)
    #[arg(long, value_parser = crate::infra::parse_tie_break)]
    pub(crate) tie_break: Option<TieBreak>,
    /// Also write the CSV roster report to this path
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

pub(crate) fn run_allocate(args: AllocateArgs) -> Result<(), AppError> {
    let AllocateArgs {
        programs,
        applications,
        tie_break,
        output,
    } = args;

    let source = CsvSnapshotSource::new(programs, applications);
    let engine = AllocationEngine::new(AllocationOptions {
        tie_break: tie_break.unwrap_or_default(),
    });

    let report = engine.compute(&source.active_programs()?, &source.open_applications()?);
    print!("{}", render_roster(&report, engine.options().tie_break));

    if let Some(path) = output {
        let written = CsvReportRenderer.render(&report.results, &path)?;
        println!("\nReport written to {}", written.display());
    }

    Ok(())
}

pub(crate) fn render_roster(report: &AllocationReport, tie_break: TieBreak) -> String {
    let mut out = String::new();
    let stats = &report.stats;

    out.push_str(&format!("Enrollment allocation (tie-break: {tie_break})\n"));
    out.push_str(&format!(
        "- {} applicants | {} enrolled | {} unplaced\n",
        stats.persons, stats.enrolled_persons, stats.unplaced_persons
    ));
    out.push_str(&format!(
        "- {} backups withdrawn | {} applications rejected | {} dangling references dropped\n",
        stats.withdrawn_applications, stats.rejected_applications, stats.dangling_applications
    ));
    if stats.swept_applications > 0 {
        out.push_str(&format!(
            "- {} applications swept into rejected\n",
            stats.swept_applications
        ));
    }

    for result in report.results.values() {
        out.push_str(&format!(
            "\n{} ({}/{} seats filled)\n",
            result.program_name,
            result.enrolled.len(),
            result.capacity
        ));
        for (position, record) in result.enrolled.iter().enumerate() {
            out.push_str(&format!(
                "  {:>3}. {} {} (score {}, priority {})\n",
                position + 1,
                record.person_key,
                record.name.as_deref().unwrap_or("-"),
                record.effective_score(),
                record.priority
            ));
        }
        if !result.rejected.is_empty() {
            out.push_str(&format!("  rejected: {}\n", result.rejected.len()));
        }
    }

    out
}
