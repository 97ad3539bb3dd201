//! Score-ordered, priority-respecting seat allocation.
//!
//! Persons are processed once, in descending order of their best merit score. Each person takes
//! a seat in the most preferred program that still has capacity and withdraws every other
//! application; a person who finds no free seat is rejected from every program they applied to.
//! Seats are never taken back, so an earlier (higher scoring) person is never displaced.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::domain::{ApplicationRecord, EnrollmentResult, EnrollmentResults, PersonKey, Program};

/// Rule ordering persons whose representative scores are equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Keep the order in which persons first appear in the application snapshot.
    #[default]
    InputOrder,
    /// Order by person key, independent of how the snapshot was read.
    PersonKey,
}

impl TieBreak {
    pub const fn label(self) -> &'static str {
        match self {
            TieBreak::InputOrder => "input_order",
            TieBreak::PersonKey => "person_key",
        }
    }
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TieBreak {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "input_order" | "input" => Ok(TieBreak::InputOrder),
            "person_key" => Ok(TieBreak::PersonKey),
            other => Err(format!(
                "unknown tie-break rule '{other}' (expected input_order or person_key)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationOptions {
    pub tie_break: TieBreak,
}

/// Counters describing a single allocation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllocationStats {
    pub persons: usize,
    pub enrolled_persons: usize,
    pub unplaced_persons: usize,
    pub withdrawn_applications: usize,
    pub rejected_applications: usize,
    /// Applications naming a program outside the active set. Dropped from every roster.
    pub dangling_applications: usize,
    /// Applications left unclassified by the main pass. Always zero unless bookkeeping broke.
    pub swept_applications: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationReport {
    pub results: EnrollmentResults,
    pub stats: AllocationStats,
}

/// Pure allocation over an immutable program/application snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocationEngine {
    options: AllocationOptions,
}

/// Allocate with default options, returning only the per-program rosters.
pub fn compute(programs: &[Program], applications: &[ApplicationRecord]) -> EnrollmentResults {
    AllocationEngine::default()
        .compute(programs, applications)
        .results
}

struct Candidate<'a> {
    person: &'a PersonKey,
    first_seen: usize,
    representative_score: u32,
    /// Surviving applications, most preferred first.
    applications: Vec<&'a ApplicationRecord>,
}

enum PersonOutcome {
    /// Index into the candidate's priority-ordered applications.
    Enrolled { choice: usize },
    Unplaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Enrolled,
    Rejected,
    Withdrawn,
}

impl AllocationEngine {
    pub fn new(options: AllocationOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> AllocationOptions {
        self.options
    }

    pub fn compute(
        &self,
        programs: &[Program],
        applications: &[ApplicationRecord],
    ) -> AllocationReport {
        let capacity: HashMap<&str, u32> = programs
            .iter()
            .map(|program| (program.name.as_str(), program.capacity))
            .collect();
        let (candidates, dangling) = self.processing_order(&capacity, applications);

        let mut remaining = capacity.clone();
        let outcomes: Vec<PersonOutcome> = candidates
            .iter()
            .map(|candidate| settle(candidate, &mut remaining))
            .collect();

        let mut stats = AllocationStats {
            persons: candidates.len(),
            dangling_applications: dangling,
            ..AllocationStats::default()
        };

        let mut ledger: Vec<Vec<Option<Disposition>>> = candidates
            .iter()
            .map(|candidate| vec![None; candidate.applications.len()])
            .collect();

        for (outcome, marks) in outcomes.iter().zip(ledger.iter_mut()) {
            match outcome {
                PersonOutcome::Enrolled { choice } => {
                    stats.enrolled_persons += 1;
                    for (index, mark) in marks.iter_mut().enumerate() {
                        *mark = Some(if index == *choice {
                            Disposition::Enrolled
                        } else {
                            Disposition::Withdrawn
                        });
                    }
                }
                PersonOutcome::Unplaced => {
                    stats.unplaced_persons += 1;
                    marks.fill(Some(Disposition::Rejected));
                }
            }
        }

        for mark in ledger.iter_mut().flatten().filter(|mark| mark.is_none()) {
            *mark = Some(Disposition::Rejected);
            stats.swept_applications += 1;
        }

        let mut results: EnrollmentResults = programs
            .iter()
            .map(|program| {
                (
                    program.name.clone(),
                    EnrollmentResult::new(program.name.clone(), program.capacity),
                )
            })
            .collect();

        for (candidate, marks) in candidates.iter().zip(&ledger) {
            for (application, mark) in candidate.applications.iter().zip(marks) {
                let Some(result) = results.get_mut(application.program.as_str()) else {
                    continue;
                };
                match mark {
                    Some(Disposition::Enrolled) => result.enrolled.push((*application).clone()),
                    Some(Disposition::Rejected) => {
                        stats.rejected_applications += 1;
                        result.rejected.push((*application).clone());
                    }
                    Some(Disposition::Withdrawn) => stats.withdrawn_applications += 1,
                    None => {}
                }
            }
        }

        AllocationReport { results, stats }
    }

    /// Groups applications per person, drops dangling program references, and orders persons
    /// by descending representative score. Returns the ordered candidates and the number of
    /// dangling applications.
    fn processing_order<'a>(
        &self,
        capacity: &HashMap<&str, u32>,
        applications: &'a [ApplicationRecord],
    ) -> (Vec<Candidate<'a>>, usize) {
        let mut slots: HashMap<&'a PersonKey, usize> = HashMap::new();
        let mut candidates: Vec<Candidate<'a>> = Vec::new();
        let mut dangling = 0;

        for application in applications {
            let slot = *slots.entry(&application.person_key).or_insert_with(|| {
                let first_seen = candidates.len();
                candidates.push(Candidate {
                    person: &application.person_key,
                    first_seen,
                    representative_score: 0,
                    applications: Vec::new(),
                });
                first_seen
            });

            if capacity.contains_key(application.program.as_str()) {
                candidates[slot].applications.push(application);
            } else {
                dangling += 1;
            }
        }

        candidates.retain(|candidate| !candidate.applications.is_empty());
        for candidate in &mut candidates {
            candidate
                .applications
                .sort_by_key(|application| application.priority);
            candidate.representative_score = candidate
                .applications
                .iter()
                .map(|application| application.effective_score())
                .max()
                .unwrap_or(0);
        }

        let tie_break = self.options.tie_break;
        candidates.sort_by(|left, right| {
            right
                .representative_score
                .cmp(&left.representative_score)
                .then_with(|| tie_break_order(tie_break, left, right))
        });

        (candidates, dangling)
    }
}

fn tie_break_order(rule: TieBreak, left: &Candidate<'_>, right: &Candidate<'_>) -> Ordering {
    match rule {
        TieBreak::InputOrder => left.first_seen.cmp(&right.first_seen),
        TieBreak::PersonKey => left
            .person
            .cmp(right.person)
            .then_with(|| left.first_seen.cmp(&right.first_seen)),
    }
}

fn settle(candidate: &Candidate<'_>, remaining: &mut HashMap<&str, u32>) -> PersonOutcome {
    for (index, application) in candidate.applications.iter().enumerate() {
        if let Some(seats) = remaining.get_mut(application.program.as_str()) {
            if *seats > 0 {
                *seats -= 1;
                return PersonOutcome::Enrolled { choice: index };
            }
        }
    }
    PersonOutcome::Unplaced
}
