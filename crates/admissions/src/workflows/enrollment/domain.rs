use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier wrapper for a single (person, program) submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Stable identifier of the person behind one or more applications (national ID equivalent).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PersonKey(pub String);

impl fmt::Display for PersonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An active study program and its seat count for one allocation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    pub capacity: u32,
}

impl Program {
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            name: name.into(),
            capacity,
        }
    }
}

/// One submitted application, as read from the persistence snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub person_key: PersonKey,
    pub program: String,
    /// 1 is the most preferred choice.
    pub priority: u32,
    pub score: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ApplicationRecord {
    /// Merit score used for ranking; a missing score ranks as zero.
    pub fn effective_score(&self) -> u32 {
        self.score.unwrap_or(0)
    }
}

/// Admitted and rejected roster for a single program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentResult {
    pub program_name: String,
    pub capacity: u32,
    /// Ordered by processing order, i.e. descending merit.
    pub enrolled: Vec<ApplicationRecord>,
    pub rejected: Vec<ApplicationRecord>,
}

impl EnrollmentResult {
    pub fn new(program_name: impl Into<String>, capacity: u32) -> Self {
        Self {
            program_name: program_name.into(),
            capacity,
            enrolled: Vec::new(),
            rejected: Vec::new(),
        }
    }

    pub fn seats_left(&self) -> u32 {
        let taken = u32::try_from(self.enrolled.len()).unwrap_or(u32::MAX);
        self.capacity.saturating_sub(taken)
    }

    pub fn summary(&self) -> ProgramSummary {
        ProgramSummary {
            program: self.program_name.clone(),
            capacity: self.capacity,
            enrolled: self.enrolled.len(),
            rejected: self.rejected.len(),
        }
    }
}

/// Results keyed by program name. Ordered so reports and serialized output are reproducible.
pub type EnrollmentResults = BTreeMap<String, EnrollmentResult>;

/// Per-program counts attached to a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramSummary {
    pub program: String,
    pub capacity: u32,
    pub enrolled: usize,
    pub rejected: usize,
}

pub fn summarize(results: &EnrollmentResults) -> Vec<ProgramSummary> {
    results.values().map(EnrollmentResult::summary).collect()
}
