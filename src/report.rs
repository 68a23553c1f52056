use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::{IssueKind, MigrateError};

/// A recoverable failure recorded during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub subject: String,
    pub message: String,
}

/// Counters and failures accumulated across every pipeline stage.
#[derive(Debug, Default)]
pub struct RunTally {
    pub records: usize,
    pub projects: usize,
    pub samples: usize,
    pub spectra: usize,
    molecules: BTreeSet<String>,
    issues: Vec<Issue>,
}

impl RunTally {
    pub fn note_molecule(&mut self, chemical_name: &str) {
        if !self.molecules.contains(chemical_name) {
            self.molecules.insert(chemical_name.to_string());
        }
    }

    pub fn unique_molecules(&self) -> usize {
        self.molecules.len()
    }

    pub fn report(&mut self, subject: impl Into<String>, error: &MigrateError) {
        self.issues.push(Issue {
            kind: error.kind(),
            subject: subject.into(),
            message: error.to_string(),
        });
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn into_report(self) -> RunReport {
        RunReport {
            generated_at: chrono::Utc::now().to_rfc3339(),
            records: self.records,
            projects: self.projects,
            unique_molecules: self.molecules.len(),
            samples: self.samples,
            spectra: self.spectra,
            issues: self.issues,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: String,
    pub records: usize,
    pub projects: usize,
    pub unique_molecules: usize,
    pub samples: usize,
    pub spectra: usize,
    pub issues: Vec<Issue>,
}

impl RunReport {
    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |issue| issue.kind == kind)
    }
}
