use std::path::PathBuf;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};

use crate::domain::Record;
use crate::error::MigrateError;
use crate::fs_util::{ensure_dir, subdirectories, write_bytes_atomic};
use crate::report::RunTally;

pub const WITH_ISSUES: &str = "with_issues";
pub const WITHOUT_ISSUES: &str = "without_issues";

/// Paths of the output hierarchy:
/// `<root>/{with_issues,without_issues}/<authors>/<sample_name>/`.
#[derive(Debug, Clone)]
pub struct Layout {
    root: Utf8PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn group_root(&self, needs_review: bool) -> Utf8PathBuf {
        if needs_review {
            self.root.join(WITH_ISSUES)
        } else {
            self.root.join(WITHOUT_ISSUES)
        }
    }

    pub fn group_roots(&self) -> [Utf8PathBuf; 2] {
        [self.group_root(true), self.group_root(false)]
    }

    pub fn author_dir(&self, needs_review: bool, authors: &str) -> Utf8PathBuf {
        self.group_root(needs_review).join(authors)
    }

    pub fn sample_dir(&self, needs_review: bool, authors: &str, sample_name: &str) -> Utf8PathBuf {
        self.author_dir(needs_review, authors).join(sample_name)
    }

    /// Fails when either group root is already present, unless resuming.
    /// Touches nothing on disk.
    pub fn check_roots(&self, resume: bool) -> Result<(), MigrateError> {
        if resume {
            return Ok(());
        }
        match self.group_roots().iter().find(|root| root.as_std_path().exists()) {
            Some(existing) => Err(MigrateError::OutputExists(existing.as_std_path().to_path_buf())),
            None => Ok(()),
        }
    }

    /// Creates both group roots. Finding either one already present means the
    /// location holds a previous run, which is only accepted when resuming.
    pub fn create_roots(&self, resume: bool) -> Result<(), MigrateError> {
        self.check_roots(resume)?;
        for root in &self.group_roots() {
            ensure_dir(root.as_std_path())?;
        }
        Ok(())
    }

    /// Every sample folder currently on disk, in path order.
    pub fn sample_dirs(&self) -> Result<Vec<PathBuf>, MigrateError> {
        let mut samples = Vec::new();
        for root in self.group_roots() {
            if !root.as_std_path().is_dir() {
                continue;
            }
            for author in subdirectories(root.as_std_path())? {
                samples.extend(subdirectories(&author)?);
            }
        }
        Ok(samples)
    }
}

/// Creates author-group and sample folders and writes the canonical record file.
pub struct HierarchyBuilder<'a> {
    layout: &'a Layout,
    record_extension: &'a str,
}

impl<'a> HierarchyBuilder<'a> {
    pub fn new(layout: &'a Layout, record_extension: &'a str) -> Self {
        Self {
            layout,
            record_extension,
        }
    }

    pub fn materialize(
        &self,
        record: &Record,
        needs_review: bool,
        tally: &mut RunTally,
    ) -> Result<Utf8PathBuf, MigrateError> {
        let author_dir = self.layout.author_dir(needs_review, &record.authors);
        if ensure_dir(author_dir.as_std_path())? {
            info!(authors = %record.authors, review = needs_review, "new project");
            tally.projects += 1;
        }

        let sample_dir = author_dir.join(&record.sample_name);
        if ensure_dir(sample_dir.as_std_path())? {
            tally.samples += 1;
        } else {
            debug!(sample = %record.sample_name, "sample already present");
        }
        tally.note_molecule(&record.chemical_name);

        let record_path = sample_dir.join(record.record_file_name(self.record_extension));
        write_bytes_atomic(record_path.as_std_path(), record.raw.to_sd().as_bytes())?;
        Ok(sample_dir)
    }
}
