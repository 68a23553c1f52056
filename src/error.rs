use std::path::PathBuf;

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MigrateError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("server returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("source export unreachable: {0}")]
    SourceUnreachable(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("corrupt archive {0}")]
    ArchiveCorrupt(String),

    #[error("unsupported archive {0}")]
    ArchiveUnsupported(String),

    #[error("malformed instrument tree: {0}")]
    TreeMalformed(String),

    #[error("name collision: {0} already exists")]
    NameCollision(String),

    #[error("output directory already exists: {0} (pass --resume to continue a previous run)")]
    #[diagnostic(help("remove the output directory or rerun with --resume"))]
    OutputExists(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid archive pattern: {0}")]
    InvalidPattern(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

/// Category of a recoverable failure as it appears in the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Network,
    MalformedRecord,
    ArchiveCorrupt,
    ArchiveUnsupported,
    TreeMalformed,
    NameCollision,
    Filesystem,
}

impl MigrateError {
    pub fn kind(&self) -> IssueKind {
        match self {
            MigrateError::Network(_)
            | MigrateError::HttpStatus { .. }
            | MigrateError::SourceUnreachable(_) => IssueKind::Network,
            MigrateError::MalformedRecord(_) => IssueKind::MalformedRecord,
            MigrateError::ArchiveCorrupt(_) => IssueKind::ArchiveCorrupt,
            MigrateError::ArchiveUnsupported(_) => IssueKind::ArchiveUnsupported,
            MigrateError::TreeMalformed(_) => IssueKind::TreeMalformed,
            MigrateError::NameCollision(_) => IssueKind::NameCollision,
            MigrateError::OutputExists(_)
            | MigrateError::ConfigRead(_)
            | MigrateError::ConfigParse(_)
            | MigrateError::InvalidPattern(_)
            | MigrateError::Filesystem(_) => IssueKind::Filesystem,
        }
    }
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            IssueKind::Network => "network",
            IssueKind::MalformedRecord => "malformed-record",
            IssueKind::ArchiveCorrupt => "archive-corrupt",
            IssueKind::ArchiveUnsupported => "archive-unsupported",
            IssueKind::TreeMalformed => "tree-malformed",
            IssueKind::NameCollision => "name-collision",
            IssueKind::Filesystem => "filesystem",
        };
        write!(f, "{label}")
    }
}
