use std::fs;

use camino::Utf8PathBuf;
use tracing::{info, warn};

use crate::config::ResolvedConfig;
use crate::domain::{IdentifierDeriver, IssueClassifier};
use crate::error::MigrateError;
use crate::fetch::{Download, Fetcher};
use crate::finalize::HierarchyFinalizer;
use crate::fs_util::{ArchiveExtractor, write_bytes_atomic};
use crate::layout::{HierarchyBuilder, Layout};
use crate::nmredata::{RawRecord, parse_records};
use crate::normalize::TreeNormalizer;
use crate::report::{RunReport, RunTally};
use crate::retrieve::{SpectrumRetriever, spectrum_file_name};
use crate::unpack::ArchiveUnpacker;

const EXPORT_FILE_NAME: &str = "nmrshiftdb2.nmredata.sd";

/// Where the NMReData export comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Url(String),
    File(Utf8PathBuf),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Continue inside an output location a previous run already populated.
    pub resume: bool,
}

pub struct Migration<F: Fetcher, X: ArchiveExtractor> {
    layout: Layout,
    config: ResolvedConfig,
    fetcher: F,
    extractor: X,
}

impl<F: Fetcher, X: ArchiveExtractor> Migration<F, X> {
    pub fn new(layout: Layout, config: ResolvedConfig, fetcher: F, extractor: X) -> Self {
        Self {
            layout,
            config,
            fetcher,
            extractor,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Runs the whole migration. Only setup failures (output roots, export
    /// retrieval) are returned as errors; everything else lands in the report.
    /// Nothing is written before the export has been read, so a failed
    /// retrieval leaves the output location as it was.
    pub fn run(&self, source: &Source, options: RunOptions) -> Result<RunReport, MigrateError> {
        self.layout.check_roots(options.resume)?;
        let export = self.load_export(source)?;
        self.layout.create_roots(options.resume)?;
        if let Source::Url(url) = source {
            self.snapshot_export(&export, url)?;
        }
        let text = String::from_utf8_lossy(&export.bytes);
        let records = parse_records(&text);
        info!(records = records.len(), "parsed export");

        let mut tally = RunTally::default();
        self.materialize_all(records, &mut tally);
        info!(
            projects = tally.projects,
            samples = tally.samples,
            spectra = tally.spectra,
            "records materialized"
        );
        self.restructure(&mut tally);
        Ok(tally.into_report())
    }

    fn load_export(&self, source: &Source) -> Result<Download, MigrateError> {
        match source {
            Source::Url(url) => {
                info!(%url, "downloading export");
                self.fetcher
                    .fetch(url)
                    .map_err(|err| MigrateError::SourceUnreachable(format!("{url}: {err}")))
            }
            Source::File(path) => fs::read(path.as_std_path())
                .map(|bytes| Download {
                    file_name: None,
                    bytes,
                })
                .map_err(|err| MigrateError::SourceUnreachable(format!("{path}: {err}"))),
        }
    }

    fn snapshot_export(&self, download: &Download, url: &str) -> Result<(), MigrateError> {
        let name = match spectrum_file_name(download, url) {
            name if name.ends_with(".sd") => name,
            _ => EXPORT_FILE_NAME.to_string(),
        };
        write_bytes_atomic(self.layout.root().join(name).as_std_path(), &download.bytes)
    }

    /// Derives, classifies, stores and downloads each record in turn.
    pub fn materialize_all(
        &self,
        records: impl IntoIterator<Item = RawRecord>,
        tally: &mut RunTally,
    ) {
        let deriver = IdentifierDeriver::new(&self.config);
        let classifier = IssueClassifier::new(self.config.review_authors.clone());
        let builder = HierarchyBuilder::new(&self.layout, &self.config.record_extension);
        let mut retriever = SpectrumRetriever::new(&self.fetcher);

        for (index, raw) in records.into_iter().enumerate() {
            tally.records += 1;
            let subject = record_subject(index, &raw);
            let record = match deriver.derive(raw) {
                Ok(record) => record,
                Err(err) => {
                    warn!(record = %subject, error = %err, "record skipped");
                    tally.report(subject, &err);
                    continue;
                }
            };
            let needs_review = classifier.needs_review(&record.authors);
            let sample_dir = match builder.materialize(&record, needs_review, tally) {
                Ok(dir) => dir,
                Err(err) => {
                    warn!(record = %subject, error = %err, "record not stored");
                    tally.report(subject, &err);
                    continue;
                }
            };
            retriever.retrieve(&record, sample_dir.as_std_path(), tally);
        }
    }

    /// Unpacks archives, normalizes instrument trees and flattens the result.
    pub fn restructure(&self, tally: &mut RunTally) {
        info!("unpacking spectra archives");
        ArchiveUnpacker::new(
            &self.extractor,
            &self.config.archive_pattern,
            self.config.max_unpack_sweeps,
        )
        .unpack(&self.layout, tally);

        info!("normalizing instrument trees");
        let trees = TreeNormalizer::new(
            &self.config.dataset_exclusions,
            self.config.max_descent_depth,
        )
        .normalize(&self.layout, tally);

        HierarchyFinalizer.finalize(&self.layout, &trees, tally);
    }
}

fn record_subject(index: usize, raw: &RawRecord) -> String {
    let title = raw
        .text()
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();
    format!("record #{} ({title})", index + 1)
}
