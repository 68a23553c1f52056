use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::MigrateError;
use crate::fs_util::{ArchiveExtractor, ensure_dir, fs_error, list_children, move_path};
use crate::layout::Layout;
use crate::report::RunTally;

/// Moves each downloaded archive into its own dataset folder and extracts it,
/// then sweeps the tree for archives that came out of other archives.
pub struct ArchiveUnpacker<'a, X: ArchiveExtractor> {
    extractor: &'a X,
    pattern: &'a Regex,
    max_sweeps: usize,
}

impl<'a, X: ArchiveExtractor> ArchiveUnpacker<'a, X> {
    pub fn new(extractor: &'a X, pattern: &'a Regex, max_sweeps: usize) -> Self {
        Self {
            extractor,
            pattern,
            max_sweeps,
        }
    }

    pub fn unpack(&self, layout: &Layout, tally: &mut RunTally) {
        let mut failed = BTreeMap::new();

        match layout.sample_dirs() {
            Ok(samples) => {
                for sample in samples {
                    if let Err(err) = self.unpack_sample(&sample, &mut failed) {
                        tally.report(sample.display().to_string(), &err);
                    }
                }
            }
            Err(err) => tally.report(layout.root().to_string(), &err),
        }

        let mut sweeps = 0;
        loop {
            let pending = self.pending_archives(layout, &failed, tally);
            if pending.is_empty() {
                break;
            }
            if sweeps == self.max_sweeps {
                for archive in pending {
                    failed.insert(
                        archive.clone(),
                        MigrateError::ArchiveCorrupt(format!(
                            "{}: still packed after {sweeps} sweeps",
                            archive.display()
                        )),
                    );
                }
                break;
            }
            sweeps += 1;
            debug!(sweep = sweeps, archives = pending.len(), "sweeping nested archives");
            for archive in pending {
                let Some(dir) = archive.parent().map(Path::to_path_buf) else {
                    continue;
                };
                self.extract_and_remove(&archive, &dir, &mut failed);
            }
        }

        if !failed.is_empty() {
            info!(count = failed.len(), "archives left for manual unpacking");
        }
        for (archive, err) in failed {
            warn!(archive = %archive.display(), error = %err, "archive could not be unpacked");
            tally.report(archive.display().to_string(), &err);
        }
    }

    fn unpack_sample(
        &self,
        sample: &Path,
        failed: &mut BTreeMap<PathBuf, MigrateError>,
    ) -> Result<(), MigrateError> {
        for path in list_children(sample)? {
            if !path.is_file() {
                continue;
            }
            let Some(stem) = self.archive_stem(&path) else {
                continue;
            };
            let Some(file_name) = path.file_name() else {
                continue;
            };
            let dataset = sample.join(stem);
            let moved = dataset.join(file_name);
            // A failure here only concerns this archive; the rest of the sample goes on.
            match ensure_dir(&dataset).and_then(|_| move_path(&path, &moved)) {
                Ok(()) => self.extract_and_remove(&moved, &dataset, failed),
                Err(err) => {
                    failed.insert(path, err);
                }
            }
        }
        Ok(())
    }

    /// Dataset folder name for an archive: its file name minus the matched suffix.
    fn archive_stem(&self, path: &Path) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        let found = self.pattern.find(name)?;
        let stem = name[..found.start()].trim_end_matches('.');
        if stem.is_empty() {
            Some(format!("{name}.d"))
        } else {
            Some(stem.to_string())
        }
    }

    fn extract_and_remove(
        &self,
        archive: &Path,
        target_dir: &Path,
        failed: &mut BTreeMap<PathBuf, MigrateError>,
    ) {
        let result = self
            .extractor
            .extract(archive, target_dir)
            .and_then(|()| fs::remove_file(archive).map_err(fs_error));
        match result {
            Ok(()) => debug!(archive = %archive.display(), "unpacked"),
            Err(err) => {
                failed.insert(archive.to_path_buf(), err);
            }
        }
    }

    fn pending_archives(
        &self,
        layout: &Layout,
        failed: &BTreeMap<PathBuf, MigrateError>,
        tally: &mut RunTally,
    ) -> Vec<PathBuf> {
        let mut pending = Vec::new();
        for root in layout.group_roots() {
            if !root.as_std_path().is_dir() {
                continue;
            }
            for entry in WalkDir::new(root.as_std_path()).sort_by_file_name() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        tally.report(root.to_string(), &MigrateError::Filesystem(err.to_string()));
                        continue;
                    }
                };
                if !entry.file_type().is_file() || failed.contains_key(entry.path()) {
                    continue;
                }
                let matches = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| self.pattern.is_match(name));
                if matches {
                    pending.push(entry.into_path());
                }
            }
        }
        pending
    }
}
