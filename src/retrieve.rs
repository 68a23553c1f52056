use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::domain::Record;
use crate::error::MigrateError;
use crate::fetch::{Download, Fetcher};
use crate::fs_util::write_bytes_atomic;
use crate::report::RunTally;

const FALLBACK_FILE_NAME: &str = "spectrum";
const ZIP_EXTENSION: &str = ".zip";
const ZIP_MAGIC: [&[u8]; 2] = [b"PK\x03\x04", b"PK\x05\x06"];

/// Downloads every spectrum link of a record into its sample folder.
///
/// Paths written during this run are remembered, so two links whose downloads
/// share a name end up side by side (`rawdata.zip`, `rawdata.1.zip`) instead
/// of the second replacing the first.
pub struct SpectrumRetriever<'a, F: Fetcher> {
    fetcher: &'a F,
    written: BTreeSet<PathBuf>,
}

impl<'a, F: Fetcher> SpectrumRetriever<'a, F> {
    pub fn new(fetcher: &'a F) -> Self {
        Self {
            fetcher,
            written: BTreeSet::new(),
        }
    }

    /// Every link counts as a spectrum, whether or not its download succeeds.
    pub fn retrieve(&mut self, record: &Record, sample_dir: &Path, tally: &mut RunTally) {
        for link in &record.spectrum_links {
            tally.spectra += 1;
            match self.fetch_into(link, sample_dir) {
                Ok(path) => debug!(path = %path.display(), "downloaded spectrum"),
                Err(err) => {
                    warn!(
                        url = %link,
                        authors = %record.authors,
                        sample = %record.sample_name,
                        error = %err,
                        "spectrum download failed"
                    );
                    tally.report(
                        format!("{link} ({} / {})", record.authors, record.sample_name),
                        &err,
                    );
                }
            }
        }
    }

    fn fetch_into(&mut self, url: &str, sample_dir: &Path) -> Result<PathBuf, MigrateError> {
        let download = self.fetcher.fetch(url)?;
        let path = self.unclaimed_path(sample_dir, &spectrum_file_name(&download, url));
        write_bytes_atomic(&path, &download.bytes)?;
        self.written.insert(path.clone());
        Ok(path)
    }

    // Files left by an earlier (resumed) run may be overwritten; this run's may not.
    fn unclaimed_path(&self, sample_dir: &Path, name: &str) -> PathBuf {
        let path = sample_dir.join(name);
        if !self.written.contains(&path) {
            return path;
        }
        (1..)
            .map(|n| sample_dir.join(numbered_name(name, n)))
            .find(|candidate| !self.written.contains(candidate))
            .unwrap_or(path)
    }
}

/// `rawdata.zip` becomes `rawdata.<n>.zip`; names without an extension get
/// `.<n>` appended.
pub fn numbered_name(name: &str, n: usize) -> String {
    match name.rfind('.') {
        Some(idx) if idx > 0 => format!("{}.{n}{}", &name[..idx], &name[idx..]),
        _ => format!("{name}.{n}"),
    }
}

fn looks_like_zip(bytes: &[u8]) -> bool {
    ZIP_MAGIC.iter().any(|magic| bytes.starts_with(magic))
}

/// Name a download is stored under: the server's suggestion, else the last URL
/// path segment, reduced to a single safe path segment. Zip bodies always get a
/// `.zip` extension so the unpacker picks them up.
pub fn spectrum_file_name(download: &Download, url: &str) -> String {
    let candidate = download
        .file_name
        .clone()
        .or_else(|| {
            reqwest::Url::parse(url).ok().and_then(|parsed| {
                parsed
                    .path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .map(str::to_string)
            })
        })
        .unwrap_or_default();
    let sanitized: String = candidate
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '\0' => '_',
            other => other,
        })
        .collect();
    let sanitized = sanitized.trim_start_matches('.').trim();
    let mut name = if sanitized.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        sanitized.to_string()
    };
    if looks_like_zip(&download.bytes) && !name.to_ascii_lowercase().ends_with(ZIP_EXTENSION) {
        name.push_str(ZIP_EXTENSION);
    }
    name
}
