//! Descends extracted dataset folders to the Bruker instrument tree and renames
//! it after the experiment number recorded in its `acqu` parameter file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::MigrateError;
use crate::fs_util::{move_path, read_text_lossy, subdirectories};
use crate::layout::Layout;
use crate::report::RunTally;

pub const ACQU: &str = "acqu";
const DATA_MARKERS: [&str; 2] = ["fid", "ser"];
const META_INF: &str = "META-INF";
const PARAMETER_COMMENT: &str = "$$";

/// An instrument tree after renaming, with the folders it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTree {
    pub sample_dir: PathBuf,
    pub dataset_dir: PathBuf,
    pub instrument_dir: PathBuf,
}

pub struct TreeNormalizer<'a> {
    exclusions: &'a BTreeSet<String>,
    max_depth: usize,
}

impl<'a> TreeNormalizer<'a> {
    pub fn new(exclusions: &'a BTreeSet<String>, max_depth: usize) -> Self {
        Self {
            exclusions,
            max_depth,
        }
    }

    pub fn normalize(&self, layout: &Layout, tally: &mut RunTally) -> Vec<NormalizedTree> {
        let samples = match layout.sample_dirs() {
            Ok(samples) => samples,
            Err(err) => {
                tally.report(layout.root().to_string(), &err);
                return Vec::new();
            }
        };

        let mut trees = Vec::new();
        for sample in samples {
            let datasets = match subdirectories(&sample) {
                Ok(datasets) => datasets,
                Err(err) => {
                    tally.report(sample.display().to_string(), &err);
                    continue;
                }
            };
            for dataset in datasets {
                let excluded = dataset
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| self.exclusions.contains(name));
                if excluded {
                    debug!(dataset = %dataset.display(), "excluded from normalization");
                    continue;
                }
                match self.normalize_dataset(&sample, &dataset) {
                    Ok(tree) => trees.push(tree),
                    Err(err) => {
                        warn!(dataset = %dataset.display(), error = %err, "dataset left as is");
                        tally.report(dataset.display().to_string(), &err);
                    }
                }
            }
        }
        trees
    }

    /// Renames the instrument tree inside `dataset` to its experiment number.
    /// Nothing is renamed unless the whole descent succeeds.
    pub fn normalize_dataset(
        &self,
        sample: &Path,
        dataset: &Path,
    ) -> Result<NormalizedTree, MigrateError> {
        let root = self.find_instrument_root(dataset)?;
        let number = sample_number(&root.join(ACQU))?;
        let parent = root
            .parent()
            .ok_or_else(|| MigrateError::TreeMalformed(root.display().to_string()))?;
        let target = parent.join(&number);

        if target != root {
            if target.exists() {
                return Err(MigrateError::NameCollision(target.display().to_string()));
            }
            move_path(&root, &target)?;
        }

        let dataset_dir = if root == dataset {
            target.clone()
        } else {
            dataset.to_path_buf()
        };
        Ok(NormalizedTree {
            sample_dir: sample.to_path_buf(),
            dataset_dir,
            instrument_dir: target,
        })
    }

    pub fn find_instrument_root(&self, dataset: &Path) -> Result<PathBuf, MigrateError> {
        let mut current = dataset.to_path_buf();
        for _ in 0..=self.max_depth {
            if is_instrument_root(&current) {
                return Ok(current);
            }
            let mut candidates: Vec<PathBuf> = subdirectories(&current)?
                .into_iter()
                .filter(|dir| dir.file_name().is_some_and(|name| name != META_INF))
                .collect();
            current = match candidates.len() {
                0 => {
                    return Err(MigrateError::TreeMalformed(format!(
                        "no {ACQU}, fid or ser below {}",
                        dataset.display()
                    )));
                }
                1 => candidates.remove(0),
                _ => {
                    return Err(MigrateError::TreeMalformed(format!(
                        "{} wraps several directories",
                        current.display()
                    )));
                }
            };
        }
        Err(MigrateError::TreeMalformed(format!(
            "{} nests deeper than {} levels",
            dataset.display(),
            self.max_depth
        )))
    }
}

pub fn is_instrument_root(dir: &Path) -> bool {
    std::iter::once(ACQU)
        .chain(DATA_MARKERS)
        .any(|marker| dir.join(marker).is_file())
}

/// Experiment number taken from the path the spectrometer recorded for the
/// `acqu` file, e.g. `$$ /opt/data/nmr/10002/3/acqu` gives `3`.
pub fn sample_number(acqu: &Path) -> Result<String, MigrateError> {
    if !acqu.is_file() {
        return Err(MigrateError::TreeMalformed(format!(
            "missing {}",
            acqu.display()
        )));
    }
    let text = read_text_lossy(acqu)?;
    text.lines()
        .filter(|line| line.contains(ACQU))
        .find_map(number_from_line)
        .ok_or_else(|| {
            MigrateError::TreeMalformed(format!("no original path in {}", acqu.display()))
        })
}

// Directory names may contain spaces, so only path separators split segments.
fn number_from_line(line: &str) -> Option<String> {
    let line = line.trim();
    let line = line.strip_prefix(PARAMETER_COMMENT).unwrap_or(line).trim_start();
    let head = line.strip_suffix(ACQU)?;
    let head = head.strip_suffix(['/', '\\'])?;
    let segment = head.rsplit(['/', '\\']).next()?.trim();
    if segment.is_empty() || segment == "." || segment == ".." {
        return None;
    }
    Some(segment.to_string())
}
