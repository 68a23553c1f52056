use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::MigrateError;
use crate::fs_util::{fs_error, is_empty_dir, move_path};
use crate::layout::Layout;
use crate::normalize::NormalizedTree;
use crate::report::RunTally;

/// Lifts normalized instrument trees directly under their sample folder and
/// removes the wrapper directories left behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchyFinalizer;

impl HierarchyFinalizer {
    pub fn finalize(&self, layout: &Layout, trees: &[NormalizedTree], tally: &mut RunTally) {
        for tree in trees {
            if let Err(err) = self.flatten(tree) {
                warn!(tree = %tree.instrument_dir.display(), error = %err, "tree not flattened");
                tally.report(tree.instrument_dir.display().to_string(), &err);
            }
        }
        for root in layout.group_roots() {
            if let Err(err) = prune_empty_dirs(root.as_std_path()) {
                tally.report(root.to_string(), &err);
            }
        }
    }

    /// Returns the new location, or `None` when the tree already sits under its sample.
    pub fn flatten(&self, tree: &NormalizedTree) -> Result<Option<PathBuf>, MigrateError> {
        if tree.instrument_dir.parent() == Some(tree.sample_dir.as_path()) {
            return Ok(None);
        }
        let name = tree.instrument_dir.file_name().ok_or_else(|| {
            MigrateError::TreeMalformed(tree.instrument_dir.display().to_string())
        })?;
        let target = tree.sample_dir.join(name);
        if target.exists() {
            return Err(MigrateError::NameCollision(target.display().to_string()));
        }
        move_path(&tree.instrument_dir, &target)?;
        Ok(Some(target))
    }
}

/// Removes, bottom-up, every directory below `root` holding neither files nor
/// non-empty subdirectories. `root` itself is kept.
pub fn prune_empty_dirs(root: &Path) -> Result<usize, MigrateError> {
    if !root.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = entry.map_err(|err| MigrateError::Filesystem(err.to_string()))?;
        if !entry.file_type().is_dir() || !is_empty_dir(entry.path())? {
            continue;
        }
        fs::remove_dir(entry.path()).map_err(fs_error)?;
        debug!(dir = %entry.path().display(), "removed empty directory");
        removed += 1;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prunes_nested_empties_only() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("a/b/c/d")).unwrap();
        fs::create_dir_all(root.join("keep/empty")).unwrap();
        fs::write(root.join("keep/file"), b"x").unwrap();

        let removed = prune_empty_dirs(root).unwrap();
        assert_eq!(removed, 5);
        assert!(!root.join("a").exists());
        assert!(root.join("keep/file").is_file());
        assert!(!root.join("keep/empty").exists());
        assert!(root.is_dir());
    }
}
