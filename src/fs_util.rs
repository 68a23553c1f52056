use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::MigrateError;

/// Unpacks an archive into a directory.
pub trait ArchiveExtractor {
    fn extract(&self, archive: &Path, target_dir: &Path) -> Result<(), MigrateError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, archive: &Path, target_dir: &Path) -> Result<(), MigrateError> {
        extract_zip(archive, target_dir)
    }
}

pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<(), MigrateError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| MigrateError::Filesystem(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive = ZipArchive::new(file).map_err(|err| zip_error(zip_path, err))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| zip_error(zip_path, err))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(MigrateError::ArchiveCorrupt(format!(
                    "{}: entry path traversal detected",
                    zip_path.display()
                )));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path).map_err(fs_error)?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(fs_error)?;
        }
        let mut outfile = fs::File::create(&entry_path).map_err(fs_error)?;
        io::copy(&mut entry, &mut outfile).map_err(|err| {
            MigrateError::ArchiveCorrupt(format!("{}: {err}", zip_path.display()))
        })?;
    }
    Ok(())
}

fn zip_error(zip_path: &Path, err: ZipError) -> MigrateError {
    match err {
        ZipError::UnsupportedArchive(reason) => {
            MigrateError::ArchiveUnsupported(format!("{}: {reason}", zip_path.display()))
        }
        other => MigrateError::ArchiveCorrupt(format!("{}: {other}", zip_path.display())),
    }
}

pub fn fs_error(err: io::Error) -> MigrateError {
    MigrateError::Filesystem(err.to_string())
}

/// Creates `path` unless it is already a directory. Returns whether it was created.
pub fn ensure_dir(path: &Path) -> Result<bool, MigrateError> {
    if path.is_dir() {
        return Ok(false);
    }
    fs::create_dir_all(path)
        .map_err(|err| MigrateError::Filesystem(format!("create {}: {err}", path.display())))?;
    Ok(true)
}

/// Immediate children of a directory, sorted by name.
pub fn list_children(dir: &Path) -> Result<Vec<PathBuf>, MigrateError> {
    let entries = fs::read_dir(dir)
        .map_err(|err| MigrateError::Filesystem(format!("list {}: {err}", dir.display())))?;
    let mut children = Vec::new();
    for entry in entries {
        let entry = entry.map_err(fs_error)?;
        children.push(entry.path());
    }
    children.sort();
    Ok(children)
}

pub fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>, MigrateError> {
    Ok(list_children(dir)?
        .into_iter()
        .filter(|path| path.is_dir())
        .collect())
}

pub fn move_path(from: &Path, to: &Path) -> Result<(), MigrateError> {
    fs::rename(from, to).map_err(|err| {
        MigrateError::Filesystem(format!(
            "move {} -> {}: {err}",
            from.display(),
            to.display()
        ))
    })
}

pub fn is_empty_dir(dir: &Path) -> Result<bool, MigrateError> {
    let mut entries = fs::read_dir(dir).map_err(fs_error)?;
    Ok(entries.next().is_none())
}

/// Reads a text file, replacing invalid UTF-8 sequences.
pub fn read_text_lossy(path: &Path) -> Result<String, MigrateError> {
    let bytes = fs::read(path)
        .map_err(|err| MigrateError::Filesystem(format!("read {}: {err}", path.display())))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Writes through a temporary file in the destination directory, replacing any
/// previous content only once the new content is complete.
pub fn write_bytes_atomic(path: &Path, content: &[u8]) -> Result<(), MigrateError> {
    let parent = path
        .parent()
        .ok_or_else(|| MigrateError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent).map_err(fs_error)?;
    let mut temp = tempfile::Builder::new()
        .prefix(".nmrshift-migrate")
        .tempfile_in(parent)
        .map_err(fs_error)?;
    io::Write::write_all(&mut temp, content).map_err(fs_error)?;
    temp.persist(path)
        .map_err(|err| MigrateError::Filesystem(err.error.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;
    use zip::write::SimpleFileOptions;

    use super::*;

    #[test]
    fn extracts_nested_entries() {
        let temp = tempfile::tempdir().unwrap();
        let zip_path = temp.path().join("data.zip");
        let mut writer = zip::ZipWriter::new(fs::File::create(&zip_path).unwrap());
        writer
            .start_file("outer/inner/fid", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"fid").unwrap();
        writer.finish().unwrap();

        let target = temp.path().join("out");
        extract_zip(&zip_path, &target).unwrap();
        assert_eq!(fs::read(target.join("outer/inner/fid")).unwrap(), b"fid");
    }

    #[test]
    fn garbage_is_corrupt() {
        let temp = tempfile::tempdir().unwrap();
        let zip_path = temp.path().join("broken.zip");
        fs::write(&zip_path, b"definitely not a zip").unwrap();
        let err = extract_zip(&zip_path, temp.path()).unwrap_err();
        assert_matches!(err, MigrateError::ArchiveCorrupt(_));
    }

    #[test]
    fn atomic_write_replaces_content() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("a").join("record.nmredata");
        write_bytes_atomic(&path, b"first").unwrap();
        write_bytes_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert_eq!(list_children(path.parent().unwrap()).unwrap(), vec![path]);
    }
}
