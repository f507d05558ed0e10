//! Recursive copy and removal used by the file steps

use crate::core::error::{Error, Result};
use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Options of a recursive copy
#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    /// Missing source and per-entry failures are errors instead of warnings
    pub strict: bool,

    /// Recreate symlinks instead of copying what they point to
    pub keep_symlinks: bool,

    /// Glob patterns matched against entry names; matches are skipped
    pub excludes: Vec<String>,
}

impl CopyOptions {
    fn patterns(&self) -> Result<Vec<Pattern>> {
        self.excludes
            .iter()
            .map(|raw| {
                Pattern::new(raw)
                    .map_err(|e| Error::config(format!("Invalid exclude pattern '{raw}': {e}")))
            })
            .collect()
    }
}

fn excluded(path: &Path, patterns: &[Pattern]) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    patterns.iter().any(|pattern| pattern.matches(name))
}

/// Copy `src` (file or directory tree) to `dst`, merging into existing
/// directories. Returns false when a missing source was skipped.
pub fn copy_recursive(src: &Path, dst: &Path, options: &CopyOptions) -> Result<bool> {
    let patterns = options.patterns()?;

    if fs::symlink_metadata(src).is_err() {
        if options.strict {
            return Err(Error::fs(src, "copy", "source does not exist"));
        }
        debug!("Copy source '{}' does not exist.", src.display());
        return Ok(false);
    }

    // List everything before the first write so a destination inside the
    // source is never walked into
    let dst_canon = fs::canonicalize(dst).ok();
    let entries: Vec<_> = WalkDir::new(src)
        .follow_links(!options.keep_symlinks)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            if excluded(entry.path(), &patterns) {
                debug!("Excluded '{}' from copy.", entry.path().display());
                return false;
            }
            match &dst_canon {
                Some(dst) if entry.file_type().is_dir() => {
                    fs::canonicalize(entry.path()).ok().as_ref() != Some(dst)
                }
                _ => true,
            }
        })
        .collect();

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| src.to_path_buf());
                tolerate(options.strict, Error::fs(path, "copy", e))?;
                continue;
            }
        };

        let target = match entry.path().strip_prefix(src) {
            Ok(rel) if rel.as_os_str().is_empty() => dst.to_path_buf(),
            Ok(rel) => dst.join(rel),
            Err(_) => continue,
        };

        if let Err(error) = copy_entry(entry.path(), &target, entry.file_type()) {
            tolerate(options.strict, error)?;
        }
    }

    Ok(true)
}

fn copy_entry(src: &Path, target: &Path, file_type: fs::FileType) -> Result<()> {
    if file_type.is_dir() {
        return fs::create_dir_all(target).map_err(|e| Error::fs(target, "create directory", e));
    }

    if let Some(parent) = target.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::fs(parent, "create directory", e))?;
    }

    if file_type.is_symlink() {
        return copy_symlink(src, target);
    }

    fs::copy(src, target)
        .map(|_| ())
        .map_err(|e| Error::fs(src, "copy", e))
}

#[cfg(unix)]
fn copy_symlink(src: &Path, target: &Path) -> Result<()> {
    let link = fs::read_link(src).map_err(|e| Error::fs(src, "read link", e))?;
    if fs::symlink_metadata(target).is_ok() {
        fs::remove_file(target).map_err(|e| Error::fs(target, "replace", e))?;
    }
    std::os::unix::fs::symlink(&link, target).map_err(|e| Error::fs(target, "create symlink", e))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, target: &Path) -> Result<()> {
    fs::copy(src, target)
        .map(|_| ())
        .map_err(|e| Error::fs(src, "copy", e))
}

fn tolerate(strict: bool, error: Error) -> Result<()> {
    if strict {
        return Err(error);
    }
    warn!("{}", error);
    Ok(())
}

/// Remove a file, symlink or whole directory tree. A missing path is an
/// error only when `strict`; returns whether anything was removed.
pub fn remove_path(path: &Path, strict: bool) -> Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(_) if !strict => {
            debug!("'{}' does not exist, nothing to remove.", path.display());
            return Ok(false);
        }
        Err(_) => return Err(Error::fs(path, "remove", "path does not exist")),
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| Error::fs(path, "remove", e))?;
    Ok(true)
}

/// Rename `src` to `dst`
pub fn move_path(src: &Path, dst: &Path) -> Result<()> {
    if fs::symlink_metadata(src).is_err() {
        return Err(Error::fs(src, "move", "source does not exist"));
    }
    fs::rename(src, dst).map_err(|e| Error::fs(src, "move", e))
}

/// Expand a `remove` payload (one path or a list) into paths
pub fn paths_of(values: &[serde_json::Value]) -> Vec<PathBuf> {
    values
        .iter()
        .map(|value| match value {
            serde_json::Value::String(path) => PathBuf::from(path),
            other => PathBuf::from(crate::core::variable::render(other)),
        })
        .collect()
}
