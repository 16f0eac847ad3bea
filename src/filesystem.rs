//! Directory helpers shared by the clone executor and the directive pipeline.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::Result;

/// Whether `dir` has no entries. A missing directory counts as empty.
pub fn is_empty_dir(dir: &Path) -> Result<bool> {
    match fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e.into()),
    }
}

/// Whether `relative` names something strictly inside the directory it is
/// joined to: only normal components, at least one of them.
pub fn is_contained(relative: &Path) -> bool {
    let mut normal = false;
    for component in relative.components() {
        match component {
            Component::Normal(_) => normal = true,
            Component::CurDir => {}
            _ => return false,
        }
    }
    normal
}

/// First proper ancestor of `base/relative`, below `base`, that is a symlink.
///
/// Writing or deleting through such a path would reach outside `base`.
pub fn symlinked_ancestor(base: &Path, relative: &Path) -> Option<PathBuf> {
    let mut current = base.to_path_buf();
    let parent = relative.parent()?;
    for component in parent.components() {
        current.push(component);
        if fs::symlink_metadata(&current).is_ok_and(|m| m.file_type().is_symlink()) {
            return Some(current);
        }
    }
    None
}

/// Remove a file, symlink or directory tree.
pub fn remove_path(path: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Remove `path` if it exists.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match remove_path(path) {
        Err(crate::error::Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Recursively copy `src` over `dst`, overwriting files that exist in both.
///
/// Entries whose path relative to `src` satisfies `skip` are left out.
pub fn copy_merge(src: &Path, dst: &Path, skip: impl Fn(&Path) -> bool) -> Result<()> {
    fs::create_dir_all(dst)?;

    let walker = WalkDir::new(src).min_depth(1).into_iter();
    for entry in walker.filter_entry(|entry| {
        entry
            .path()
            .strip_prefix(src)
            .map(|relative| !skip(relative))
            .unwrap_or(true)
    }) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = match entry.path().strip_prefix(src) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            if fs::symlink_metadata(&target).is_ok_and(|m| !m.is_dir()) {
                fs::remove_file(&target)?;
            }
            fs::create_dir_all(&target)?;
        } else {
            if fs::symlink_metadata(&target).is_ok_and(|m| m.is_dir()) {
                fs::remove_dir_all(&target)?;
            }
            if file_type.is_symlink() {
                copy_symlink(entry.path(), &target)?;
            } else {
                fs::copy(entry.path(), &target)?;
            }
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link = fs::read_link(src)?;
    remove_if_exists(dst)?;
    std::os::unix::fs::symlink(link, dst)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)?;
    Ok(())
}

/// Move every entry of `src` into `dst`, leaving `src` empty.
///
/// Falls back to copy-then-delete when a rename is not possible, for example
/// across filesystems.
pub fn move_contents(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());

        if fs::rename(&from, &to).is_err() {
            if entry.file_type()?.is_dir() {
                copy_merge(&from, &to, |_| false)?;
            } else if entry.file_type()?.is_symlink() {
                copy_symlink(&from, &to)?;
            } else {
                fs::copy(&from, &to)?;
            }
            remove_path(&from)?;
        }
    }

    Ok(())
}
