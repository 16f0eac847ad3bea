//! # Archive Download and Extraction
//!
//! Hosting providers serve a gzipped tarball of any commit. The tarball wraps
//! the tree in one top-level directory (`widget-<hash>/` on GitHub), so
//! extraction strips that first component. When only a subdirectory was asked
//! for, extraction keeps the entries below it and strips its full depth as
//! well.
//!
//! Archives are untrusted. Nothing is written outside the destination: entry
//! paths must be relative without `..`, no entry is written through a symlink,
//! symlink targets must resolve inside the destination, and hard links must
//! point at another entry of the same extraction.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use log::debug;
use tar::EntryType;

use crate::descriptor::RepoDescriptor;
use crate::error::{Error, Result};
use crate::filesystem::symlinked_ancestor;

/// Download URL of the archive for `hash`.
pub fn archive_url(repo: &RepoDescriptor, hash: &str) -> String {
    match repo.site.as_str() {
        "gitlab.com" => format!("{}/repository/archive.tar.gz?ref={}", repo.url, hash),
        "bitbucket.org" => format!("{}/get/{}.tar.gz", repo.url, hash),
        _ => format!("{}/archive/{}.tar.gz", repo.url, hash),
    }
}

/// Download `url` to `dest`, optionally through `proxy`.
///
/// A failed request is reported as `CouldNotFetch`, with the HTTP status or
/// transport failure as its source.
///
/// The body is streamed into a temporary file next to `dest` and moved into
/// place once complete, so an interrupted download never leaves a truncated
/// archive behind.
pub fn download(url: &str, dest: &Path, proxy: Option<&str>) -> Result<()> {
    let mut builder = ureq::AgentBuilder::new();
    if let Some(proxy) = proxy {
        let proxy = ureq::Proxy::new(proxy).map_err(|e| Error::Network {
            url: url.to_string(),
            message: format!("invalid proxy {}: {}", proxy, e),
        })?;
        builder = builder.proxy(proxy);
    }
    let agent = builder.build();

    debug!("GET {}", url);
    let response = agent.get(url).call().map_err(|err| {
        let message = match err {
            ureq::Error::Status(code, _response) => format!("server returned status {code}"),
            ureq::Error::Transport(transport) => format!("transport error: {transport}"),
        };
        Error::could_not_fetch(
            url,
            Error::Network {
                url: url.to_string(),
                message,
            },
        )
    })?;

    let parent = dest.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;
    let mut out = tempfile::NamedTempFile::new_in(parent)?;
    io::copy(&mut response.into_reader(), &mut out)?;
    out.persist(dest).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Extract a `.tar.gz` archive into `dest`.
///
/// The top-level directory is stripped. With `subdir`, only entries under
/// `<top>/<subdir>/` are extracted and that prefix is stripped too.
pub fn extract(archive: &Path, dest: &Path, subdir: Option<&str>) -> Result<()> {
    let archive_error = |message: String| Error::Archive {
        path: archive.to_path_buf(),
        message,
    };

    let subdir: Vec<&str> = subdir
        .map(|s| s.split('/').filter(|part| !part.is_empty()).collect())
        .unwrap_or_default();

    fs::create_dir_all(dest)?;
    let file = File::open(archive)?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    let mut extracted = 0usize;

    for entry in tar.entries().map_err(|e| archive_error(e.to_string()))? {
        let mut entry = entry.map_err(|e| archive_error(e.to_string()))?;
        let path = entry
            .path()
            .map_err(|e| archive_error(e.to_string()))?
            .into_owned();

        let Some(relative) = strip_entry_path(&path, &subdir) else {
            continue;
        };
        validate_relative_path(&relative).map_err(archive_error)?;

        if let Some(link) = symlinked_ancestor(dest, &relative) {
            return Err(archive_error(format!(
                "{} would be written through symlink {}",
                relative.display(),
                link.display()
            )));
        }

        let out = dest.join(&relative);
        match entry.header().entry_type() {
            EntryType::Directory => {
                if fs::symlink_metadata(&out).is_ok_and(|m| !m.is_dir()) {
                    fs::remove_file(&out)?;
                }
                fs::create_dir_all(&out)?;
            }
            EntryType::Regular | EntryType::Continuous | EntryType::Symlink => {
                if entry.header().entry_type() == EntryType::Symlink {
                    let target = entry
                        .link_name()
                        .map_err(|e| archive_error(e.to_string()))?
                        .ok_or_else(|| {
                            archive_error(format!("{}: missing link target", relative.display()))
                        })?;
                    validate_symlink_target(&relative, &target).map_err(archive_error)?;
                }
                prepare_output(&out)?;
                entry
                    .unpack(&out)
                    .map_err(|e| archive_error(format!("{}: {}", relative.display(), e)))?;
            }
            EntryType::Link => {
                let target = entry
                    .link_name()
                    .map_err(|e| archive_error(e.to_string()))?
                    .ok_or_else(|| {
                        archive_error(format!("{}: missing link target", relative.display()))
                    })?
                    .into_owned();
                let source = hard_link_source(&target, &subdir).ok_or_else(|| {
                    archive_error(format!(
                        "{}: hard link to {} outside the extracted tree",
                        relative.display(),
                        target.display()
                    ))
                })?;
                validate_relative_path(&source).map_err(archive_error)?;
                if symlinked_ancestor(dest, &source).is_some()
                    || fs::symlink_metadata(dest.join(&source)).is_ok_and(|m| !m.is_file())
                {
                    return Err(archive_error(format!(
                        "{}: hard link to {} is not a regular file",
                        relative.display(),
                        target.display()
                    )));
                }
                prepare_output(&out)?;
                fs::copy(dest.join(&source), &out)?;
            }
            // pax headers and other metadata entries carry no content
            _ => continue,
        }
        extracted += 1;
    }

    if extracted == 0 && !subdir.is_empty() {
        return Err(archive_error(format!(
            "subdirectory {} not found in archive",
            subdir.join("/")
        )));
    }

    Ok(())
}

/// Drop the top-level directory and the `subdir` prefix from an entry path.
///
/// Returns `None` for entries outside `subdir` and for the stripped
/// directories themselves.
fn strip_entry_path(path: &Path, subdir: &[&str]) -> Option<PathBuf> {
    let mut components = path.components().filter(|c| !matches!(c, Component::CurDir));
    components.next()?;

    for expected in subdir {
        match components.next() {
            Some(Component::Normal(part)) if part == *expected => {}
            _ => return None,
        }
    }

    let rest: PathBuf = components.collect();
    if rest.as_os_str().is_empty() {
        None
    } else {
        Some(rest)
    }
}

/// Make room for a non-directory entry at `out`.
///
/// Whatever is already there (a file, a symlink or a directory) is removed, so
/// unpacking never writes through an existing symlink.
fn prepare_output(out: &Path) -> Result<()> {
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::symlink_metadata(out) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(out)?,
        Ok(_) => fs::remove_file(out)?,
        Err(_) => {}
    }
    Ok(())
}

/// Path, relative to the destination, of the entry a hard link points at.
///
/// Hard link targets are archive paths, so they get the same stripping as
/// entry paths.
fn hard_link_source(target: &Path, subdir: &[&str]) -> Option<PathBuf> {
    if target.is_absolute() {
        return None;
    }
    strip_entry_path(target, subdir)
}

/// Check that a symlink at `relative` pointing at `target` stays inside the
/// destination.
///
/// `..` is only accepted before the first named component, since a named
/// component may itself be a link and make a later `..` climb further.
fn validate_symlink_target(relative: &Path, target: &Path) -> std::result::Result<(), String> {
    let unsafe_target = || {
        format!(
            "symlink {} points outside the destination: {}",
            relative.display(),
            target.display()
        )
    };

    let mut depth = relative
        .parent()
        .map(|parent| {
            parent
                .components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .count()
        })
        .unwrap_or(0);

    let mut descended = false;
    for component in target.components() {
        match component {
            Component::Normal(_) => {
                depth += 1;
                descended = true;
            }
            Component::CurDir => {}
            Component::ParentDir if descended => return Err(unsafe_target()),
            Component::ParentDir => depth = depth.checked_sub(1).ok_or_else(unsafe_target)?,
            Component::RootDir | Component::Prefix(_) => return Err(unsafe_target()),
        }
    }
    Ok(())
}

fn validate_relative_path(path: &Path) -> std::result::Result<(), String> {
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(format!("unsafe path in archive: {}", path.display())),
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::path::Path;
    use tar::EntryType;

    /// One entry of a test archive.
    pub enum TarEntry<'a> {
        File(&'a str, &'a str),
        Symlink(&'a str, &'a str),
        HardLink(&'a str, &'a str),
    }

    /// Build a `.tar.gz` at `dest` from `(path, content)` pairs.
    pub fn write_tar_gz(dest: &Path, files: &[(&str, &str)]) {
        let entries: Vec<TarEntry> = files
            .iter()
            .map(|(path, content)| TarEntry::File(path, content))
            .collect();
        write_tar_gz_entries(dest, &entries);
    }

    /// Build a `.tar.gz` at `dest` from arbitrary entries, in order.
    pub fn write_tar_gz_entries(dest: &Path, entries: &[TarEntry]) {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let file = std::fs::File::create(dest).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for entry in entries {
            let mut header = tar::Header::new_gnu();
            header.set_mode(0o644);
            match entry {
                TarEntry::File(path, content) => {
                    header.set_size(content.len() as u64);
                    header.set_cksum();
                    builder
                        .append_data(&mut header, path, content.as_bytes())
                        .unwrap();
                }
                TarEntry::Symlink(path, target) | TarEntry::HardLink(path, target) => {
                    let kind = match entry {
                        TarEntry::Symlink(..) => EntryType::Symlink,
                        _ => EntryType::Link,
                    };
                    header.set_entry_type(kind);
                    header.set_size(0);
                    header.set_link_name(target).unwrap();
                    header.set_cksum();
                    builder
                        .append_data(&mut header, path, std::io::empty())
                        .unwrap();
                }
            }
        }
        builder.into_inner().unwrap().finish().unwrap();
    }
}
