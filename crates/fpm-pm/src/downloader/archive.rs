//! Tarball extraction.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tar::EntryType;

use crate::{FpmError, Result};

/// File name prefix of archives staged inside the install root
pub const STAGING_PREFIX: &str = ".fpm-";

/// Archive extractor
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// Extract a gzipped tarball into `dest_root/package_name`, stripping the
    /// archive's single root directory. The archive is deleted afterwards
    /// whether or not extraction succeeded.
    pub fn extract(archive_path: &Path, dest_root: &Path, package_name: &str) -> Result<PathBuf> {
        let target = dest_root.join(package_name);
        let result = Self::extract_tar_gz(archive_path, &target);

        if let Err(e) = std::fs::remove_file(archive_path) {
            log::warn!("Failed to remove archive {}: {}", archive_path.display(), e);
        }

        result.map(|()| target)
    }

    fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dest_dir)?;

        let file = File::open(archive_path)?;
        let decoder = GzDecoder::new(BufReader::new(file));
        Self::extract_tar_with_strip(decoder, dest_dir, 1)
    }

    /// Extract a tar stream with prefix stripping.
    ///
    /// Only directories and regular files are materialized; any other entry
    /// kind aborts with [`FpmError::UnsupportedEntry`], leaving whatever was
    /// already written in place.
    pub fn extract_tar_with_strip<R: Read>(
        reader: R,
        dest_dir: &Path,
        strip_components: usize,
    ) -> Result<()> {
        let mut archive = tar::Archive::new(reader);
        let dest_dir_canonical = dest_dir.canonicalize()?;

        for entry in archive.entries()? {
            let mut entry = entry?;
            let entry_type = entry.header().entry_type();

            if is_metadata_entry(entry_type) {
                continue;
            }

            let path = entry.path()?.into_owned();
            let Some(stripped) = strip_path(&path, strip_components)? else {
                continue;
            };
            let outpath = dest_dir.join(&stripped);

            if entry_type.is_dir() {
                std::fs::create_dir_all(&outpath)?;
                ensure_within(&outpath, &dest_dir_canonical, &stripped)?;
                // Keep owner rwx so later entries can be written beneath it
                set_mode(&outpath, entry.header().mode()? | 0o700)?;
            } else if entry_type.is_file() {
                if let Some(parent) = outpath.parent() {
                    std::fs::create_dir_all(parent)?;
                    ensure_within(parent, &dest_dir_canonical, &stripped)?;
                }

                // A read-only file left by an earlier extraction cannot be reopened
                match std::fs::remove_file(&outpath) {
                    Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
                    _ => {}
                }

                let mut outfile = File::create(&outpath)?;
                std::io::copy(&mut entry, &mut outfile)?;
                set_mode(&outpath, entry.header().mode()? & 0o777)?;
            } else {
                return Err(FpmError::UnsupportedEntry {
                    path: path.display().to_string(),
                    kind: format!("{:?}", entry_type),
                });
            }
        }

        Ok(())
    }
}

/// Pax and GNU extension headers describe the next entry rather than the filesystem.
fn is_metadata_entry(entry_type: EntryType) -> bool {
    matches!(
        entry_type,
        EntryType::XGlobalHeader | EntryType::XHeader | EntryType::GNULongName | EntryType::GNULongLink
    )
}

/// Drop the first `strip_components` segments; `None` when nothing remains.
fn strip_path(path: &Path, strip_components: usize) -> Result<Option<PathBuf>> {
    let mut segments = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => segments.push(segment),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(FpmError::PathTraversal(path.display().to_string()));
            }
        }
    }

    if segments.len() <= strip_components {
        return Ok(None);
    }
    Ok(Some(segments[strip_components..].iter().collect()))
}

fn ensure_within(path: &Path, dest_dir_canonical: &Path, entry: &Path) -> Result<()> {
    if path.canonicalize()?.starts_with(dest_dir_canonical) {
        Ok(())
    } else {
        Err(FpmError::PathTraversal(format!(
            "{} escapes destination directory",
            entry.display()
        )))
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Remove archives left in the install root by interrupted runs.
pub fn remove_stale_archives(install_root: &Path) -> Result<usize> {
    if !install_root.is_dir() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in std::fs::read_dir(install_root)? {
        let entry = entry?;
        let is_staged = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(STAGING_PREFIX));

        if is_staged && entry.file_type()?.is_file() {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }

    if removed > 0 {
        log::debug!("Removed {} stale archive(s) from {}", removed, install_root.display());
    }
    Ok(removed)
}
