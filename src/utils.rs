//! Little-endian field access and filesystem helpers shared by the archive
//! modules.

use crate::error::{MemZipError, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) fn u16_at(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

pub(crate) fn u32_at(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

pub(crate) fn u64_at(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

pub(crate) fn put_u16(data: &mut [u8], offset: usize, val: u16) {
    data[offset..offset + 2].copy_from_slice(&val.to_le_bytes());
}

pub(crate) fn put_u32(data: &mut [u8], offset: usize, val: u32) {
    data[offset..offset + 4].copy_from_slice(&val.to_le_bytes());
}

/// Recursively create a directory, failing with `FileInTheWay` when an
/// existing file occupies one of the path components.
pub fn make_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    let mut current = PathBuf::new();
    for component in path.components() {
        current.push(component);
        if let Ok(meta) = fs::metadata(&current) {
            if meta.is_file() {
                return Err(MemZipError::FileInTheWay(current));
            }
        }
    }
    fs::create_dir_all(path)?;
    Ok(())
}

/// Recursively list a directory. Directories are included in the result and
/// flagged so callers can mirror them as directory entries.
pub fn find_files<P: AsRef<Path>>(dir: P) -> Result<Vec<(PathBuf, bool)>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        let path = entry.path();
        let is_dir = entry.file_type()?.is_dir();
        found.push((path.clone(), is_dir));
        if is_dir {
            found.extend(find_files(&path)?);
        }
    }
    Ok(found)
}

/// Write a whole buffer to `path`, creating parent directories as needed.
///
/// Returns `Ok(false)` without touching the filesystem when the destination
/// already exists and `overwrite` is false, or when a directory sits at the
/// destination. When `attr` carries external ZIP attributes, the Unix
/// permission bits in its high 16 bits are applied to the written file.
pub fn write_file_to<P: AsRef<Path>>(
    path: P,
    content: &[u8],
    overwrite: bool,
    attr: Option<u32>,
) -> Result<bool> {
    let path = path.as_ref();
    if path.exists() {
        if !overwrite {
            return Ok(false);
        }
        if fs::metadata(path)?.is_dir() {
            return Ok(false);
        }
    }
    if let Some(folder) = path.parent() {
        if !folder.as_os_str().is_empty() && !folder.exists() {
            make_dir(folder)?;
        }
    }
    fs::write(path, content)?;
    apply_unix_mode(path, attr)?;
    Ok(true)
}

/// Asynchronous [`write_file_to`], built on `tokio::fs`. Same contract,
/// byte-identical results.
#[cfg(feature = "async")]
pub async fn write_file_to_async<P: AsRef<Path>>(
    path: P,
    content: &[u8],
    overwrite: bool,
    attr: Option<u32>,
) -> Result<bool> {
    let path = path.as_ref();
    match tokio::fs::metadata(path).await {
        Ok(meta) => {
            if !overwrite || meta.is_dir() {
                return Ok(false);
            }
        }
        Err(_) => {}
    }
    if let Some(folder) = path.parent() {
        if !folder.as_os_str().is_empty() {
            tokio::fs::create_dir_all(folder).await?;
        }
    }
    tokio::fs::write(path, content).await?;
    apply_unix_mode(path, attr)?;
    Ok(true)
}

#[cfg(unix)]
fn apply_unix_mode(path: &Path, attr: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if let Some(attr) = attr {
        let mode = (attr >> 16) & 0o7777;
        if mode != 0 {
            fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_unix_mode(_path: &Path, _attr: Option<u32>) -> Result<()> {
    Ok(())
}
