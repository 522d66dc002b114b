//! Public archive surface: open/create archives, add and extract entries,
//! write the result back to a buffer or to disk.

use crate::entry::ZipEntry;
use crate::error::{MemZipError, Result};
use crate::utils;
use crate::zipfile::ZipFile;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// How a caller refers to an entry: by full name or by a handle obtained
/// from the archive. Resolved once at the API boundary.
pub enum EntryRef<'a> {
    Name(&'a str),
    Entry(&'a ZipEntry),
}

impl EntryRef<'_> {
    fn resolved(&self) -> String {
        match self {
            EntryRef::Name(name) => (*name).to_string(),
            EntryRef::Entry(entry) => entry.entry_name(),
        }
    }
}

impl<'a> From<&'a str> for EntryRef<'a> {
    fn from(name: &'a str) -> Self {
        EntryRef::Name(name)
    }
}

impl<'a> From<&'a String> for EntryRef<'a> {
    fn from(name: &'a String) -> Self {
        EntryRef::Name(name)
    }
}

impl<'a> From<&'a ZipEntry> for EntryRef<'a> {
    fn from(entry: &'a ZipEntry) -> Self {
        EntryRef::Entry(entry)
    }
}

/// A ZIP archive opened from disk, from a buffer, or created empty.
#[derive(Debug)]
pub struct ZipArchive {
    zip: ZipFile,
    filename: Option<PathBuf>,
}

impl ZipArchive {
    /// Create a new, empty archive.
    pub fn new() -> Self {
        ZipArchive {
            zip: ZipFile::new(),
            filename: None,
        }
    }

    /// Open an archive from a file on disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MemZipError::FileNotFound(path.to_path_buf()));
        }
        Ok(ZipArchive {
            zip: ZipFile::from_path(path)?,
            filename: Some(path.to_path_buf()),
        })
    }

    /// Open an archive held in a byte buffer.
    pub fn from_buffer(buffer: Vec<u8>) -> Result<Self> {
        Ok(ZipArchive {
            zip: ZipFile::from_buffer(buffer)?,
            filename: None,
        })
    }

    /// Read an entry's uncompressed content.
    pub fn read_file<'a>(&mut self, entry: impl Into<EntryRef<'a>>) -> Result<Vec<u8>> {
        let name = entry.into().resolved();
        let item = self
            .zip
            .get_entry(&name)?
            .ok_or_else(|| MemZipError::NoEntry(name.clone()))?;
        item.get_data()
    }

    /// Asynchronous [`read_file`](Self::read_file).
    #[cfg(feature = "async")]
    pub async fn read_file_async<'a>(&mut self, entry: impl Into<EntryRef<'a>>) -> Result<Vec<u8>> {
        let name = entry.into().resolved();
        let item = self
            .zip
            .get_entry(&name)?
            .ok_or_else(|| MemZipError::NoEntry(name.clone()))?;
        item.get_data_async().await
    }

    /// Read an entry's content as UTF-8 text (lossy).
    pub fn read_as_text<'a>(&mut self, entry: impl Into<EntryRef<'a>>) -> Result<String> {
        let data = self.read_file(entry)?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Asynchronous [`read_as_text`](Self::read_as_text).
    #[cfg(feature = "async")]
    pub async fn read_as_text_async<'a>(
        &mut self,
        entry: impl Into<EntryRef<'a>>,
    ) -> Result<String> {
        let data = self.read_file_async(entry).await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Replace the content of an existing entry.
    pub fn update_file<'a>(
        &mut self,
        entry: impl Into<EntryRef<'a>>,
        content: impl Into<Vec<u8>>,
    ) -> Result<()> {
        let name = entry.into().resolved();
        let item = self
            .zip
            .get_entry_mut(&name)?
            .ok_or_else(|| MemZipError::NoEntry(name.clone()))?;
        item.set_data(content);
        Ok(())
    }

    /// Remove an entry. Removing a directory removes everything under it.
    pub fn delete_file<'a>(&mut self, entry: impl Into<EntryRef<'a>>) -> Result<()> {
        let name = entry.into().resolved();
        self.zip.delete_entry(&name)
    }

    /// Set the archive comment. The archive must be rewritten afterwards.
    pub fn add_zip_comment(&mut self, comment: &str) {
        self.zip.set_comment(comment);
    }

    /// The archive comment.
    pub fn get_zip_comment(&self) -> String {
        self.zip.comment()
    }

    /// Set the comment of one entry.
    pub fn add_zip_entry_comment<'a>(
        &mut self,
        entry: impl Into<EntryRef<'a>>,
        comment: &str,
    ) -> Result<()> {
        let name = entry.into().resolved();
        if let Some(item) = self.zip.get_entry_mut(&name)? {
            item.set_comment(comment);
        }
        Ok(())
    }

    /// The comment of one entry, empty when the entry is missing.
    pub fn get_zip_entry_comment<'a>(&mut self, entry: impl Into<EntryRef<'a>>) -> Result<String> {
        let name = entry.into().resolved();
        Ok(self
            .zip
            .get_entry(&name)?
            .map(|item| item.comment())
            .unwrap_or_default())
    }

    /// Create an entry in the archive. Directory entries end in `/` and
    /// carry no content. Without explicit attributes, directories get
    /// `drwxr-xr-x` plus the MS-DOS directory flag and files get `rw-r--r--`.
    pub fn add_file(
        &mut self,
        entry_name: &str,
        content: impl Into<Vec<u8>>,
        comment: &str,
        attr: Option<u32>,
    ) -> Result<()> {
        let mut entry = ZipEntry::new();
        entry.set_entry_name(entry_name);
        entry.set_comment(comment);
        entry.header.attr = attr.unwrap_or(if entry.is_directory() {
            (0o40755 << 16) | 0x10
        } else {
            0o644 << 16
        });
        entry.set_data(content);
        self.zip.set_entry(entry)
    }

    /// Add a file from disk. `zip_path` is an optional folder inside the
    /// archive, `zip_name` overrides the stored file name.
    pub fn add_local_file<P: AsRef<Path>>(
        &mut self,
        local_path: P,
        zip_path: Option<&str>,
        zip_name: Option<&str>,
    ) -> Result<()> {
        let local_path = local_path.as_ref();
        if !local_path.exists() {
            return Err(MemZipError::FileNotFound(local_path.to_path_buf()));
        }
        let prefix = zip_prefix(zip_path);
        let name = match zip_name {
            Some(name) => name.to_string(),
            None => local_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let content = fs::read(local_path)?;
        self.add_file(&format!("{}{}", prefix, name), content, "", None)
    }

    /// Add a local directory tree to the archive.
    pub fn add_local_folder<P: AsRef<Path>>(
        &mut self,
        local_path: P,
        zip_path: Option<&str>,
    ) -> Result<()> {
        self.add_local_folder_filtered(local_path, zip_path, |_| true)
    }

    /// Add a local directory tree, keeping only the relative paths the
    /// filter accepts. Directory paths end in `/` when passed to the filter.
    pub fn add_local_folder_filtered<P, F>(
        &mut self,
        local_path: P,
        zip_path: Option<&str>,
        filter: F,
    ) -> Result<()>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> bool,
    {
        let local_path = local_path.as_ref();
        if !local_path.exists() {
            return Err(MemZipError::FileNotFound(local_path.to_path_buf()));
        }
        let prefix = zip_prefix(zip_path);
        for (path, is_dir) in utils::find_files(local_path)? {
            let relative = relative_entry_name(local_path, &path, is_dir);
            if !filter(&relative) {
                continue;
            }
            if is_dir {
                self.add_file(&format!("{}{}", prefix, relative), Vec::new(), "", None)?;
            } else {
                let content = fs::read(&path)?;
                self.add_file(&format!("{}{}", prefix, relative), content, "", None)?;
            }
        }
        Ok(())
    }

    /// Asynchronous [`add_local_folder`](Self::add_local_folder), reading
    /// one file at a time.
    #[cfg(feature = "async")]
    pub async fn add_local_folder_async<P: AsRef<Path>>(
        &mut self,
        local_path: P,
        zip_path: Option<&str>,
    ) -> Result<()> {
        let local_path = local_path.as_ref();
        if !local_path.exists() {
            return Err(MemZipError::FileNotFound(local_path.to_path_buf()));
        }
        let prefix = zip_prefix(zip_path);
        for (path, is_dir) in utils::find_files(local_path)? {
            let relative = relative_entry_name(local_path, &path, is_dir);
            if is_dir {
                self.add_file(&format!("{}{}", prefix, relative), Vec::new(), "", None)?;
            } else {
                let content = tokio::fs::read(&path).await?;
                self.add_file(&format!("{}{}", prefix, relative), content, "", None)?;
            }
        }
        Ok(())
    }

    /// All entries of the archive.
    pub fn get_entries(&mut self) -> Result<&[ZipEntry]> {
        self.zip.entries()
    }

    /// The entry with the given name, if present.
    pub fn get_entry(&mut self, name: &str) -> Result<Option<&ZipEntry>> {
        self.zip.get_entry(name)
    }

    /// Number of entries, read from the end record when the entry list has
    /// not been parsed yet.
    pub fn entry_count(&self) -> u64 {
        self.zip.entry_count()
    }

    /// Extract one entry (or a whole directory entry) below `target_path`.
    ///
    /// With `maintain_entry_path` the entry's folder structure is recreated
    /// below the target, otherwise only the basename is used. Extraction
    /// targets are sanitized so that a hostile entry name can never escape
    /// `target_path`.
    pub fn extract_entry_to<'a, P: AsRef<Path>>(
        &mut self,
        entry: impl Into<EntryRef<'a>>,
        target_path: P,
        maintain_entry_path: bool,
        overwrite: bool,
    ) -> Result<()> {
        let target_path = target_path.as_ref();
        let name = entry.into().resolved();
        let (entry_name, is_directory) = {
            let item = self
                .zip
                .get_entry(&name)?
                .ok_or_else(|| MemZipError::NoEntry(name.clone()))?;
            (item.entry_name(), item.is_directory())
        };

        if is_directory {
            for child_name in self.zip.get_entry_children(&entry_name)? {
                let (content, size, attr, is_dir) = {
                    let child = self
                        .zip
                        .get_entry(&child_name)?
                        .ok_or_else(|| MemZipError::NoEntry(child_name.clone()))?;
                    if child.is_directory() {
                        (Vec::new(), 0, 0, true)
                    } else {
                        (child.get_data()?, child.header.size, child.header.attr, false)
                    }
                };
                if is_dir {
                    continue;
                }
                if content.is_empty() && size > 0 {
                    return Err(MemZipError::CantExtractFile(child_name));
                }
                let stored = if maintain_entry_path {
                    child_name.clone()
                } else {
                    base_name(&child_name).to_string()
                };
                let dest = sanitize(target_path, &stored)?;
                utils::write_file_to(&dest, &content, overwrite, Some(attr))?;
            }
            return Ok(());
        }

        let (content, size, attr) = {
            let item = self
                .zip
                .get_entry(&entry_name)?
                .ok_or_else(|| MemZipError::NoEntry(entry_name.clone()))?;
            (item.get_data()?, item.header.size, item.header.attr)
        };
        if content.is_empty() && size > 0 {
            return Err(MemZipError::CantExtractFile(entry_name.clone()));
        }
        let stored = if maintain_entry_path {
            entry_name.clone()
        } else {
            base_name(&entry_name).to_string()
        };
        let target = sanitize(target_path, &stored)?;
        if target.exists() && !overwrite {
            return Err(MemZipError::CantOverride(target));
        }
        utils::write_file_to(&target, &content, overwrite, Some(attr))?;
        Ok(())
    }

    /// Extract the entire archive below `target_path`.
    pub fn extract_all_to<P: AsRef<Path>>(&mut self, target_path: P, overwrite: bool) -> Result<()> {
        let target_path = target_path.as_ref();
        for entry in self.zip.entries()? {
            let entry_name = entry.entry_name();
            let dest = sanitize(target_path, &entry_name)?;
            if entry.is_directory() {
                utils::make_dir(&dest)?;
                continue;
            }
            let content = entry.get_data()?;
            if content.is_empty() && entry.header.size > 0 {
                return Err(MemZipError::CantExtractFile(entry_name));
            }
            utils::write_file_to(&dest, &content, overwrite, Some(entry.header.attr))?;
        }
        debug!(path = %target_path.display(), "archive extracted");
        Ok(())
    }

    /// Asynchronous [`extract_all_to`](Self::extract_all_to), processing
    /// entries strictly one after another and aborting the batch on the
    /// first error.
    #[cfg(feature = "async")]
    pub async fn extract_all_to_async<P: AsRef<Path>>(
        &mut self,
        target_path: P,
        overwrite: bool,
    ) -> Result<()> {
        let target_path = target_path.as_ref();
        self.zip.ensure_loaded()?;
        let count = self.zip.entries()?.len();
        for i in 0..count {
            let (entry_name, is_directory) = {
                let entry = &self.zip.entries()?[i];
                (entry.entry_name(), entry.is_directory())
            };
            let dest = sanitize(target_path, &entry_name)?;
            if is_directory {
                tokio::fs::create_dir_all(&dest).await?;
                continue;
            }
            let (content, size, attr) = {
                let entry = &self.zip.entries()?[i];
                (entry.get_data_async().await?, entry.header.size, entry.header.attr)
            };
            if content.is_empty() && size > 0 {
                return Err(MemZipError::CantExtractFile(entry_name));
            }
            utils::write_file_to_async(&dest, &content, overwrite, Some(attr)).await?;
        }
        Ok(())
    }

    /// Decompress every entry, returning false as soon as one fails.
    pub fn test(&mut self) -> bool {
        let entries = match self.zip.entries() {
            Ok(entries) => entries,
            Err(_) => return false,
        };
        for entry in entries {
            if entry.is_directory() {
                continue;
            }
            if entry.get_data().is_err() {
                return false;
            }
        }
        true
    }

    /// Serialize the archive to a buffer.
    pub fn to_buffer(&mut self) -> Result<Vec<u8>> {
        self.zip.compress_to_buffer()
    }

    /// Asynchronous [`to_buffer`](Self::to_buffer).
    #[cfg(feature = "async")]
    pub async fn to_buffer_async(&mut self) -> Result<Vec<u8>> {
        self.zip.to_buffer_async().await
    }

    /// Rewrite the archive over the file it was opened from. No-op for
    /// archives that were not opened from a file.
    pub fn write_zip(&mut self) -> Result<()> {
        let target = match self.filename.clone() {
            Some(target) => target,
            None => return Ok(()),
        };
        self.write_zip_to(target)
    }

    /// Serialize the archive and write it to `target`.
    pub fn write_zip_to<P: AsRef<Path>>(&mut self, target: P) -> Result<()> {
        let data = self.zip.compress_to_buffer()?;
        utils::write_file_to(target.as_ref(), &data, true, None)?;
        Ok(())
    }
}

impl Default for ZipArchive {
    fn default() -> Self {
        Self::new()
    }
}

fn zip_prefix(zip_path: Option<&str>) -> String {
    match zip_path {
        Some(path) if !path.is_empty() => {
            let mut prefix = path.replace('\\', "/");
            if !prefix.ends_with('/') {
                prefix.push('/');
            }
            prefix
        }
        _ => String::new(),
    }
}

fn relative_entry_name(base: &Path, path: &Path, is_dir: bool) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    let mut name = relative.to_string_lossy().replace('\\', "/");
    if is_dir && !name.ends_with('/') {
        name.push('/');
    }
    name
}

fn base_name(name: &str) -> &str {
    let trimmed = name.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Lexically normalize a path: strip `.` components and resolve `..`
/// against the components already seen.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Join an entry name under a base directory so the result can never escape
/// the base.
///
/// Progressively shorter suffixes of the `/`-split name are joined under the
/// resolved base until one normalizes to a path inside it; a name whose every
/// suffix escapes falls back to the bare basename.
fn sanitize(prefix: &Path, name: &str) -> Result<PathBuf> {
    let resolved = if prefix.is_absolute() {
        normalize(prefix)
    } else {
        normalize(&std::env::current_dir()?.join(prefix))
    };
    let parts: Vec<&str> = name.split('/').collect();
    for i in 0..parts.len() {
        let mut candidate = resolved.clone();
        for part in &parts[i..] {
            candidate.push(part);
        }
        let candidate = normalize(&candidate);
        if candidate.starts_with(&resolved) {
            return Ok(candidate);
        }
    }
    Ok(resolved.join(base_name(name)))
}
