//! Whole-archive model: end-record location, central-directory parsing and
//! archive serialization.
//!
//! A [`ZipFile`] owns its entries and main header. The entry list is
//! materialized by [`ZipFile::ensure_loaded`], a one-time parse pass over the
//! source buffer that is a no-op on every later call.

use crate::constants::*;
use crate::entry::ZipEntry;
use crate::error::{MemZipError, Result};
use crate::header::MainHeader;
use crate::utils::{u32_at, u64_at};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// An in-memory ZIP archive.
#[derive(Debug)]
pub struct ZipFile {
    source: Option<Arc<Vec<u8>>>,
    main_header: MainHeader,
    comment: Vec<u8>,
    entries: Vec<ZipEntry>,
    table: HashMap<String, usize>,
    loaded: bool,
}

impl ZipFile {
    /// Create an empty archive.
    pub fn new() -> Self {
        ZipFile {
            source: None,
            main_header: MainHeader::new(),
            comment: Vec::new(),
            entries: Vec::new(),
            table: HashMap::new(),
            loaded: true,
        }
    }

    /// Open an archive from a file on disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let buffer = std::fs::read(path)?;
        Self::from_buffer(buffer)
    }

    /// Open an archive held in a byte buffer.
    pub fn from_buffer(buffer: Vec<u8>) -> Result<Self> {
        let source = Arc::new(buffer);
        let (main_header, comment) = read_main_header(&source)?;
        Ok(ZipFile {
            source: Some(source),
            main_header,
            comment,
            entries: Vec::new(),
            table: HashMap::new(),
            loaded: false,
        })
    }

    /// Parse the central directory into the entry list and lookup table.
    ///
    /// Idempotent: the parse runs once, every later call returns
    /// immediately.
    pub fn ensure_loaded(&mut self) -> Result<()> {
        if self.loaded {
            return Ok(());
        }
        self.loaded = true;
        self.table.clear();
        self.entries = Vec::with_capacity(self.main_header.disk_entries() as usize);
        let source = match &self.source {
            Some(source) => source.clone(),
            None => return Ok(()),
        };
        let mut index = self.main_header.offset as usize;
        for _ in 0..self.main_header.disk_entries() {
            if index + CENHDR > source.len() {
                return Err(MemZipError::InvalidCentralHeader);
            }
            let mut entry = ZipEntry::from_source(source.clone());
            entry.header.load_from_binary(&source[index..index + CENHDR])?;

            let name_start = index + CENHDR;
            let name_end = name_start + entry.header.fname_len as usize;
            let extra_end = name_end + entry.header.extra_len as usize;
            let comment_end = extra_end + entry.header.com_len as usize;
            if comment_end > source.len() {
                return Err(MemZipError::InvalidCentralHeader);
            }
            let name = String::from_utf8_lossy(&source[name_start..name_end]).into_owned();
            entry.set_entry_name(&name);
            if name_end < extra_end {
                entry.set_extra(source[name_end..extra_end].to_vec());
            }
            if extra_end < comment_end {
                let comment =
                    String::from_utf8_lossy(&source[extra_end..comment_end]).into_owned();
                entry.set_comment(&comment);
            }

            index += entry.header.entry_header_size();
            // duplicate names collapse to the last one parsed
            self.table.insert(name, self.entries.len());
            self.entries.push(entry);
        }
        debug!(entries = self.entries.len(), "central directory parsed");
        Ok(())
    }

    /// All entries, parsing the central directory on first access.
    pub fn entries(&mut self) -> Result<&[ZipEntry]> {
        self.ensure_loaded()?;
        Ok(&self.entries)
    }

    /// Mutable access to all entries.
    pub fn entries_mut(&mut self) -> Result<&mut [ZipEntry]> {
        self.ensure_loaded()?;
        Ok(&mut self.entries)
    }

    /// Entry count, served from the end record when the entry list has not
    /// been materialized yet.
    pub fn entry_count(&self) -> u64 {
        if !self.loaded {
            return self.main_header.disk_entries();
        }
        self.entries.len() as u64
    }

    /// Look up an entry by its full name.
    pub fn get_entry(&mut self, name: &str) -> Result<Option<&ZipEntry>> {
        self.ensure_loaded()?;
        Ok(self.table.get(name).map(|&i| &self.entries[i]))
    }

    /// Look up an entry by its full name, mutably.
    pub fn get_entry_mut(&mut self, name: &str) -> Result<Option<&mut ZipEntry>> {
        self.ensure_loaded()?;
        match self.table.get(name) {
            Some(&i) => Ok(Some(&mut self.entries[i])),
            None => Ok(None),
        }
    }

    /// Append an entry. An existing entry with the same name stays in the
    /// list but the lookup table now resolves to the new one.
    pub fn set_entry(&mut self, entry: ZipEntry) -> Result<()> {
        self.ensure_loaded()?;
        self.table.insert(entry.entry_name(), self.entries.len());
        self.entries.push(entry);
        self.main_header.set_total_entries(self.entries.len() as u64);
        Ok(())
    }

    /// Remove an entry. Removing a directory entry also removes every entry
    /// nested under it.
    pub fn delete_entry(&mut self, name: &str) -> Result<()> {
        self.ensure_loaded()?;
        let is_directory = match self.table.get(name) {
            Some(&i) => self.entries[i].is_directory(),
            None => return Ok(()),
        };
        if is_directory {
            self.entries.retain(|e| !e.entry_name().starts_with(name));
        } else if let Some(&i) = self.table.get(name) {
            self.entries.remove(i);
        }
        self.rebuild_table();
        self.main_header.set_total_entries(self.entries.len() as u64);
        Ok(())
    }

    /// Names of all entries nested under a directory entry (including the
    /// directory itself). Empty for non-directory entries.
    pub fn get_entry_children(&mut self, name: &str) -> Result<Vec<String>> {
        self.ensure_loaded()?;
        let is_directory = match self.table.get(name) {
            Some(&i) => self.entries[i].is_directory(),
            None => false,
        };
        if !is_directory {
            return Ok(Vec::new());
        }
        Ok(self
            .entries
            .iter()
            .map(|e| e.entry_name())
            .filter(|n| n.starts_with(name))
            .collect())
    }

    /// Archive comment.
    pub fn comment(&self) -> String {
        String::from_utf8_lossy(&self.comment).into_owned()
    }

    /// Set the archive comment.
    pub fn set_comment(&mut self, comment: &str) {
        self.comment = comment.as_bytes().to_vec();
        self.main_header.comment_length = self.comment.len() as u16;
    }

    /// Serialize the whole archive to a buffer.
    ///
    /// Entries are sorted ascending case-insensitively by name, each entry's
    /// payload is compressed (or passed through untouched when unchanged),
    /// and the output is data blocks, central directory, end record and
    /// archive comment in that order.
    pub fn compress_to_buffer(&mut self) -> Result<Vec<u8>> {
        self.ensure_loaded()?;
        if self.entries.len() > 1 {
            self.entries
                .sort_by_key(|e| e.entry_name().to_lowercase());
            self.rebuild_table();
        }
        let mut data_block: Vec<u8> = Vec::new();
        let mut entry_headers: Vec<u8> = Vec::new();
        let mut dindex: u64 = 0;
        self.main_header.size = 0;
        self.main_header.offset = 0;

        for entry in &mut self.entries {
            // compressing first matters: the headers serialized below must
            // see the final compressed size
            let compressed = entry.get_compressed_data()?;
            entry.header.offset = dindex;

            let data_header = entry.header.local_header_to_binary();
            dindex += (data_header.len()
                + entry.raw_name().len()
                + entry.extra().len()
                + compressed.len()) as u64;
            data_block.extend_from_slice(&data_header);
            data_block.extend_from_slice(entry.raw_name());
            data_block.extend_from_slice(entry.extra());
            data_block.extend_from_slice(&compressed);

            let entry_header = entry.pack_header();
            self.main_header.size += entry_header.len() as u64;
            entry_headers.extend_from_slice(&entry_header);
        }
        self.main_header.offset = dindex;

        Ok(self.assemble(data_block, entry_headers))
    }

    /// Asynchronous archive serialization, compressing entries one at a time
    /// in a strictly sequential pipeline.
    ///
    /// Sorts entries descending by name, the reverse of
    /// [`compress_to_buffer`](Self::compress_to_buffer) (see DESIGN.md).
    #[cfg(feature = "async")]
    pub async fn to_buffer_async(&mut self) -> Result<Vec<u8>> {
        self.ensure_loaded()?;
        if self.entries.len() > 1 {
            self.entries
                .sort_by_key(|e| std::cmp::Reverse(e.entry_name().to_lowercase()));
            self.rebuild_table();
        }
        let mut data_block: Vec<u8> = Vec::new();
        let mut entry_headers: Vec<u8> = Vec::new();
        let mut dindex: u64 = 0;
        self.main_header.size = 0;
        self.main_header.offset = 0;

        for entry in &mut self.entries {
            let compressed = entry.get_compressed_data_async().await?;
            entry.header.offset = dindex;

            let data_header = entry.header.local_header_to_binary();
            dindex += (data_header.len()
                + entry.raw_name().len()
                + entry.extra().len()
                + compressed.len()) as u64;
            data_block.extend_from_slice(&data_header);
            data_block.extend_from_slice(entry.raw_name());
            data_block.extend_from_slice(entry.extra());
            data_block.extend_from_slice(&compressed);

            let entry_header = entry.pack_header();
            self.main_header.size += entry_header.len() as u64;
            entry_headers.extend_from_slice(&entry_header);
        }
        self.main_header.offset = dindex;

        Ok(self.assemble(data_block, entry_headers))
    }

    fn assemble(&self, data_block: Vec<u8>, entry_headers: Vec<u8>) -> Vec<u8> {
        let mut end_record = self.main_header.to_binary();
        let comment_room = end_record.len() - ENDHDR;
        let comment_len = self.comment.len().min(comment_room);
        end_record[ENDHDR..ENDHDR + comment_len].copy_from_slice(&self.comment[..comment_len]);

        let mut out =
            Vec::with_capacity(data_block.len() + entry_headers.len() + end_record.len());
        out.extend_from_slice(&data_block);
        out.extend_from_slice(&entry_headers);
        out.extend_from_slice(&end_record);
        debug!(
            entries = self.entries.len(),
            bytes = out.len(),
            "archive serialized"
        );
        out
    }

    fn rebuild_table(&mut self) {
        self.table.clear();
        for (i, entry) in self.entries.iter().enumerate() {
            self.table.insert(entry.entry_name(), i);
        }
    }
}

impl Default for ZipFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Locate and parse the end-of-central-directory record.
///
/// The archive comment (up to 65535 attacker-controlled bytes) sits after
/// the end record, so the scan runs backward from `len - 22` over the whole
/// possible comment range. A classic END signature is only a candidate: a
/// ZIP64 locator may still precede it, and a ZIP64 end record is
/// authoritative when found.
fn read_main_header(buffer: &[u8]) -> Result<(MainHeader, Vec<u8>)> {
    if buffer.len() < ENDHDR {
        return Err(MemZipError::InvalidFormat);
    }
    let mut i = (buffer.len() - ENDHDR) as i64;
    let max = (buffer.len() as i64 - ENDHDR as i64 - 0xFFFF).max(0);
    let mut n = max;
    let mut end_offset: i64 = -1;
    let mut end_start = buffer.len();
    let mut comment_end = 0usize;

    while i >= n {
        let pos = i as usize;
        if buffer[pos] != 0x50 {
            // quick check that the byte is 'P'
            i -= 1;
            continue;
        }
        let signature = u32_at(buffer, pos);
        if signature == ENDSIG {
            end_offset = i;
            comment_end = pos;
            end_start = pos + ENDHDR;
            // a regular END record was found; look just a bit further back
            // for a ZIP64 locator
            n = (i - END64HDR as i64).max(0);
        } else if signature == END64SIG {
            // a ZIP64 locator exists, re-scan the whole comment range for
            // the ZIP64 record
            n = max;
        } else if signature == ZIP64SIG && pos + ZIP64SIZE + 8 <= buffer.len() {
            // the ZIP64 record itself supersedes the classic one; its extent
            // is the stored size plus the 12 leading bytes it does not count
            end_offset = i;
            end_start = pos + u64_at(buffer, pos + ZIP64SIZE) as usize + ZIP64LEAD;
            break;
        }
        i -= 1;
    }

    if end_offset < 0 {
        return Err(MemZipError::InvalidFormat);
    }
    let end_start = end_start.min(buffer.len());
    let mut main_header = MainHeader::new();
    main_header.load_from_binary(&buffer[end_offset as usize..end_start])?;
    debug!(
        offset = end_offset,
        entries = main_header.total_entries(),
        "end of central directory located"
    );

    let comment = if main_header.comment_length > 0 {
        let start = comment_end + ENDHDR;
        let end = (start + main_header.comment_length as usize).min(buffer.len());
        buffer[start.min(buffer.len())..end].to_vec()
    } else {
        Vec::new()
    };
    Ok((main_header, comment))
}
