//! A single archive member: name, comment, extra field and payload.
//!
//! Entries read from an existing archive keep a shared reference to the
//! source buffer and decompress their payload slice on demand; entries
//! authored in memory carry their uncompressed payload until the archive is
//! serialized. Each decompression call re-reads and re-checks the payload,
//! there is no caching.

use crate::constants::*;
use crate::error::{MemZipError, Result};
use crate::header::{EntryHeader, LocalHeader};
use crate::utils::{u16_at, u32_at, u64_at};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::sync::Arc;

/// One archive entry.
#[derive(Debug, Clone)]
pub struct ZipEntry {
    /// Central-directory metadata for this entry.
    pub header: EntryHeader,
    raw_name: Vec<u8>,
    extra: Vec<u8>,
    comment: Vec<u8>,
    is_directory: bool,
    data: Option<Vec<u8>>,
    changed: bool,
    source: Option<Arc<Vec<u8>>>,
}

impl ZipEntry {
    /// Create an empty entry for authoring.
    pub fn new() -> Self {
        ZipEntry {
            header: EntryHeader::new(),
            raw_name: Vec::new(),
            extra: Vec::new(),
            comment: Vec::new(),
            is_directory: false,
            data: None,
            changed: false,
            source: None,
        }
    }

    /// Create an entry backed by the source archive buffer.
    pub(crate) fn from_source(source: Arc<Vec<u8>>) -> Self {
        let mut entry = Self::new();
        entry.source = Some(source);
        entry
    }

    /// Full entry name inside the archive, with `/` separators.
    pub fn entry_name(&self) -> String {
        String::from_utf8_lossy(&self.raw_name).into_owned()
    }

    /// Entry name bytes exactly as stored.
    pub fn raw_name(&self) -> &[u8] {
        &self.raw_name
    }

    /// Set the entry name. A trailing `/` or `\` byte marks a directory.
    pub fn set_entry_name(&mut self, name: &str) {
        self.raw_name = name.as_bytes().to_vec();
        let last = self.raw_name.last().copied();
        self.is_directory = last == Some(b'/') || last == Some(b'\\');
        self.header.fname_len = self.raw_name.len() as u16;
    }

    /// Basename of the entry, directory separator trimmed.
    pub fn name(&self) -> String {
        let full = self.entry_name();
        let trimmed = full.trim_end_matches('/');
        trimmed.rsplit('/').next().unwrap_or(trimmed).to_string()
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn extra(&self) -> &[u8] {
        &self.extra
    }

    /// Set the extra field. ZIP64 sub-records found in it override the header
    /// fields currently holding the 32/16-bit sentinel values.
    pub fn set_extra(&mut self, extra: Vec<u8>) {
        self.header.extra_len = extra.len() as u16;
        self.extra = extra;
        self.parse_extra();
    }

    pub fn comment(&self) -> String {
        String::from_utf8_lossy(&self.comment).into_owned()
    }

    pub fn set_comment(&mut self, comment: &str) {
        self.comment = comment.as_bytes().to_vec();
        self.header.com_len = self.comment.len() as u16;
    }

    /// Set the uncompressed payload. Real content switches the entry to
    /// DEFLATED and stamps size and CRC; directories and empty buffers are
    /// stored uncompressed.
    pub fn set_data(&mut self, data: impl Into<Vec<u8>>) {
        let data = data.into();
        if !self.is_directory && !data.is_empty() {
            self.header.size = data.len() as u64;
            self.header.method = DEFLATED;
            self.header.crc = crc32fast::hash(&data);
            self.changed = true;
        } else {
            self.header.method = STORED;
        }
        self.data = Some(data);
    }

    /// Uncompressed payload of this entry.
    ///
    /// Authored payloads are returned verbatim; everything else is
    /// decompressed from the source archive with CRC verification (skipped
    /// when the streamed-data-descriptor flag is set, whose trailing
    /// descriptor is not parsed).
    pub fn get_data(&self) -> Result<Vec<u8>> {
        if self.changed {
            return Ok(self.data.clone().unwrap_or_default());
        }
        self.decompress()
    }

    /// Asynchronous [`get_data`](Self::get_data); identical bytes.
    ///
    /// Unlike the synchronous variant, reading a directory entry reports
    /// [`MemZipError::DirectoryContent`] here.
    #[cfg(feature = "async")]
    pub async fn get_data_async(&self) -> Result<Vec<u8>> {
        if self.changed {
            return Ok(self.data.clone().unwrap_or_default());
        }
        self.decompress_async().await
    }

    /// Bytes to write into the archive body for this entry, updating
    /// `header.compressed_size` as a side effect.
    ///
    /// Entries whose payload was never set pass the original compressed
    /// slice through unchanged.
    pub fn get_compressed_data(&mut self) -> Result<Vec<u8>> {
        let unset = self.data.as_ref().map_or(true, |d| d.is_empty());
        if unset && self.source.is_some() {
            return self.compressed_slice();
        }
        if self.is_directory {
            return Ok(Vec::new());
        }
        match &self.data {
            Some(data) if !data.is_empty() => match self.header.method {
                STORED => {
                    self.header.compressed_size = self.header.size;
                    Ok(data.clone())
                }
                _ => {
                    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                    encoder.write_all(data)?;
                    let deflated = encoder.finish()?;
                    self.header.compressed_size = deflated.len() as u64;
                    Ok(deflated)
                }
            },
            _ => Ok(Vec::new()),
        }
    }

    /// Asynchronous [`get_compressed_data`](Self::get_compressed_data);
    /// identical bytes for the same entry state.
    #[cfg(feature = "async")]
    pub async fn get_compressed_data_async(&mut self) -> Result<Vec<u8>> {
        use tokio::io::AsyncWriteExt;

        let unset = self.data.as_ref().map_or(true, |d| d.is_empty());
        if unset && self.source.is_some() {
            return self.compressed_slice();
        }
        if self.is_directory {
            return Ok(Vec::new());
        }
        match &self.data {
            Some(data) if !data.is_empty() => match self.header.method {
                STORED => {
                    self.header.compressed_size = self.header.size;
                    Ok(data.clone())
                }
                _ => {
                    let cursor = std::io::Cursor::new(Vec::new());
                    let mut encoder =
                        async_compression::tokio::write::DeflateEncoder::new(cursor);
                    encoder.write_all(data).await?;
                    encoder.shutdown().await?;
                    let deflated = encoder.into_inner().into_inner();
                    self.header.compressed_size = deflated.len() as u64;
                    Ok(deflated)
                }
            },
            _ => Ok(Vec::new()),
        }
    }

    /// Serialize the central-directory record including name, extra field
    /// and comment trailers.
    pub fn pack_header(&self) -> Vec<u8> {
        let mut header = self.header.to_binary();
        let name_end = CENHDR + self.raw_name.len();
        header[CENHDR..name_end].copy_from_slice(&self.raw_name);
        if !self.extra.is_empty() {
            header[name_end..name_end + self.extra.len()].copy_from_slice(&self.extra);
        }
        if !self.comment.is_empty() {
            let comment_start = name_end + self.extra.len();
            header[comment_start..comment_start + self.comment.len()]
                .copy_from_slice(&self.comment);
        }
        header
    }

    /// The entry's compressed bytes as stored in the source archive.
    fn compressed_slice(&self) -> Result<Vec<u8>> {
        let source = match &self.source {
            Some(source) => source,
            None => return Ok(Vec::new()),
        };
        let local = LocalHeader::load(source, self.header.offset)?;
        let start = (self.header.data_offset(&local) as usize).min(source.len());
        let end = (start + self.header.compressed_size as usize).min(source.len());
        Ok(source[start..end].to_vec())
    }

    fn check_crc(&self, data: &[u8], local: &LocalHeader) -> Result<()> {
        // With flag bit 3 set the CRC trails the data in a descriptor that
        // is not parsed, so there is nothing to verify against.
        if !self.header.uses_data_descriptor() && crc32fast::hash(data) != local.crc {
            return Err(MemZipError::BadCrc(self.entry_name()));
        }
        Ok(())
    }

    fn decompress(&self) -> Result<Vec<u8>> {
        if self.is_directory {
            return Ok(Vec::new());
        }
        let source = match &self.source {
            Some(source) => source.clone(),
            None => return Ok(Vec::new()),
        };
        let local = LocalHeader::load(&source, self.header.offset)?;
        let start = (self.header.data_offset(&local) as usize).min(source.len());
        let end = (start + self.header.compressed_size as usize).min(source.len());
        let compressed = &source[start..end];
        if compressed.is_empty() {
            return Ok(Vec::new());
        }
        match self.header.method {
            STORED => {
                let data = compressed.to_vec();
                self.check_crc(&data, &local)?;
                Ok(data)
            }
            DEFLATED => {
                let mut decoder = DeflateDecoder::new(compressed);
                let mut data = Vec::with_capacity(self.header.size as usize);
                decoder.read_to_end(&mut data)?;
                self.check_crc(&data, &local)?;
                Ok(data)
            }
            other => Err(MemZipError::UnknownMethod(other)),
        }
    }

    #[cfg(feature = "async")]
    async fn decompress_async(&self) -> Result<Vec<u8>> {
        use tokio::io::AsyncReadExt;

        if self.is_directory {
            return Err(MemZipError::DirectoryContent(self.entry_name()));
        }
        let source = match &self.source {
            Some(source) => source.clone(),
            None => return Ok(Vec::new()),
        };
        let local = LocalHeader::load(&source, self.header.offset)?;
        let start = (self.header.data_offset(&local) as usize).min(source.len());
        let end = (start + self.header.compressed_size as usize).min(source.len());
        let compressed = &source[start..end];
        if compressed.is_empty() {
            return Ok(Vec::new());
        }
        match self.header.method {
            STORED => {
                let data = compressed.to_vec();
                self.check_crc(&data, &local)?;
                Ok(data)
            }
            DEFLATED => {
                let mut decoder =
                    async_compression::tokio::bufread::DeflateDecoder::new(compressed);
                let mut data = Vec::with_capacity(self.header.size as usize);
                decoder.read_to_end(&mut data).await?;
                self.check_crc(&data, &local)?;
                Ok(data)
            }
            other => Err(MemZipError::UnknownMethod(other)),
        }
    }

    fn parse_extra(&mut self) {
        let data = self.extra.clone();
        let mut offset = 0usize;
        while offset + 4 <= data.len() {
            let signature = u16_at(&data, offset);
            let size = u16_at(&data, offset + 2) as usize;
            offset += 4;
            if offset + size > data.len() {
                break;
            }
            if signature == ID_ZIP64 {
                self.parse_zip64_extended(&data[offset..offset + size]);
            }
            offset += size;
        }
    }

    // Override header fields carrying the ZIP64 sentinel with the 64-bit
    // values from the extended information field, in its defined order.
    fn parse_zip64_extended(&mut self, data: &[u8]) {
        if data.len() >= EF_ZIP64_SCOMP && self.header.size == EF_ZIP64_OR_32 {
            self.header.size = u64_at(data, EF_ZIP64_SUNCOMP);
        }
        if data.len() >= EF_ZIP64_RHO && self.header.compressed_size == EF_ZIP64_OR_32 {
            self.header.compressed_size = u64_at(data, EF_ZIP64_SCOMP);
        }
        if data.len() >= EF_ZIP64_DSN && self.header.offset == EF_ZIP64_OR_32 {
            self.header.offset = u64_at(data, EF_ZIP64_RHO);
        }
        if data.len() >= EF_ZIP64_DSN + 4 && self.header.disk_num_start == EF_ZIP64_OR_16 {
            self.header.disk_num_start = u32_at(data, EF_ZIP64_DSN);
        }
    }
}

impl Default for ZipEntry {
    fn default() -> Self {
        Self::new()
    }
}
