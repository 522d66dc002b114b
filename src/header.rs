//! Binary header records of the ZIP container format.
//!
//! [`EntryHeader`] models one central-directory record, [`LocalHeader`] the
//! 30-byte local file header preceding an entry's compressed bytes, and
//! [`MainHeader`] the end-of-central-directory record. Local and central
//! headers may disagree on name/extra lengths, which is why the local header
//! is the authority for where an entry's compressed data actually starts.

use crate::constants::*;
use crate::error::{MemZipError, Result};
use crate::utils::{put_u16, put_u32, u16_at, u32_at, u64_at};
use chrono::{Datelike, Local, Timelike};

/// Pack a timestamp into the 4-byte MS-DOS date/time format
/// (2 bytes time, 2 bytes date, 2-second resolution).
pub fn pack_dos_time(t: &chrono::NaiveDateTime) -> u32 {
    (((t.year() - 1980) as u32 & 0x7f) << 25)
        | (t.month() << 21)
        | (t.day() << 16)
        | (t.hour() << 11)
        | (t.minute() << 5)
        | (t.second() >> 1)
}

fn dos_time_now() -> u32 {
    pack_dos_time(&Local::now().naive_local())
}

/// One central-directory record.
///
/// Sizes and the local-header offset are held as 64-bit values so that ZIP64
/// extra-field overrides fit; serialization truncates them back to the
/// 32-bit wire fields.
#[derive(Debug, Clone)]
pub struct EntryHeader {
    /// version made by
    pub made: u16,
    /// version needed to extract
    pub version: u16,
    /// general purpose bit flags
    pub flags: u16,
    /// compression method
    pub method: u16,
    /// modification time (2 bytes time, 2 bytes date)
    pub time: u32,
    /// uncompressed file crc-32 value
    pub crc: u32,
    /// compressed size
    pub compressed_size: u64,
    /// uncompressed size
    pub size: u64,
    /// filename length
    pub fname_len: u16,
    /// extra field length
    pub extra_len: u16,
    /// file comment length
    pub com_len: u16,
    /// volume number start
    pub disk_num_start: u32,
    /// internal file attributes
    pub in_attr: u16,
    /// external file attributes
    pub attr: u32,
    /// LOC header offset
    pub offset: u64,
}

impl EntryHeader {
    pub fn new() -> Self {
        EntryHeader {
            made: 10,
            version: 10,
            flags: 0,
            method: 0,
            time: dos_time_now(),
            crc: 0,
            compressed_size: 0,
            size: 0,
            fname_len: 0,
            extra_len: 0,
            com_len: 0,
            disk_num_start: 0,
            in_attr: 0,
            attr: 0,
            offset: 0,
        }
    }

    /// Full central-directory record size including the variable trailers.
    pub fn entry_header_size(&self) -> usize {
        CENHDR + self.fname_len as usize + self.extra_len as usize + self.com_len as usize
    }

    /// Whether the CRC/sizes were deferred to a trailing data descriptor.
    pub fn uses_data_descriptor(&self) -> bool {
        self.flags & FLG_DESC == FLG_DESC
    }

    /// Overwrite every field from a 46-byte CEN record.
    pub fn load_from_binary(&mut self, data: &[u8]) -> Result<()> {
        if data.len() != CENHDR || u32_at(data, 0) != CENSIG {
            return Err(MemZipError::InvalidCentralHeader);
        }
        self.made = u16_at(data, CENVEM);
        self.version = u16_at(data, CENVER);
        self.flags = u16_at(data, CENFLG);
        self.method = u16_at(data, CENHOW);
        self.time = u32_at(data, CENTIM);
        self.crc = u32_at(data, CENCRC);
        self.compressed_size = u32_at(data, CENSIZ) as u64;
        self.size = u32_at(data, CENLEN) as u64;
        self.fname_len = u16_at(data, CENNAM);
        self.extra_len = u16_at(data, CENEXT);
        self.com_len = u16_at(data, CENCOM);
        self.disk_num_start = u16_at(data, CENDSK) as u32;
        self.in_attr = u16_at(data, CENATT);
        self.attr = u32_at(data, CENATX);
        self.offset = u32_at(data, CENOFF) as u64;
        Ok(())
    }

    /// Serialize the 30-byte local file header view of this record.
    pub fn local_header_to_binary(&self) -> [u8; LOCHDR] {
        let mut data = [0u8; LOCHDR];
        put_u32(&mut data, 0, LOCSIG);
        put_u16(&mut data, LOCVER, self.version);
        put_u16(&mut data, LOCFLG, self.flags);
        put_u16(&mut data, LOCHOW, self.method);
        put_u32(&mut data, LOCTIM, self.time);
        put_u32(&mut data, LOCCRC, self.crc);
        put_u32(&mut data, LOCSIZ, self.compressed_size as u32);
        put_u32(&mut data, LOCLEN, self.size as u32);
        put_u16(&mut data, LOCNAM, self.fname_len);
        put_u16(&mut data, LOCEXT, self.extra_len);
        data
    }

    /// Serialize the central-directory record, with zeroed room for the
    /// name/extra/comment trailers that the entry copies in afterwards.
    pub fn to_binary(&self) -> Vec<u8> {
        let mut data = vec![0u8; self.entry_header_size()];
        put_u32(&mut data, 0, CENSIG);
        put_u16(&mut data, CENVEM, self.made);
        put_u16(&mut data, CENVER, self.version);
        put_u16(&mut data, CENFLG, self.flags);
        put_u16(&mut data, CENHOW, self.method);
        put_u32(&mut data, CENTIM, self.time);
        put_u32(&mut data, CENCRC, self.crc);
        put_u32(&mut data, CENSIZ, self.compressed_size as u32);
        put_u32(&mut data, CENLEN, self.size as u32);
        put_u16(&mut data, CENNAM, self.fname_len);
        put_u16(&mut data, CENEXT, self.extra_len);
        put_u16(&mut data, CENCOM, self.com_len);
        put_u16(&mut data, CENDSK, self.disk_num_start as u16);
        put_u16(&mut data, CENATT, self.in_attr);
        put_u32(&mut data, CENATX, self.attr);
        put_u32(&mut data, CENOFF, self.offset as u32);
        data
    }

    /// Start of the compressed data belonging to this entry, derived from
    /// the local header actually found at `offset`.
    pub fn data_offset(&self, local: &LocalHeader) -> u64 {
        self.offset + LOCHDR as u64 + local.fname_len as u64 + local.extra_len as u64
    }
}

impl Default for EntryHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// The 30-byte local file header preceding an entry's compressed data.
#[derive(Debug, Clone, Copy)]
pub struct LocalHeader {
    pub version: u16,
    pub flags: u16,
    pub method: u16,
    pub time: u32,
    pub crc: u32,
    pub compressed_size: u32,
    pub size: u32,
    pub fname_len: u16,
    pub extra_len: u16,
}

impl LocalHeader {
    /// Parse the local header found at `offset` in the archive buffer.
    pub fn load(buffer: &[u8], offset: u64) -> Result<LocalHeader> {
        let start = offset as usize;
        if start + LOCHDR > buffer.len() {
            return Err(MemZipError::InvalidLocalHeader);
        }
        let data = &buffer[start..start + LOCHDR];
        if u32_at(data, 0) != LOCSIG {
            return Err(MemZipError::InvalidLocalHeader);
        }
        Ok(LocalHeader {
            version: u16_at(data, LOCVER),
            flags: u16_at(data, LOCFLG),
            method: u16_at(data, LOCHOW),
            time: u32_at(data, LOCTIM),
            crc: u32_at(data, LOCCRC),
            compressed_size: u32_at(data, LOCSIZ),
            size: u32_at(data, LOCLEN),
            fname_len: u16_at(data, LOCNAM),
            extra_len: u16_at(data, LOCEXT),
        })
    }
}

/// The end-of-central-directory record.
///
/// The volume and total entry counts are kept mirrored (setting either sets
/// both) since only single-volume archives are produced.
#[derive(Debug, Clone)]
pub struct MainHeader {
    volume_entries: u64,
    total_entries: u64,
    /// central directory size in bytes
    pub size: u64,
    /// offset of first CEN header
    pub offset: u64,
    /// zip file comment length
    pub comment_length: u16,
}

impl MainHeader {
    pub fn new() -> Self {
        MainHeader {
            volume_entries: 0,
            total_entries: 0,
            size: 0,
            offset: 0,
            comment_length: 0,
        }
    }

    /// Number of entries on this volume.
    pub fn disk_entries(&self) -> u64 {
        self.volume_entries
    }

    /// Total number of entries in the archive.
    pub fn total_entries(&self) -> u64 {
        self.total_entries
    }

    /// Set both entry counts at once.
    pub fn set_total_entries(&mut self, val: u64) {
        self.total_entries = val;
        self.volume_entries = val;
    }

    /// End record size including the archive comment.
    pub fn main_header_size(&self) -> usize {
        ENDHDR + self.comment_length as usize
    }

    /// Parse either the classic 22-byte END record or a ZIP64 end record.
    pub fn load_from_binary(&mut self, data: &[u8]) -> Result<()> {
        let classic = data.len() == ENDHDR && u32_at(data, 0) == ENDSIG;
        let zip64 = data.len() >= ZIP64HDR && u32_at(data, 0) == ZIP64SIG;
        if !classic && !zip64 {
            return Err(MemZipError::InvalidEndHeader);
        }
        if classic {
            self.volume_entries = u16_at(data, ENDSUB) as u64;
            self.total_entries = u16_at(data, ENDTOT) as u64;
            self.size = u32_at(data, ENDSIZ) as u64;
            self.offset = u32_at(data, ENDOFF) as u64;
            self.comment_length = u16_at(data, ENDCOM);
        } else {
            self.volume_entries = u64_at(data, ZIP64SUB);
            self.total_entries = u64_at(data, ZIP64TOT);
            self.size = u64_at(data, ZIP64SIZB);
            self.offset = u64_at(data, ZIP64OFF);
            self.comment_length = 0;
        }
        Ok(())
    }

    /// Serialize the classic END record, with zeroed room for the comment.
    pub fn to_binary(&self) -> Vec<u8> {
        let mut data = vec![0u8; self.main_header_size()];
        put_u32(&mut data, 0, ENDSIG);
        put_u16(&mut data, ENDSUB, self.volume_entries as u16);
        put_u16(&mut data, ENDTOT, self.total_entries as u16);
        put_u32(&mut data, ENDSIZ, self.size as u32);
        put_u32(&mut data, ENDOFF, self.offset as u32);
        put_u16(&mut data, ENDCOM, self.comment_length);
        data
    }
}

impl Default for MainHeader {
    fn default() -> Self {
        Self::new()
    }
}
