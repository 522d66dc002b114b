//! Error types for mem-zip

use std::io;
use std::path::PathBuf;

/// Result type for mem-zip operations
pub type Result<T> = std::result::Result<T, MemZipError>;

/// Error types that can occur during ZIP operations
#[derive(Debug)]
pub enum MemZipError {
    /// I/O error
    Io(io::Error),
    /// No end-of-central-directory header found in the archive
    InvalidFormat,
    /// Invalid LOC header (bad signature) at an entry's stored offset
    InvalidLocalHeader,
    /// Invalid CEN header (bad signature or truncated record)
    InvalidCentralHeader,
    /// Invalid END header (bad signature or truncated record)
    InvalidEndHeader,
    /// CRC-32 checksum failed after decompression
    BadCrc(String),
    /// Unsupported compression method
    UnknownMethod(u16),
    /// Entry not found in the archive
    NoEntry(String),
    /// Decompression yielded no data for a non-empty entry
    CantExtractFile(String),
    /// Destination exists and overwrite was not requested
    CantOverride(PathBuf),
    /// A directory entry cannot have content
    DirectoryContent(String),
    /// Local file or folder to add does not exist
    FileNotFound(PathBuf),
    /// A file occupies a path where a directory must be created
    FileInTheWay(PathBuf),
}

impl std::fmt::Display for MemZipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemZipError::Io(e) => write!(f, "I/O error: {}", e),
            MemZipError::InvalidFormat => {
                write!(f, "Invalid or unsupported zip format. No END header found")
            }
            MemZipError::InvalidLocalHeader => write!(f, "Invalid LOC header (bad signature)"),
            MemZipError::InvalidCentralHeader => write!(f, "Invalid CEN header (bad signature)"),
            MemZipError::InvalidEndHeader => write!(f, "Invalid END header (bad signature)"),
            MemZipError::BadCrc(name) => write!(f, "CRC32 checksum failed: {}", name),
            MemZipError::UnknownMethod(method) => {
                write!(f, "Invalid/unsupported compression method: {}", method)
            }
            MemZipError::NoEntry(name) => write!(f, "Entry doesn't exist: {}", name),
            MemZipError::CantExtractFile(name) => {
                write!(f, "Could not extract the file: {}", name)
            }
            MemZipError::CantOverride(path) => {
                write!(f, "Target file already exists: {}", path.display())
            }
            MemZipError::DirectoryContent(name) => {
                write!(f, "A directory cannot have content: {}", name)
            }
            MemZipError::FileNotFound(path) => {
                write!(f, "File not found: {}", path.display())
            }
            MemZipError::FileInTheWay(path) => {
                write!(f, "There is a file in the way: {}", path.display())
            }
        }
    }
}

impl std::error::Error for MemZipError {}

impl From<io::Error> for MemZipError {
    fn from(err: io::Error) -> Self {
        MemZipError::Io(err)
    }
}
