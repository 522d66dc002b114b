//! # mem-zip: In-Memory ZIP Archive Library
//!
//! `mem-zip` is a lightweight ZIP library that operates on whole archives held
//! in memory: open an archive from a file or byte buffer (or start from
//! nothing), inspect and modify its entries, and write the result back out.
//!
//! ## Features
//!
//! - **Read**: locate the end-of-central-directory record (ZIP64 aware),
//!   lazily parse entries, decompress with CRC-32 verification
//! - **Write**: add, update and delete entries, then serialize the archive to
//!   a buffer or a file; unchanged entries are copied through untouched
//! - **Safe extraction**: entry names are sanitized so a hostile archive can
//!   never write outside the extraction directory
//! - **Async**: Tokio-based variants of the read/write/extract operations
//!   behind the `async` feature
//!
//! ## Quick Start
//!
//! ### Reading a ZIP file
//!
//! ```no_run
//! use mem_zip::ZipArchive;
//!
//! let mut archive = ZipArchive::open("archive.zip")?;
//!
//! // List all entries
//! for entry in archive.get_entries()? {
//!     println!("{}: {} bytes", entry.entry_name(), entry.header.size);
//! }
//!
//! // Read a specific file
//! let text = archive.read_as_text("readme.txt")?;
//! # Ok::<(), mem_zip::MemZipError>(())
//! ```
//!
//! ### Creating a ZIP file
//!
//! ```no_run
//! use mem_zip::ZipArchive;
//!
//! let mut archive = ZipArchive::new();
//! archive.add_file("hello.txt", &b"Hello, World!"[..], "", None)?;
//! archive.add_file("docs/", Vec::new(), "", None)?;
//! archive.write_zip_to("output.zip")?;
//! # Ok::<(), mem_zip::MemZipError>(())
//! ```
//!
//! ### Extracting safely
//!
//! ```no_run
//! use mem_zip::ZipArchive;
//!
//! let mut archive = ZipArchive::open("archive.zip")?;
//! archive.extract_all_to("out", true)?;
//! # Ok::<(), mem_zip::MemZipError>(())
//! ```

pub mod archive;
pub mod constants;
pub mod entry;
pub mod error;
pub mod header;
pub mod utils;
pub mod zipfile;

pub use archive::{EntryRef, ZipArchive};
pub use entry::ZipEntry;
pub use error::{MemZipError, Result};
pub use header::{EntryHeader, LocalHeader, MainHeader};
pub use zipfile::ZipFile;
