//! Authoring an archive and reading it back.

use mem_zip::{Result, ZipArchive};

#[test]
fn test_roundtrip_multiple_entries() -> Result<()> {
    let mut archive = ZipArchive::new();
    archive.add_file("a.txt", &b"first file"[..], "", None)?;
    archive.add_file("b.txt", &b"second file"[..], "", None)?;
    archive.add_file("sub/c.txt", &b"nested file"[..], "", None)?;

    let buffer = archive.to_buffer()?;
    let mut reopened = ZipArchive::from_buffer(buffer)?;

    assert_eq!(reopened.get_entries()?.len(), 3);
    assert_eq!(reopened.read_file("a.txt")?, b"first file");
    assert_eq!(reopened.read_file("b.txt")?, b"second file");
    assert_eq!(reopened.read_file("sub/c.txt")?, b"nested file");
    Ok(())
}

#[test]
fn test_hello_deflated() -> Result<()> {
    let mut archive = ZipArchive::new();
    archive.add_file("hello.txt", &b"hi"[..], "", None)?;

    let buffer = archive.to_buffer()?;
    let mut reopened = ZipArchive::from_buffer(buffer)?;

    let entry = reopened.get_entry("hello.txt")?.expect("entry missing");
    assert_eq!(entry.header.method, mem_zip::constants::DEFLATED);
    assert!(entry.header.compressed_size > 0);
    assert_eq!(entry.header.size, 2);
    assert_eq!(entry.header.crc, crc32fast::hash(b"hi"));
    assert_eq!(reopened.read_as_text("hello.txt")?, "hi");
    Ok(())
}

#[test]
fn test_directory_entry() -> Result<()> {
    let mut archive = ZipArchive::new();
    archive.add_file("docs/", Vec::new(), "", None)?;

    let buffer = archive.to_buffer()?;
    let mut reopened = ZipArchive::from_buffer(buffer)?;

    let entry = reopened.get_entry("docs/")?.expect("entry missing");
    assert!(entry.is_directory());
    assert_eq!(entry.header.method, mem_zip::constants::STORED);
    assert_eq!(entry.header.size, 0);

    // reading a directory yields no content
    assert_eq!(reopened.read_file("docs/")?, Vec::<u8>::new());
    Ok(())
}

#[test]
fn test_is_directory_iff_trailing_slash() -> Result<()> {
    let mut archive = ZipArchive::new();
    archive.add_file("plain.txt", &b"x"[..], "", None)?;
    archive.add_file("folder/", Vec::new(), "", None)?;

    let buffer = archive.to_buffer()?;
    let mut reopened = ZipArchive::from_buffer(buffer)?;
    for entry in reopened.get_entries()? {
        assert_eq!(entry.is_directory(), entry.entry_name().ends_with('/'));
    }
    Ok(())
}

#[test]
fn test_empty_archive_is_minimal_end_record() -> Result<()> {
    let mut archive = ZipArchive::new();
    let buffer = archive.to_buffer()?;

    assert_eq!(buffer.len(), 22);
    assert_eq!(&buffer[0..4], &[0x50, 0x4b, 0x05, 0x06]);

    let mut reopened = ZipArchive::from_buffer(buffer)?;
    assert_eq!(reopened.get_entries()?.len(), 0);
    Ok(())
}

#[test]
fn test_serialization_is_idempotent() -> Result<()> {
    let mut archive = ZipArchive::new();
    archive.add_file("b.txt", &b"beta"[..], "", None)?;
    archive.add_file("a.txt", &b"alpha"[..], "", None)?;

    let first = archive.to_buffer()?;
    let second = archive.to_buffer()?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_copy_through_preserves_bytes() -> Result<()> {
    let mut archive = ZipArchive::new();
    archive.add_file("a.txt", &b"alpha content"[..], "", None)?;
    archive.add_file("b.txt", &b"beta content"[..], "", None)?;
    let original = archive.to_buffer()?;

    // rewriting an untouched archive reproduces it byte for byte
    let mut reopened = ZipArchive::from_buffer(original.clone())?;
    let rewritten = reopened.to_buffer()?;
    assert_eq!(original, rewritten);
    Ok(())
}

#[test]
fn test_entries_sorted_by_name_on_write() -> Result<()> {
    let mut archive = ZipArchive::new();
    archive.add_file("zebra.txt", &b"z"[..], "", None)?;
    archive.add_file("Apple.txt", &b"a"[..], "", None)?;
    archive.add_file("mango.txt", &b"m"[..], "", None)?;

    let buffer = archive.to_buffer()?;
    let mut reopened = ZipArchive::from_buffer(buffer)?;
    let names: Vec<String> = reopened
        .get_entries()?
        .iter()
        .map(|e| e.entry_name())
        .collect();
    assert_eq!(names, vec!["Apple.txt", "mango.txt", "zebra.txt"]);
    Ok(())
}

#[test]
fn test_update_file() -> Result<()> {
    let mut archive = ZipArchive::new();
    archive.add_file("note.txt", &b"old"[..], "", None)?;

    let buffer = archive.to_buffer()?;
    let mut reopened = ZipArchive::from_buffer(buffer)?;
    reopened.update_file("note.txt", &b"new content"[..])?;

    let buffer = reopened.to_buffer()?;
    let mut reread = ZipArchive::from_buffer(buffer)?;
    assert_eq!(reread.read_as_text("note.txt")?, "new content");
    Ok(())
}

#[test]
fn test_delete_file_and_directory() -> Result<()> {
    let mut archive = ZipArchive::new();
    archive.add_file("keep.txt", &b"keep"[..], "", None)?;
    archive.add_file("trash/", Vec::new(), "", None)?;
    archive.add_file("trash/one.txt", &b"1"[..], "", None)?;
    archive.add_file("trash/two.txt", &b"2"[..], "", None)?;

    archive.delete_file("trash/")?;
    let buffer = archive.to_buffer()?;
    let mut reopened = ZipArchive::from_buffer(buffer)?;

    assert_eq!(reopened.get_entries()?.len(), 1);
    assert!(reopened.get_entry("trash/one.txt")?.is_none());
    assert_eq!(reopened.read_as_text("keep.txt")?, "keep");
    Ok(())
}

#[test]
fn test_archive_and_entry_comments() -> Result<()> {
    let mut archive = ZipArchive::new();
    archive.add_file("data.txt", &b"payload"[..], "entry remark", None)?;
    archive.add_zip_comment("archive remark");

    let buffer = archive.to_buffer()?;
    let mut reopened = ZipArchive::from_buffer(buffer)?;

    assert_eq!(reopened.get_zip_comment(), "archive remark");
    assert_eq!(reopened.get_zip_entry_comment("data.txt")?, "entry remark");
    Ok(())
}

#[test]
fn test_duplicate_names_last_wins() -> Result<()> {
    let mut archive = ZipArchive::new();
    archive.add_file("same.txt", &b"first"[..], "", None)?;
    archive.add_file("same.txt", &b"second"[..], "", None)?;

    assert_eq!(archive.read_as_text("same.txt")?, "second");
    Ok(())
}

#[test]
fn test_no_entry_error() {
    let mut archive = ZipArchive::new();
    let err = archive.read_file("missing.txt").unwrap_err();
    assert!(matches!(err, mem_zip::MemZipError::NoEntry(_)));
}

#[test]
fn test_entry_count_before_load() -> Result<()> {
    let mut archive = ZipArchive::new();
    archive.add_file("a.txt", &b"a"[..], "", None)?;
    archive.add_file("b.txt", &b"b"[..], "", None)?;
    let buffer = archive.to_buffer()?;

    // entry_count is served straight from the end record, no parse needed
    let reopened = ZipArchive::from_buffer(buffer)?;
    assert_eq!(reopened.entry_count(), 2);
    Ok(())
}
