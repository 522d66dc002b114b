//! Extraction to disk: layout, overwrite handling and hostile entry names.

use mem_zip::{MemZipError, Result, ZipArchive};
use std::fs;
use tempfile::tempdir;

fn sample_archive() -> Result<ZipArchive> {
    let mut archive = ZipArchive::new();
    archive.add_file("top.txt", &b"top level"[..], "", None)?;
    archive.add_file("docs/", Vec::new(), "", None)?;
    archive.add_file("docs/guide.txt", &b"guide text"[..], "", None)?;
    archive.add_file("docs/deep/nested.txt", &b"nested text"[..], "", None)?;
    let buffer = archive.to_buffer()?;
    ZipArchive::from_buffer(buffer)
}

#[test]
fn test_extract_all() -> Result<()> {
    let dir = tempdir().unwrap();
    let mut archive = sample_archive()?;
    archive.extract_all_to(dir.path(), true)?;

    assert_eq!(fs::read(dir.path().join("top.txt"))?, b"top level");
    assert_eq!(fs::read(dir.path().join("docs/guide.txt"))?, b"guide text");
    assert_eq!(
        fs::read(dir.path().join("docs/deep/nested.txt"))?,
        b"nested text"
    );
    assert!(dir.path().join("docs").is_dir());
    Ok(())
}

#[test]
fn test_directory_entry_extracts_as_directory() -> Result<()> {
    let dir = tempdir().unwrap();
    let mut archive = ZipArchive::new();
    archive.add_file("docs/", Vec::new(), "", None)?;
    let buffer = archive.to_buffer()?;

    let mut reopened = ZipArchive::from_buffer(buffer)?;
    reopened.extract_all_to(dir.path(), true)?;

    let docs = dir.path().join("docs");
    assert!(docs.is_dir(), "directory entry must never become a file");
    Ok(())
}

#[test]
fn test_extract_single_entry() -> Result<()> {
    let dir = tempdir().unwrap();
    let mut archive = sample_archive()?;
    archive.extract_entry_to("docs/guide.txt", dir.path(), true, false)?;

    assert_eq!(fs::read(dir.path().join("docs/guide.txt"))?, b"guide text");
    assert!(!dir.path().join("top.txt").exists());
    Ok(())
}

#[test]
fn test_extract_entry_without_path() -> Result<()> {
    let dir = tempdir().unwrap();
    let mut archive = sample_archive()?;
    archive.extract_entry_to("docs/deep/nested.txt", dir.path(), false, false)?;

    assert_eq!(fs::read(dir.path().join("nested.txt"))?, b"nested text");
    Ok(())
}

#[test]
fn test_extract_directory_entry_recurses() -> Result<()> {
    let dir = tempdir().unwrap();
    let mut archive = sample_archive()?;
    archive.extract_entry_to("docs/", dir.path(), true, true)?;

    assert_eq!(fs::read(dir.path().join("docs/guide.txt"))?, b"guide text");
    assert_eq!(
        fs::read(dir.path().join("docs/deep/nested.txt"))?,
        b"nested text"
    );
    assert!(!dir.path().join("top.txt").exists());
    Ok(())
}

#[test]
fn test_extract_missing_entry() -> Result<()> {
    let dir = tempdir().unwrap();
    let mut archive = sample_archive()?;
    let err = archive
        .extract_entry_to("absent.txt", dir.path(), true, false)
        .unwrap_err();
    assert!(matches!(err, MemZipError::NoEntry(_)), "got {:?}", err);
    Ok(())
}

#[test]
fn test_extract_refuses_overwrite() -> Result<()> {
    let dir = tempdir().unwrap();
    let mut archive = sample_archive()?;
    archive.extract_entry_to("top.txt", dir.path(), true, false)?;
    let err = archive
        .extract_entry_to("top.txt", dir.path(), true, false)
        .unwrap_err();
    assert!(matches!(err, MemZipError::CantOverride(_)), "got {:?}", err);

    // with overwrite the second extraction succeeds
    archive.extract_entry_to("top.txt", dir.path(), true, true)?;
    Ok(())
}

#[test]
fn test_path_traversal_stays_inside_target() -> Result<()> {
    let dir = tempdir().unwrap();
    let mut archive = ZipArchive::new();
    archive.add_file("../../etc/passwd", &b"not today"[..], "", None)?;
    let buffer = archive.to_buffer()?;

    let mut reopened = ZipArchive::from_buffer(buffer)?;
    let target = dir.path().join("out");
    fs::create_dir_all(&target)?;
    reopened.extract_all_to(&target, true)?;

    // the hostile name collapses to a path below the target directory
    assert!(target.join("etc/passwd").exists());
    assert!(!dir.path().join("etc").exists());
    Ok(())
}

#[test]
fn test_add_local_file_and_folder() -> Result<()> {
    let src = tempdir().unwrap();
    fs::create_dir_all(src.path().join("inner"))?;
    fs::write(src.path().join("root.txt"), b"root file")?;
    fs::write(src.path().join("inner/leaf.txt"), b"leaf file")?;

    let mut archive = ZipArchive::new();
    archive.add_local_folder(src.path(), Some("packed"))?;
    archive.add_local_file(src.path().join("root.txt"), Some("extra"), Some("renamed.txt"))?;
    let buffer = archive.to_buffer()?;

    let mut reopened = ZipArchive::from_buffer(buffer)?;
    assert_eq!(reopened.read_file("packed/root.txt")?, b"root file");
    assert_eq!(reopened.read_file("extra/renamed.txt")?, b"root file");
    assert_eq!(reopened.read_file("packed/inner/leaf.txt")?, b"leaf file");
    assert!(reopened
        .get_entry("packed/inner/")?
        .map(|e| e.is_directory())
        .unwrap_or(false));

    let err = ZipArchive::new()
        .add_local_folder("/no/such/folder", None)
        .unwrap_err();
    assert!(matches!(err, MemZipError::FileNotFound(_)), "got {:?}", err);
    Ok(())
}

#[test]
fn test_add_local_folder_filtered() -> Result<()> {
    let src = tempdir().unwrap();
    fs::write(src.path().join("keep.txt"), b"keep")?;
    fs::write(src.path().join("skip.log"), b"skip")?;

    let mut archive = ZipArchive::new();
    archive.add_local_folder_filtered(src.path(), None, |name| !name.ends_with(".log"))?;

    assert!(archive.get_entry("keep.txt")?.is_some());
    assert!(archive.get_entry("skip.log")?.is_none());
    Ok(())
}

#[test]
fn test_archive_integrity() -> Result<()> {
    let mut archive = sample_archive()?;
    assert!(archive.test());
    Ok(())
}

#[test]
fn test_write_zip_to_disk() -> Result<()> {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.zip");

    let mut archive = ZipArchive::new();
    archive.add_file("x.txt", &b"x marks the spot"[..], "", None)?;
    archive.write_zip_to(&path)?;

    let mut reopened = ZipArchive::open(&path)?;
    assert_eq!(reopened.read_as_text("x.txt")?, "x marks the spot");

    let err = ZipArchive::open(dir.path().join("missing.zip")).unwrap_err();
    assert!(matches!(err, MemZipError::FileNotFound(_)), "got {:?}", err);
    Ok(())
}
