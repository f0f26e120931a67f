//! End-to-end exercises of the engine against `FsStorage`: build an object across
//! several versions exactly the way a caller would (`AddFileProcessor` stages
//! bytes into a `VersionUpdater`, `CommitEngine` installs the result), then read
//! it back and assert on the concrete digests/paths/dedup behavior.

use anyhow::Result;
use tempfile::tempdir;

use ocflcore::path::InventoryPath;
use ocflcore::{AddFileProcessor, CommitEngine, DigestAlgorithm, FsStorage, OcflError, Storage, UpdateOptions, VersionNum, VersionUpdater};

mod common;

use common::{content_path, path, write_source};

#[test]
fn three_successive_puts_then_two_partial_reads() -> Result<()> {
    let object_root = tempdir()?;
    let storage = FsStorage::new(object_root.path());
    let sources = tempdir()?;
    let processor = AddFileProcessor::new(&storage, DigestAlgorithm::Sha512);
    let engine = CommitEngine::new(&storage);

    // v1 = {file1: "A", file2: "B"}
    let mut updater = VersionUpdater::new_object("urn:test:three-puts")?;
    let file1 = write_source(sources.path(), "file1", b"A");
    let file2 = write_source(sources.path(), "file2", b"B");
    processor.add_path(&mut updater, &file1, &path("file1"), UpdateOptions::new())?;
    processor.add_path(&mut updater, &file2, &path("file2"), UpdateOptions::new())?;
    let v1 = engine.commit(updater.finalize_update(None, None)?, None)?;

    // v2 = {file1: "A", file2: "B", dir1/file3: "C"}
    let mut updater = VersionUpdater::for_next_version(v1.clone())?;
    let file3 = write_source(sources.path(), "file3", b"C");
    processor.add_path(&mut updater, &file3, &path("dir1/file3"), UpdateOptions::new())?;
    let v2 = engine.commit(updater.finalize_update(None, None)?, Some(&v1))?;

    // v3 = {file2: "B", file4: "A"} -- file4 reuses file1's digest/content.
    let mut updater = VersionUpdater::for_next_version(v2.clone())?;
    updater.remove_file(&path("file1"))?;
    updater.remove_file(&path("dir1/file3"))?;
    let file4 = write_source(sources.path(), "file4", b"A");
    processor.add_path(&mut updater, &file4, &path("file4"), UpdateOptions::new())?;
    let v3 = engine.commit(updater.finalize_update(None, None)?, Some(&v2))?;

    assert_eq!(3, v3.versions.len());
    assert_eq!(VersionNum::new(3), v3.head);

    let manifest = v3.manifest();
    assert_eq!(3, manifest.len());
    assert!(manifest.contains_path(&content_path("v1/content/file1")));
    assert!(manifest.contains_path(&content_path("v1/content/file2")));
    assert!(manifest.contains_path(&content_path("v2/content/dir1/file3")));

    let file4_content_path = v3.content_path_for_logical_path(&path("file4"), None)?;
    assert_eq!("v1/content/file1", file4_content_path.as_str());

    let v3_head = v3.head_version();
    assert!(v3_head.is_file(&path("file2")));
    assert!(v3_head.is_file(&path("file4")));
    assert!(!v3_head.exists(&path("file1")));
    assert!(!v3_head.exists(&path("dir1/file3")));

    let v1_version = v3.get_version(VersionNum::new(1))?;
    assert!(v1_version.is_file(&path("file1")));
    assert!(v1_version.is_file(&path("file2")));

    Ok(())
}

#[test]
fn rename_then_remove_and_replace_across_versions() -> Result<()> {
    let object_root = tempdir()?;
    let storage = FsStorage::new(object_root.path());
    let sources = tempdir()?;
    let processor = AddFileProcessor::new(&storage, DigestAlgorithm::Sha512);
    let engine = CommitEngine::new(&storage);

    let mut updater = VersionUpdater::new_object("urn:test:rename")?;
    let file1 = write_source(sources.path(), "file1", b"A");
    let file2 = write_source(sources.path(), "file2", b"B");
    processor.add_path(&mut updater, &file1, &path("file1"), UpdateOptions::new())?;
    processor.add_path(&mut updater, &file2, &path("file2"), UpdateOptions::new())?;
    let v1 = engine.commit(updater.finalize_update(None, None)?, None)?;

    // v2: add dir1/file3 = "C", then rename file1 -> dir3/file1.
    let mut updater = VersionUpdater::for_next_version(v1.clone())?;
    let file3 = write_source(sources.path(), "file3", b"C");
    processor.add_path(&mut updater, &file3, &path("dir1/file3"), UpdateOptions::new())?;
    updater.rename_file(&path("file1"), path("dir3/file1"), UpdateOptions::new())?;
    let v2 = engine.commit(updater.finalize_update(None, None)?, Some(&v1))?;

    // v3: remove dir1/file3 and dir3/file1, then write a fresh dir1/file3 = "D".
    let mut updater = VersionUpdater::for_next_version(v2.clone())?;
    updater.remove_file(&path("dir1/file3"))?;
    updater.remove_file(&path("dir3/file1"))?;
    let file3_new = write_source(sources.path(), "file3-new", b"D");
    processor.add_path(&mut updater, &file3_new, &path("dir1/file3"), UpdateOptions::new())?;
    let v3 = engine.commit(updater.finalize_update(None, None)?, Some(&v2))?;

    let head = v3.head_version();
    assert!(head.is_file(&path("file2")));
    assert!(head.is_file(&path("dir1/file3")));
    assert!(!head.exists(&path("file1")));
    assert!(!head.exists(&path("dir3/file1")));

    let file2_content_path = v3.content_path_for_logical_path(&path("file2"), None)?;
    assert_eq!("v1/content/file2", file2_content_path.as_str());

    let new_file3_content_path = v3.content_path_for_logical_path(&path("dir1/file3"), None)?;
    assert_eq!("v3/content/dir1/file3", new_file3_content_path.as_str());

    // OCFL never garbage-collects: "A" and the original "C" digest are still
    // referenced by the manifest even though no current logical path uses them.
    assert!(v3.manifest().contains_path(&content_path("v1/content/file1")));
    assert!(v3.manifest().contains_path(&content_path("v2/content/dir1/file3")));

    Ok(())
}

#[test]
fn overwrite_without_the_flag_fails_and_leaves_state_unchanged() -> Result<()> {
    let object_root = tempdir()?;
    let storage = FsStorage::new(object_root.path());
    let sources = tempdir()?;
    let processor = AddFileProcessor::new(&storage, DigestAlgorithm::Sha512);

    let mut updater = VersionUpdater::new_object("urn:test:overwrite")?;
    let file1 = write_source(sources.path(), "file1", b"A");
    processor.add_path(&mut updater, &file1, &path("file1"), UpdateOptions::new())?;

    let replacement = write_source(sources.path(), "replacement", b"B");
    let result = processor.add_path(&mut updater, &replacement, &path("file1"), UpdateOptions::new());
    assert!(matches!(result, Err(OcflError::Overwrite(_))));

    let inventory = updater.finalize_update(None, None)?;
    let digest = DigestAlgorithm::Sha512.hash_hex(&mut "A".as_bytes())?;
    assert_eq!(&digest, inventory.head_version().lookup_digest(&path("file1")).unwrap().as_ref());

    Ok(())
}

#[test]
fn concurrent_commit_is_detected_before_any_write() -> Result<()> {
    let object_root = tempdir()?;
    let storage = FsStorage::new(object_root.path());
    let sources = tempdir()?;
    let processor = AddFileProcessor::new(&storage, DigestAlgorithm::Sha512);
    let engine = CommitEngine::new(&storage);

    let mut updater = VersionUpdater::new_object("urn:test:concurrent")?;
    let file1 = write_source(sources.path(), "file1", b"A");
    processor.add_path(&mut updater, &file1, &path("file1"), UpdateOptions::new())?;
    let v1 = engine.commit(updater.finalize_update(None, None)?, None)?;

    let mut updater_a = VersionUpdater::for_next_version(v1.clone())?;
    let file2 = write_source(sources.path(), "file2", b"B");
    processor.add_path(&mut updater_a, &file2, &path("file2"), UpdateOptions::new())?;
    let staged_a = updater_a.finalize_update(None, None)?;

    let mut updater_b = VersionUpdater::for_next_version(v1.clone())?;
    let file3 = write_source(sources.path(), "file3", b"C");
    processor.add_path(&mut updater_b, &file3, &path("file3"), UpdateOptions::new())?;
    let staged_b = updater_b.finalize_update(None, None)?;

    // A commits first, advancing head to v2.
    engine.commit(staged_a, Some(&v1))?;

    // B's commit was staged against v1, which is no longer the object's head.
    let result = engine.commit(staged_b, Some(&v1));
    assert!(matches!(result, Err(OcflError::ObjectOutOfSync { .. })));

    assert!(!storage.exists("v3")?);

    Ok(())
}

#[test]
fn mutable_head_revisions_then_promote_collapse_into_one_version() -> Result<()> {
    let object_root = tempdir()?;
    let storage = FsStorage::new(object_root.path());
    let sources = tempdir()?;
    let processor = AddFileProcessor::new(&storage, DigestAlgorithm::Sha512);
    let engine = CommitEngine::new(&storage);

    let mut updater = VersionUpdater::new_object("urn:test:mutable-head")?;
    let file2 = write_source(sources.path(), "file2", b"B");
    processor.add_path(&mut updater, &file2, &path("file2"), UpdateOptions::new())?;
    let v1 = engine.commit(updater.finalize_update(None, None)?, None)?;

    // Revision 1: dir1/file3 = "X", dir1/file4 = "X" (same digest, two paths).
    let mut revision = VersionUpdater::for_next_mutable_revision(v1.clone())?;
    let file3 = write_source(sources.path(), "file3", b"X");
    let file4 = write_source(sources.path(), "file4", b"X");
    processor.add_path(&mut revision, &file3, &path("dir1/file3"), UpdateOptions::new())?;
    processor.add_path(&mut revision, &file4, &path("dir1/file4"), UpdateOptions::new())?;
    let staged_r1 = revision.finalize_update(None, None)?;
    let committed_r1 = engine.commit_mutable_head_revision(staged_r1, &v1)?;

    // Revision 2: file5 = "Y"; rename dir1/file3 -> file3; remove dir1/file4.
    let mut revision = VersionUpdater::for_next_mutable_revision(committed_r1)?;
    let file5 = write_source(sources.path(), "file5", b"Y");
    processor.add_path(&mut revision, &file5, &path("file5"), UpdateOptions::new())?;
    revision.rename_file(&path("dir1/file3"), path("file3"), UpdateOptions::new())?;
    revision.remove_file(&path("dir1/file4"))?;
    let staged_r2 = revision.finalize_update(None, None)?;
    let committed_r2 = engine.commit_mutable_head_revision(staged_r2, &v1)?;

    assert!(!storage.exists("v2")?);

    let promoted = engine.promote_mutable_head(committed_r2, &v1)?;

    assert_eq!(VersionNum::new(2), promoted.head);
    assert!(!promoted.mutable_head);
    assert!(storage.exists("v2/inventory.json")?);
    assert!(!storage.exists("extensions/0005-mutable-head")?);

    let head = promoted.head_version();
    assert!(head.is_file(&path("file3")));
    assert!(head.is_file(&path("file5")));
    assert!(!head.exists(&path("dir1/file3")));
    assert!(!head.exists(&path("dir1/file4")));

    let file3_content_path = promoted.content_path_for_logical_path(&path("file3"), None)?;
    assert!(file3_content_path.as_str().starts_with("v2/content/"));
    assert!(storage.exists(file3_content_path.as_str())?);

    Ok(())
}
