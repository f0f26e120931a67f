//! Walks a source tree on the local filesystem and stages it into a version being
//! built, digesting as it goes.
//!
//! This is the one place in the engine that reads from outside the `Storage` port --
//! sources live on the caller's disk, not in the object store -- so it talks to
//! `std::fs` directly for reads while still writing new content through `Storage`.

use std::fs;
use std::fs::File;
use std::path::Path;

use walkdir::WalkDir;

use crate::digest::DigestAlgorithm;
use crate::error::{OcflError, Result};
use crate::path::{InventoryPath, LogicalPath};
use crate::storage::Storage;
use crate::updater::{UpdateOptions, VersionUpdater};
use crate::util;

/// Stages files from the local filesystem into a [`VersionUpdater`], computing each
/// file's digest and writing its content into the object's storage under a freshly
/// derived content path (or reusing existing content, when the digest already
/// appears in the manifest).
pub struct AddFileProcessor<'a, S: Storage> {
    storage: &'a S,
    algorithm: DigestAlgorithm,
}

impl<'a, S: Storage> AddFileProcessor<'a, S> {
    pub fn new(storage: &'a S, algorithm: DigestAlgorithm) -> Self {
        Self { storage, algorithm }
    }

    /// Adds `source` -- a single file, or a directory walked recursively -- to the
    /// version being staged, under `destination`. When `source` is a directory, each
    /// file's logical path is `destination` joined with its path relative to
    /// `source`. Returns the logical paths that were added, in walk order.
    pub fn add_path(
        &self,
        updater: &mut VersionUpdater,
        source: &Path,
        destination: &LogicalPath,
        options: UpdateOptions,
    ) -> Result<Vec<LogicalPath>> {
        if source.is_file() {
            self.stage_file(updater, source, destination, options)?;
            return Ok(vec![destination.clone()]);
        }

        let mut added = Vec::new();

        for entry in WalkDir::new(source).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = pathdiff::diff_paths(entry.path(), source).ok_or_else(|| {
                OcflError::InvalidInput(format!(
                    "Could not compute a relative path from {} to {}",
                    source.display(),
                    entry.path().display()
                ))
            })?;
            let relative_str = util::convert_backslash_to_forward(&relative.to_string_lossy()).into_owned();
            let relative_path: LogicalPath = relative_str.as_str().try_into()?;
            let logical_path = destination.resolve(&relative_path);

            self.stage_file(updater, entry.path(), &logical_path, options)?;
            added.push(logical_path);
        }

        Ok(added)
    }

    fn stage_file(
        &self,
        updater: &mut VersionUpdater,
        source: &Path,
        logical_path: &LogicalPath,
        options: UpdateOptions,
    ) -> Result<()> {
        let digest = self.algorithm.hash_hex(&mut File::open(source)?)?;

        match updater.add_file(digest, logical_path.clone(), options)? {
            Some(content_path) => {
                self.storage.write(content_path.as_str(), &mut File::open(source)?)?;
            }
            None => {
                // The digest already exists in the object; nothing new to write.
            }
        }

        if options.move_source {
            util::remove_file_ignore_not_found(source).map_err(OcflError::from)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::tempdir;

    use super::*;
    use crate::storage::FsStorage;

    fn path(s: &str) -> LogicalPath {
        s.try_into().unwrap()
    }

    #[test]
    fn add_path_stages_a_single_file_and_digests_it() {
        let staging_dir = tempdir().unwrap();
        let storage = FsStorage::new(staging_dir.path());
        let processor = AddFileProcessor::new(&storage, DigestAlgorithm::Sha512);

        let source_dir = tempdir().unwrap();
        let source_file = source_dir.path().join("hello.txt");
        fs::File::create(&source_file).unwrap().write_all(b"hello world").unwrap();

        let mut updater = VersionUpdater::new_object("urn:test:1").unwrap();
        let added = processor
            .add_path(&mut updater, &source_file, &path("data/hello.txt"), UpdateOptions::new())
            .unwrap();

        assert_eq!(vec![path("data/hello.txt")], added);

        let inventory = updater.finalize_update(None, None).unwrap();
        assert!(inventory.head_version().is_file(&path("data/hello.txt")));

        let content_path = inventory
            .content_path_for_logical_path(&path("data/hello.txt"), None)
            .unwrap();
        assert!(storage.exists(content_path.as_str()).unwrap());
    }

    #[test]
    fn add_path_walks_a_directory_preserving_relative_structure() {
        let staging_dir = tempdir().unwrap();
        let storage = FsStorage::new(staging_dir.path());
        let processor = AddFileProcessor::new(&storage, DigestAlgorithm::Sha512);

        let source_dir = tempdir().unwrap();
        fs::create_dir_all(source_dir.path().join("nested")).unwrap();
        fs::File::create(source_dir.path().join("a.txt")).unwrap().write_all(b"a").unwrap();
        fs::File::create(source_dir.path().join("nested/b.txt")).unwrap().write_all(b"b").unwrap();

        let mut updater = VersionUpdater::new_object("urn:test:1").unwrap();
        let added = processor
            .add_path(&mut updater, source_dir.path(), &path("data"), UpdateOptions::new())
            .unwrap();

        assert_eq!(2, added.len());
        assert!(added.contains(&path("data/a.txt")));
        assert!(added.contains(&path("data/nested/b.txt")));

        let inventory = updater.finalize_update(None, None).unwrap();
        assert!(inventory.head_version().is_file(&path("data/a.txt")));
        assert!(inventory.head_version().is_file(&path("data/nested/b.txt")));
    }

    #[test]
    fn add_path_with_move_source_consumes_the_original_file() {
        let staging_dir = tempdir().unwrap();
        let storage = FsStorage::new(staging_dir.path());
        let processor = AddFileProcessor::new(&storage, DigestAlgorithm::Sha512);

        let source_dir = tempdir().unwrap();
        let source_file = source_dir.path().join("hello.txt");
        fs::File::create(&source_file).unwrap().write_all(b"hello").unwrap();

        let mut updater = VersionUpdater::new_object("urn:test:1").unwrap();
        processor
            .add_path(&mut updater, &source_file, &path("data/hello.txt"), UpdateOptions::new().move_source())
            .unwrap();

        assert!(!source_file.exists());
    }
}
