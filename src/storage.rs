//! The `Storage` port every object-engine operation reads and writes through, plus a
//! minimal filesystem implementation (`FsStorage`) the engine is exercised against.
//!
//! The teacher splits this abstraction into two near-identical `Storage` traits (one
//! for validation, one for staging/commit) that diverge in exactly the methods each
//! caller happened to need. This crate unifies them into one port: read, write,
//! exists, list, move, delete.

use std::borrow::Cow;
use std::fs;
use std::fs::File;
use std::io;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::Result;
use crate::util;

/// Abstraction over reading, writing, and listing files within an object store.
/// `/` must be used as the path separator regardless of the host platform.
pub trait Storage {
    /// Streams the file at `path` into `sink`.
    fn read(&self, path: &str, sink: &mut dyn Write) -> Result<()>;

    /// Streams `source` into the file at `path`, creating parent directories as needed.
    fn write(&self, path: &str, source: &mut dyn Read) -> Result<()>;

    /// True if a file or directory exists at `path`.
    fn exists(&self, path: &str) -> Result<bool>;

    /// Lists the contents of `path`. If `recursive`, every leaf entry under `path` is
    /// returned; otherwise only `path`'s immediate children. Returned paths are
    /// relative to `path`. A missing or empty directory yields an empty vector.
    fn list(&self, path: &str, recursive: bool) -> Result<Vec<Listing>>;

    /// Moves `src` to `dst`. Returns `OcflError::Overwrite` if `dst` already exists.
    fn mv(&self, src: &str, dst: &str) -> Result<()>;

    /// Deletes the file at `path`. A missing file is not an error.
    fn delete(&self, path: &str) -> Result<()>;

    /// Recursively deletes the directory at `path`, and then any now-empty ancestor
    /// directories up to (but not including) the storage root. A missing directory is
    /// not an error.
    fn delete_dir(&self, path: &str) -> Result<()>;
}

/// A filesystem entry encountered while listing a directory.
#[derive(Debug, Hash, Eq, PartialEq)]
pub enum Listing<'a> {
    File(Cow<'a, str>),
    Directory(Cow<'a, str>),
    Other(Cow<'a, str>),
}

impl<'a> Listing<'a> {
    pub fn file(path: &str) -> Listing {
        Listing::File(Cow::Borrowed(path))
    }

    pub fn dir(path: &str) -> Listing {
        Listing::Directory(Cow::Borrowed(path))
    }

    pub fn file_owned(path: String) -> Listing<'a> {
        Listing::File(Cow::Owned(path))
    }

    pub fn dir_owned(path: String) -> Listing<'a> {
        Listing::Directory(Cow::Owned(path))
    }

    pub fn path(&self) -> &str {
        match self {
            Listing::File(path) => path,
            Listing::Directory(path) => path,
            Listing::Other(path) => path,
        }
    }
}

/// A `std::fs`-backed `Storage` implementation. This is the reference adapter the
/// engine's tests drive it through; production backends (S3, etc) are a caller's
/// concern.
pub struct FsStorage {
    storage_root: PathBuf,
}

impl FsStorage {
    pub fn new(storage_root: impl AsRef<Path>) -> Self {
        Self {
            storage_root: storage_root.as_ref().to_path_buf(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.storage_root.join(path)
    }
}

impl Storage for FsStorage {
    fn read(&self, path: &str, sink: &mut dyn Write) -> Result<()> {
        io::copy(&mut File::open(self.resolve(path))?, sink)?;
        Ok(())
    }

    fn write(&self, path: &str, source: &mut dyn Read) -> Result<()> {
        let dst = self.resolve(path);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        io::copy(source, &mut File::create(dst)?)?;
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path).exists())
    }

    fn list(&self, path: &str, recursive: bool) -> Result<Vec<Listing>> {
        let mut listings = Vec::new();
        let root = self.resolve(path);

        if !root.exists() {
            return Ok(listings);
        }

        let mut walker = WalkDir::new(&root);
        if !recursive {
            walker = walker.max_depth(1);
        }

        for entry in walker {
            let entry = entry?;

            if entry.path() == root.as_path() {
                continue;
            }

            let relative_path = util::convert_backslash_to_forward(
                pathdiff::diff_paths(entry.path(), &root)
                    .unwrap()
                    .to_string_lossy()
                    .as_ref(),
            )
            .to_string();

            if entry.file_type().is_file() {
                listings.push(Listing::file_owned(relative_path));
            } else if entry.file_type().is_dir() {
                if !recursive || util::dir_is_empty(entry.path())? {
                    listings.push(Listing::dir_owned(relative_path));
                }
            } else {
                listings.push(Listing::Other(Cow::Owned(relative_path)));
            }
        }

        Ok(listings)
    }

    fn mv(&self, src: &str, dst: &str) -> Result<()> {
        let src = self.resolve(src);
        let dst = self.resolve(dst);

        // `fs::rename` silently overwrites its destination on Unix; this check
        // restores OCFL's "never clobber an existing version" guarantee.
        if dst.exists() {
            return Err(crate::error::OcflError::Overwrite(
                dst.to_string_lossy().to_string(),
            ));
        }

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::rename(src, dst)?;
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<()> {
        util::remove_file_ignore_not_found(self.resolve(path))?;
        Ok(())
    }

    fn delete_dir(&self, path: &str) -> Result<()> {
        let target = self.resolve(path);
        if !target.exists() {
            return Ok(());
        }
        fs::remove_dir_all(&target)?;
        if let Some(parent) = target.parent() {
            if parent != self.storage_root {
                let _ = util::clean_dirs_up(parent);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new(dir.path());

        storage
            .write("a/b/c.txt", &mut Cursor::new(b"hello"))
            .unwrap();

        let mut out = Vec::new();
        storage.read("a/b/c.txt", &mut out).unwrap();
        assert_eq!(b"hello".to_vec(), out);
    }

    #[test]
    fn mv_refuses_to_overwrite_existing_destination() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new(dir.path());

        storage.write("src.txt", &mut Cursor::new(b"1")).unwrap();
        storage.write("dst.txt", &mut Cursor::new(b"2")).unwrap();

        let result = storage.mv("src.txt", "dst.txt");
        assert!(result.is_err());
    }

    #[test]
    fn list_non_recursive_lists_only_immediate_children() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new(dir.path());

        storage.write("a/b.txt", &mut Cursor::new(b"1")).unwrap();
        storage.write("a/c/d.txt", &mut Cursor::new(b"2")).unwrap();

        let listings = storage.list("a", false).unwrap();
        let paths: Vec<&str> = listings.iter().map(Listing::path).collect();
        assert!(paths.contains(&"b.txt"));
        assert!(paths.contains(&"c"));
        assert!(!paths.contains(&"c/d.txt"));
    }
}
