#![allow(dead_code)]

use std::convert::TryInto;
use std::fs;
use std::path::{Path, PathBuf};

use assert_fs::fixture::ChildPath;
use assert_fs::prelude::*;
use assert_fs::TempDir;

use ocflcore::{ContentPath, LogicalPath, Storage};

pub fn path(s: &str) -> LogicalPath {
    s.try_into().unwrap()
}

pub fn content_path(s: &str) -> ContentPath {
    s.to_string().try_into().unwrap()
}

pub fn create_dirs(temp: &TempDir, path: &str) -> ChildPath {
    let child = resolve_child(temp, path);
    child.create_dir_all().unwrap();
    child
}

pub fn create_file(temp: &TempDir, path: &str, content: &str) -> ChildPath {
    let child = resolve_child(temp, path);
    child.write_str(content).unwrap();
    child
}

pub fn resolve_child(temp: &TempDir, path: &str) -> ChildPath {
    let mut child: Option<ChildPath> = None;
    for part in path.split('/') {
        child = match child {
            Some(child) => Some(child.child(part)),
            None => Some(temp.child(part)),
        };
    }
    child.unwrap()
}

/// Writes `contents` to a file named `name` inside `dir`, for use as an
/// `AddFileProcessor` source outside the object's storage.
pub fn write_source(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let file = dir.join(name);
    fs::write(&file, contents).unwrap();
    file
}

/// Reads back a content path through `storage` and returns it as a `String`.
pub fn read_content(storage: &impl Storage, content_path: &str) -> String {
    let mut bytes = Vec::new();
    storage.read(content_path, &mut bytes).unwrap();
    String::from_utf8(bytes).unwrap()
}
