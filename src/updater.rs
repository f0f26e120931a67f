//! Stages a new version on top of an [`Inventory`] without mutating it.
//!
//! A `VersionUpdater` owns its own working copies of the manifest and the
//! version-in-progress's logical state. Every operation here only ever touches those
//! working copies; nothing is visible to the object until [`VersionUpdater::finalize_update`]
//! hands back a brand new [`Inventory`]. This is the only place outside of
//! [`InventoryBuilder`] that is allowed to construct an `Inventory`.

use std::rc::Rc;

use chrono::Local;

use crate::bimap::PathBiMap;
use crate::digest::HexDigest;
use crate::error::{OcflError, Result};
use crate::inventory::builder::new_staged_version;
use crate::inventory::{Inventory, InventoryBuilder, User};
use crate::path::{ContentPath, InventoryPath, LogicalPath, VersionNum};

/// Recognized options for `addFile`, `renameFile`, and `reinstateFile`.
///
/// `move_source` has no effect inside `VersionUpdater` itself -- this type's
/// operations never touch bytes on disk, only logical state and manifest digests.
/// It's carried here so one option type covers every call site; [`crate::addfile::AddFileProcessor`]
/// is the part that actually reads it to decide between renaming and copying a
/// source file into staging.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct UpdateOptions {
    pub overwrite: bool,
    pub move_source: bool,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    pub fn move_source(mut self) -> Self {
        self.move_source = true;
        self
    }
}

/// Stages the next version of an object. Produced either from [`InventoryBuilder`]
/// (the object's first version) or from an existing committed [`Inventory`] (every
/// version after that).
pub struct VersionUpdater {
    base: Inventory,
    new_head: VersionNum,
    manifest: PathBiMap<ContentPath>,
    state: PathBiMap<LogicalPath>,
}

impl VersionUpdater {
    /// Begins staging the first version of a brand new object.
    pub fn for_new_object(base: Inventory) -> Self {
        let new_head = base.head;
        let manifest = base.manifest().clone();
        let state = base.head_version().state().clone();
        Self {
            base,
            new_head,
            manifest,
            state,
        }
    }

    /// Begins staging the next version of an object that already has a committed
    /// HEAD. The new version's state starts as a copy of the previous HEAD's state,
    /// per OCFL's "each version's state carries forward unless changed" semantics.
    pub fn for_next_version(base: Inventory) -> Result<Self> {
        let new_head = base.head.next()?;
        let manifest = base.manifest().clone();
        let state = base.head_version().state().clone();
        Ok(Self {
            base,
            new_head,
            manifest,
            state,
        })
    }

    /// Creates a fresh `VersionUpdater` for a brand new object identified by `object_id`.
    pub fn new_object(object_id: &str) -> Result<Self> {
        Ok(Self::for_new_object(InventoryBuilder::new(object_id).build()?))
    }

    /// Begins staging a mutable HEAD revision on top of `base`, which is either the
    /// object's current committed HEAD (starting the mutable HEAD) or the most recently
    /// committed revision (continuing it, as returned by
    /// [`crate::commit::CommitEngine::commit_mutable_head_revision`]).
    ///
    /// Unlike [`VersionUpdater::for_next_version`], the tentative version number is
    /// pinned at `base.head.next()` the first time and then held fixed across every
    /// following revision -- `base.mutable_head` is what tells the two cases apart,
    /// since a continuing revision's `base` already carries it set. Every revision
    /// therefore replaces the same tentative version in the inventory's `versions` map
    /// rather than appending a new one.
    pub fn for_next_mutable_revision(base: Inventory) -> Result<Self> {
        let new_head = if base.mutable_head { base.head } else { base.head.next()? };
        let mut base = base;
        base.mutable_head = true;
        let manifest = base.manifest().clone();
        let state = base.head_version().state().clone();
        Ok(Self {
            base,
            new_head,
            manifest,
            state,
        })
    }

    /// The version number this updater is staging.
    pub fn version_num(&self) -> VersionNum {
        self.new_head
    }

    /// True if `logical_path` is present in the version being staged.
    pub fn exists(&self, logical_path: &LogicalPath) -> bool {
        self.state.contains_path(logical_path)
    }

    /// Records that `digest` is available at `logical_path` in the version being
    /// staged. If the digest is already known to the object, the existing content is
    /// reused and `Ok(None)` is returned; otherwise a fresh content path is derived,
    /// added to the manifest, and returned so the caller can stage the actual bytes
    /// there.
    pub fn add_file(
        &mut self,
        digest: HexDigest,
        logical_path: LogicalPath,
        options: UpdateOptions,
    ) -> Result<Option<ContentPath>> {
        if self.state.contains_path(&logical_path) && !options.overwrite {
            return Err(OcflError::Overwrite(logical_path.to_string()));
        }

        let digest_rc = match self.manifest.get_id_rc(&digest) {
            Some(existing) => existing.clone(),
            None => Rc::new(digest),
        };

        let new_content_path = if self.manifest.contains_id(&digest_rc) {
            None
        } else {
            let content_path = self.new_content_path(&logical_path)?;
            self.manifest.insert_rc(digest_rc.clone(), Rc::new(content_path.clone()));
            Some(content_path)
        };

        self.state.insert_rc(digest_rc, Rc::new(logical_path));

        Ok(new_content_path)
    }

    /// Removes `logical_path` from the version being staged. If the content it
    /// pointed at was only ever introduced in this version (never referenced by an
    /// earlier one), the manifest entry is dropped along with it.
    pub fn remove_file(&mut self, logical_path: &LogicalPath) -> Result<()> {
        if self.state.remove_path(logical_path).is_none() {
            return Err(OcflError::NotFound(format!(
                "Path {} not found in the version being staged",
                logical_path
            )));
        }

        let content_path = self.new_content_path(logical_path)?;
        if self.manifest.contains_path(&content_path) {
            self.manifest.remove_path(&content_path);
        }

        Ok(())
    }

    /// Renames `src` to `dst` within the version being staged. If `src`'s content was
    /// introduced in this version, its manifest entry is renamed along with it rather
    /// than left pointing at a path that no longer appears in the state; content
    /// introduced in an earlier version is left untouched in the manifest and simply
    /// gains a new logical path.
    pub fn rename_file(&mut self, src: &LogicalPath, dst: LogicalPath, options: UpdateOptions) -> Result<()> {
        if self.state.contains_path(&dst) && !options.overwrite {
            return Err(OcflError::Overwrite(dst.to_string()));
        }

        let digest = self
            .state
            .get_id(src)
            .ok_or_else(|| OcflError::NotFound(format!("Path {} not found in the version being staged", src)))?
            .clone();

        let src_content_path = self.new_content_path(src)?;
        if self.manifest.contains_path(&src_content_path) {
            self.manifest.remove_path(&src_content_path);
            let dst_content_path = self.new_content_path(&dst)?;
            self.manifest.insert_rc(digest.clone(), Rc::new(dst_content_path));
        }

        self.state.remove_path(src);
        self.state.insert_rc(digest, Rc::new(dst));

        Ok(())
    }

    /// Copies the state of `logical_path` as it existed in `version_num` into the
    /// version being staged, under `dst`. Used to undo a deletion or revert an edit
    /// without re-supplying the file's bytes -- the digest is already in the manifest.
    pub fn reinstate_file(
        &mut self,
        version_num: VersionNum,
        src: &LogicalPath,
        dst: LogicalPath,
        options: UpdateOptions,
    ) -> Result<()> {
        if self.state.contains_path(&dst) && !options.overwrite {
            return Err(OcflError::Overwrite(dst.to_string()));
        }

        let source_version = self.base.get_version(version_num)?;
        let digest = source_version
            .lookup_digest(src)
            .ok_or_else(|| {
                OcflError::NotFound(format!("Path {} not found in version {}", src, version_num))
            })?
            .clone();

        if !self.manifest.contains_id(&digest) {
            return Err(OcflError::CorruptObject {
                object_id: self.base.id.clone(),
                message: format!("Digest {} from version {} is no longer present in the manifest", digest, version_num),
            });
        }

        self.state.insert_rc(digest, Rc::new(dst));

        Ok(())
    }

    /// Finishes staging and produces the new `Inventory`. The version's `created`
    /// timestamp is set now; `message` and `user` describe who made the change and why.
    pub fn finalize_update(self, message: Option<String>, user: Option<User>) -> Result<Inventory> {
        let mut version = new_staged_version();
        version.created = Local::now();
        version.message = message;
        version.user = user;
        *version.state_mut() = self.state;

        self.base.with_staged_version(self.new_head, self.manifest, version)
    }

    fn new_content_path(&self, logical_path: &LogicalPath) -> Result<ContentPath> {
        self.base.new_content_path(self.new_head, logical_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(s: &str) -> HexDigest {
        HexDigest::from(s)
    }

    fn path(s: &str) -> LogicalPath {
        s.try_into().unwrap()
    }

    #[test]
    fn add_file_records_a_new_logical_path_and_manifest_entry() {
        let mut updater = VersionUpdater::new_object("urn:test:1").unwrap();
        updater
            .add_file(digest("abc123"), path("data/a.txt"), UpdateOptions::new())
            .unwrap();

        let inventory = updater.finalize_update(Some("add a.txt".to_string()), None).unwrap();
        let head = inventory.head_version();

        assert!(head.is_file(&path("data/a.txt")));
        assert_eq!(&digest("abc123"), head.lookup_digest(&path("data/a.txt")).unwrap().as_ref());
        assert!(inventory.manifest().contains_id(&digest("abc123")));
    }

    #[test]
    fn add_file_without_overwrite_rejects_an_existing_path() {
        let mut updater = VersionUpdater::new_object("urn:test:1").unwrap();
        updater
            .add_file(digest("abc123"), path("data/a.txt"), UpdateOptions::new())
            .unwrap();

        let err = updater.add_file(digest("def456"), path("data/a.txt"), UpdateOptions::new());
        assert!(matches!(err, Err(OcflError::Overwrite(_))));
    }

    #[test]
    fn add_file_with_overwrite_replaces_an_existing_path() {
        let mut updater = VersionUpdater::new_object("urn:test:1").unwrap();
        updater
            .add_file(digest("abc123"), path("data/a.txt"), UpdateOptions::new())
            .unwrap();
        updater
            .add_file(digest("def456"), path("data/a.txt"), UpdateOptions::new().overwrite())
            .unwrap();

        let inventory = updater.finalize_update(None, None).unwrap();
        let head = inventory.head_version();
        assert_eq!(&digest("def456"), head.lookup_digest(&path("data/a.txt")).unwrap().as_ref());
    }

    #[test]
    fn remove_file_drops_path_and_unreferenced_manifest_entry() {
        let mut updater = VersionUpdater::new_object("urn:test:1").unwrap();
        updater
            .add_file(digest("abc123"), path("data/a.txt"), UpdateOptions::new())
            .unwrap();
        updater.remove_file(&path("data/a.txt")).unwrap();

        let inventory = updater.finalize_update(None, None).unwrap();
        assert!(!inventory.head_version().exists(&path("data/a.txt")));
        assert!(!inventory.manifest().contains_id(&digest("abc123")));
    }

    #[test]
    fn rename_file_moves_the_logical_path_and_its_manifest_entry() {
        let mut updater = VersionUpdater::new_object("urn:test:1").unwrap();
        updater
            .add_file(digest("abc123"), path("data/a.txt"), UpdateOptions::new())
            .unwrap();
        updater
            .rename_file(&path("data/a.txt"), path("data/b.txt"), UpdateOptions::new())
            .unwrap();

        let inventory = updater.finalize_update(None, None).unwrap();
        let head = inventory.head_version();
        assert!(!head.exists(&path("data/a.txt")));
        assert!(head.is_file(&path("data/b.txt")));
        assert!(inventory.manifest().contains_path(&inventory.new_content_path(inventory.head, &path("data/b.txt")).unwrap()));
    }

    #[test]
    fn reinstate_file_restores_a_digest_from_an_earlier_version() {
        let mut first = VersionUpdater::new_object("urn:test:1").unwrap();
        first
            .add_file(digest("abc123"), path("data/a.txt"), UpdateOptions::new())
            .unwrap();
        let v1 = first.finalize_update(None, None).unwrap();

        let mut second = VersionUpdater::for_next_version(v1).unwrap();
        second.remove_file(&path("data/a.txt")).unwrap();
        let v2 = second.finalize_update(None, None).unwrap();
        assert!(!v2.head_version().exists(&path("data/a.txt")));

        let mut third = VersionUpdater::for_next_version(v2).unwrap();
        third
            .reinstate_file(VersionNum::new(1), &path("data/a.txt"), path("data/a.txt"), UpdateOptions::new())
            .unwrap();
        let v3 = third.finalize_update(None, None).unwrap();

        assert!(v3.head_version().is_file(&path("data/a.txt")));
        assert_eq!(&digest("abc123"), v3.head_version().lookup_digest(&path("data/a.txt")).unwrap().as_ref());
    }
}
