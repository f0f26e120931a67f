//! Installs a staged [`Inventory`] (from [`crate::updater::VersionUpdater::finalize_update`])
//! as durable, on-disk object state.
//!
//! Two protocols: [`CommitEngine::commit`] writes a new immutable version directory;
//! [`CommitEngine::commit_mutable_head_revision`], [`CommitEngine::promote_mutable_head`], and
//! [`CommitEngine::purge_mutable_head`] manage the 0005-mutable-head extension's staging area.
//! Content bytes themselves are expected to already be in place -- written by
//! [`crate::addfile::AddFileProcessor`] directly to the content paths [`Inventory::new_content_path`]
//! derives -- so this module's job is strictly the inventory-level bookkeeping: validating,
//! verifying, serializing, and making the result visible atomically.

use std::collections::HashMap;
use std::io;
use std::rc::Rc;

use crate::codec::{Codec, JsonCodec};
use crate::consts::{
    INVENTORY_FILE, INVENTORY_SIDECAR_PREFIX, MUTABLE_HEAD_EXT_DIR, OBJECT_NAMASTE_CONTENTS,
    OBJECT_NAMASTE_FILE,
};
use crate::digest::{DigestAlgorithm, MultiDigestWriter};
use crate::error::{OcflError, Result};
use crate::inventory::Inventory;
use crate::path::{ContentPath, ContentPathVersion, InventoryPath, VersionNum};
use crate::storage::Storage;
use crate::validate::inventory::{validate_pairwise, validate_shallow};

/// Installs staged inventories. `storage` is scoped to a single object's root directory
/// (paths like `v1/content/...`, `inventory.json`, `0=ocfl_object_1.0`), matching the
/// scoping every other module in this crate uses.
pub struct CommitEngine<'a, S: Storage> {
    storage: &'a S,
    codec: JsonCodec,
    fixity_algorithms: Vec<DigestAlgorithm>,
    verify_digests: bool,
}

impl<'a, S: Storage> CommitEngine<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self {
            storage,
            codec: JsonCodec,
            fixity_algorithms: Vec::new(),
            verify_digests: false,
        }
    }

    /// Configures secondary digest algorithms to compute over every newly written
    /// content path and record in the inventory's `fixity` block.
    pub fn with_fixity_algorithms(mut self, algorithms: Vec<DigestAlgorithm>) -> Self {
        self.fixity_algorithms = algorithms;
        self
    }

    /// Re-reads every newly written content path and cross-checks it against the
    /// digest recorded in the manifest, aborting the commit with `FixityMismatch` on
    /// any disagreement.
    pub fn with_digest_verification(mut self) -> Self {
        self.verify_digests = true;
        self
    }

    /// Commits `new_inventory` as the object's next version. `previous` is the object's
    /// current root inventory, or `None` when this is a brand new object's first version.
    pub fn commit(&self, mut new_inventory: Inventory, previous: Option<&Inventory>) -> Result<Inventory> {
        validate_shallow(&new_inventory)?;

        match previous {
            None => self.commit_new_object(&mut new_inventory)?,
            Some(previous) => self.commit_next_version(&mut new_inventory, previous)?,
        }

        Ok(new_inventory)
    }

    fn commit_new_object(&self, new_inventory: &mut Inventory) -> Result<()> {
        if self.storage.exists(OBJECT_NAMASTE_FILE)? {
            return Err(OcflError::Overwrite(new_inventory.object_root.clone()));
        }

        self.storage
            .write(OBJECT_NAMASTE_FILE, &mut OBJECT_NAMASTE_CONTENTS.as_bytes())?;

        let new_paths = Self::all_content_paths(new_inventory);
        self.verify_and_compute_fixity(new_inventory, &new_paths)?;

        let version_dir = new_inventory.head.to_string();
        self.write_inventory(new_inventory, &version_dir)?;
        self.write_inventory(new_inventory, "")?;

        Ok(())
    }

    fn commit_next_version(&self, new_inventory: &mut Inventory, previous: &Inventory) -> Result<()> {
        self.assert_not_concurrently_modified(previous)?;
        validate_pairwise(new_inventory, previous)?;

        let version_dir = new_inventory.head.to_string();
        if self.storage.exists(&format!("{}/{}", version_dir, INVENTORY_FILE))? {
            return Err(OcflError::ObjectOutOfSync {
                object_id: new_inventory.id.clone(),
            });
        }

        let new_paths = Self::new_content_paths(new_inventory, previous);
        self.verify_and_compute_fixity(new_inventory, &new_paths)?;

        self.write_inventory(new_inventory, &version_dir)?;
        self.write_inventory(new_inventory, "")?;
        self.delete_stale_sidecars(new_inventory)?;

        Ok(())
    }

    /// Reloads the on-disk root inventory and asserts its head is still `previous`'s --
    /// the concurrency guard spec §4.5 requires before a commit's atomic install.
    fn assert_not_concurrently_modified(&self, previous: &Inventory) -> Result<()> {
        let mut bytes = Vec::new();
        self.storage.read(INVENTORY_FILE, &mut bytes)?;
        let on_disk = self.codec.decode(&bytes)?;

        if on_disk.head != previous.head {
            return Err(OcflError::ObjectOutOfSync {
                object_id: previous.id.clone(),
            });
        }

        Ok(())
    }

    fn write_inventory(&self, inventory: &Inventory, dir: &str) -> Result<()> {
        let serialized = inventory.clone().into_serialized().0;
        let bytes = self.codec.encode(&serialized)?;
        let digest = inventory.digest_algorithm.hash_hex(&mut bytes.as_slice())?;

        let inventory_path = join(dir, INVENTORY_FILE);
        let sidecar_path = join(dir, &format!("{}.{}", INVENTORY_FILE, inventory.digest_algorithm));
        let sidecar_contents = format!("{}  {}\n", digest, INVENTORY_FILE);

        self.storage.write(&inventory_path, &mut bytes.as_slice())?;
        self.storage.write(&sidecar_path, &mut sidecar_contents.as_bytes())?;

        Ok(())
    }

    fn delete_stale_sidecars(&self, inventory: &Inventory) -> Result<()> {
        let current = format!("{}.{}", INVENTORY_FILE, inventory.digest_algorithm);

        for listing in self.storage.list("", false)? {
            let path = listing.path();
            if path.starts_with(INVENTORY_SIDECAR_PREFIX) && path != current {
                self.storage.delete(path)?;
            }
        }

        Ok(())
    }

    fn all_content_paths(inventory: &Inventory) -> Vec<Rc<ContentPath>> {
        inventory.manifest().iter().map(|(path, _)| path.clone()).collect()
    }

    fn new_content_paths(inventory: &Inventory, previous: &Inventory) -> Vec<Rc<ContentPath>> {
        inventory
            .manifest()
            .iter()
            .filter(|(path, _)| !previous.manifest().contains_path(path))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Streams each of `new_paths` back out of storage, computing every configured
    /// fixity algorithm (and, if enabled, re-verifying the primary digest) in one pass,
    /// without ever buffering a whole file.
    fn verify_and_compute_fixity(&self, inventory: &mut Inventory, new_paths: &[Rc<ContentPath>]) -> Result<()> {
        if new_paths.is_empty() || (self.fixity_algorithms.is_empty() && !self.verify_digests) {
            return Ok(());
        }

        let mut algorithms = self.fixity_algorithms.clone();
        if self.verify_digests && !algorithms.contains(&inventory.digest_algorithm) {
            algorithms.push(inventory.digest_algorithm);
        }

        let mut fixity: HashMap<String, HashMap<String, Vec<String>>> = inventory.fixity.take().unwrap_or_default();

        for content_path in new_paths {
            let expected = inventory
                .manifest()
                .get_id(content_path)
                .ok_or_else(|| OcflError::CorruptObject {
                    object_id: inventory.id.clone(),
                    message: format!("Content path {} is not present in the manifest", content_path),
                })?
                .clone();

            let mut writer = MultiDigestWriter::new(&algorithms, io::sink());
            self.storage.read(content_path.as_str(), &mut writer)?;
            let computed = writer.finalize_hex();

            if self.verify_digests {
                let actual = computed.get(&inventory.digest_algorithm).unwrap();
                if actual != expected.as_ref() {
                    return Err(OcflError::FixityMismatch {
                        path: content_path.to_string(),
                        expected: expected.to_string(),
                        actual: actual.to_string(),
                    });
                }
            }

            for algorithm in &self.fixity_algorithms {
                let digest = computed.get(algorithm).unwrap();
                fixity
                    .entry(algorithm.to_string())
                    .or_default()
                    .entry(digest.to_string())
                    .or_default()
                    .push(content_path.to_string());
            }
        }

        if !fixity.is_empty() {
            inventory.fixity = Some(fixity);
        }

        Ok(())
    }

    /// Writes a new revision into the mutable HEAD subtree. `new_inventory` must be
    /// staged with `mutable_head` set and `head` holding the tentative next version
    /// number; the object's real root inventory is left untouched, since a mutable
    /// HEAD revision never advances the public head.
    pub fn commit_mutable_head_revision(&self, mut new_inventory: Inventory, previous: &Inventory) -> Result<Inventory> {
        if !new_inventory.mutable_head {
            return Err(OcflError::InvalidInput(
                "Cannot commit a mutable HEAD revision for an inventory that isn't staged as one".to_string(),
            ));
        }

        validate_shallow(&new_inventory)?;

        let new_paths = Self::new_content_paths(&new_inventory, previous);
        self.verify_and_compute_fixity(&mut new_inventory, &new_paths)?;

        let next_revision = self.next_revision_number()?;
        let revision_dir = format!("{}/revisions/r{}", MUTABLE_HEAD_EXT_DIR, next_revision);

        self.write_inventory(&new_inventory, MUTABLE_HEAD_EXT_DIR)?;
        self.write_inventory(&new_inventory, &revision_dir)?;

        Ok(new_inventory)
    }

    /// Moves the mutable HEAD's accumulated content into a real version directory and
    /// runs it through the standard commit protocol, then deletes the mutable HEAD
    /// subtree. `mutable_inventory` is the most recently committed revision (as
    /// returned by [`CommitEngine::commit_mutable_head_revision`]).
    pub fn promote_mutable_head(&self, mutable_inventory: Inventory, previous: &Inventory) -> Result<Inventory> {
        if !mutable_inventory.mutable_head {
            return Err(OcflError::InvalidInput(
                "Cannot promote an inventory that isn't tracking a mutable HEAD".to_string(),
            ));
        }

        let new_head = mutable_inventory.head;
        let content_dir = mutable_inventory.defaulted_content_dir().to_string();
        let mut manifest = mutable_inventory.manifest().clone();

        for (path, _) in mutable_inventory.manifest().iter() {
            if path.version != ContentPathVersion::MutableHead {
                continue;
            }

            let needle = format!("/{}/", content_dir);
            let suffix = path
                .as_str()
                .rsplit_once(needle.as_str())
                .map(|(_, suffix)| suffix)
                .ok_or_else(|| OcflError::CorruptObject {
                    object_id: mutable_inventory.id.clone(),
                    message: format!("Mutable HEAD content path {} has an unexpected shape", path),
                })?;

            let new_path: ContentPath = format!("{}/{}/{}", new_head, content_dir, suffix).try_into()?;

            self.storage.mv(path.as_str(), new_path.as_str())?;

            let digest = manifest.get_id(path).unwrap().clone();
            manifest.remove_path(path);
            manifest.insert_rc(digest, Rc::new(new_path));
        }

        let promoted = mutable_inventory.promoted(manifest)?;
        let promoted = self.commit(promoted, Some(previous))?;

        self.storage.delete_dir(MUTABLE_HEAD_EXT_DIR)?;

        Ok(promoted)
    }

    /// Deletes the mutable HEAD subtree without promoting it, discarding every
    /// uncommitted revision.
    pub fn purge_mutable_head(&self) -> Result<()> {
        self.storage.delete_dir(MUTABLE_HEAD_EXT_DIR)
    }

    fn next_revision_number(&self) -> Result<u32> {
        let revisions_dir = format!("{}/revisions", MUTABLE_HEAD_EXT_DIR);
        let mut max = 0;

        for listing in self.storage.list(&revisions_dir, false)? {
            if let Some(number) = listing.path().strip_prefix('r').and_then(|n| n.parse::<u32>().ok()) {
                max = max.max(number);
            }
        }

        Ok(max + 1)
    }
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}
