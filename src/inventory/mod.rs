//! The OCFL inventory: an immutable snapshot of an object's version history.
//!
//! `Inventory` never exposes a way to mutate itself in place. Building a brand new
//! object goes through [`InventoryBuilder`]; adding a version to an existing object
//! goes through [`crate::updater::VersionUpdater`], which produces a new `Inventory`
//! rather than editing one. This keeps "what does the inventory currently say" and
//! "what changes are staged for the next version" from ever being entangled in the
//! same mutable value.

pub mod builder;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::convert::TryInto;
use std::rc::Rc;

use chrono::{DateTime, Local};
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::bimap::PathBiMap;
use crate::consts::{DEFAULT_CONTENT_DIR, MUTABLE_HEAD_EXT_DIR};
use crate::digest::{DigestAlgorithm, HexDigest};
use crate::error::{not_found, OcflError, Result};
use crate::path::{ContentPath, ContentPathVersion, InventoryPath, LogicalPath, VersionNum};

pub use builder::InventoryBuilder;

/// The subset of an inventory's fields that have a direct, uninterpreted JSON
/// representation. Kept separate from [`Inventory`] so that deserializing an
/// inventory never silently depends on ambient state: callers must explicitly
/// pair a `SerializedInventory` with an [`InventoryContext`] via
/// [`Inventory::from_serialized`] to get a usable `Inventory`.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SerializedInventory {
    pub id: String,
    #[serde(rename = "type")]
    pub type_declaration: String,
    pub digest_algorithm: DigestAlgorithm,
    pub head: VersionNum,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixity: Option<HashMap<String, HashMap<String, Vec<String>>>>,
    pub manifest: PathBiMap<ContentPath>,
    pub versions: BTreeMap<VersionNum, SerializedVersion>,
}

/// The information needed to turn a [`SerializedInventory`] into an [`Inventory`]
/// that isn't present in the inventory's own JSON: where the object lives.
#[derive(Debug, Clone)]
pub struct InventoryContext {
    /// Path from the storage root to the object root, using `/` separators.
    pub object_root: String,
    /// Filesystem path to the object root, using the platform separator.
    pub storage_path: String,
    /// True if `head` refers to an in-progress mutable HEAD revision rather than
    /// a committed version directory.
    pub mutable_head: bool,
}

/// An immutable snapshot of an OCFL object's inventory.
#[derive(Debug, Clone)]
pub struct Inventory {
    pub id: String,
    pub type_declaration: String,
    pub digest_algorithm: DigestAlgorithm,
    pub head: VersionNum,
    pub content_directory: Option<String>,
    manifest: PathBiMap<ContentPath>,
    pub versions: BTreeMap<VersionNum, Version>,
    pub fixity: Option<HashMap<String, HashMap<String, Vec<String>>>>,
    pub object_root: String,
    pub storage_path: String,
    pub mutable_head: bool,
}

/// An immutable snapshot of a single OCFL version.
#[derive(Debug, Clone)]
pub struct Version {
    pub created: DateTime<Local>,
    state: PathBiMap<LogicalPath>,
    pub message: Option<String>,
    pub user: Option<User>,
    logical_dirs: OnceCell<HashSet<LogicalPath>>,
}

/// The wire representation of a [`Version`], before it's paired with its version number.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SerializedVersion {
    pub created: DateTime<Local>,
    pub state: PathBiMap<LogicalPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
pub struct User {
    pub name: Option<String>,
    pub address: Option<String>,
}

impl Inventory {
    /// Returns a builder for constructing a brand new object's first version.
    pub fn builder(object_id: &str) -> InventoryBuilder {
        InventoryBuilder::new(object_id)
    }

    /// Combines a parsed inventory body with its storage context, validating that the
    /// result is at least internally consistent (the head version exists).
    pub fn from_serialized(serialized: SerializedInventory, context: InventoryContext) -> Result<Self> {
        let versions = serialized
            .versions
            .into_iter()
            .map(|(num, v)| (num, Version::from_serialized(v)))
            .collect();

        let inventory = Self {
            id: serialized.id,
            type_declaration: serialized.type_declaration,
            digest_algorithm: serialized.digest_algorithm,
            head: serialized.head,
            content_directory: serialized.content_directory,
            manifest: serialized.manifest,
            versions,
            fixity: serialized.fixity,
            object_root: context.object_root,
            storage_path: context.storage_path,
            mutable_head: context.mutable_head,
        };

        inventory.validate()?;

        Ok(inventory)
    }

    /// Splits this inventory back into its JSON-serializable body and its storage
    /// context, the inverse of [`Inventory::from_serialized`].
    pub fn into_serialized(self) -> (SerializedInventory, InventoryContext) {
        let versions = self
            .versions
            .into_iter()
            .map(|(num, v)| (num, v.into_serialized()))
            .collect();

        (
            SerializedInventory {
                id: self.id,
                type_declaration: self.type_declaration,
                digest_algorithm: self.digest_algorithm,
                head: self.head,
                content_directory: self.content_directory,
                manifest: self.manifest,
                versions,
                fixity: self.fixity,
            },
            InventoryContext {
                object_root: self.object_root,
                storage_path: self.storage_path,
                mutable_head: self.mutable_head,
            },
        )
    }

    /// True if this object has never had a version committed beyond its first.
    pub fn is_new(&self) -> bool {
        self.head.number == 1
    }

    /// Returns a reference to the HEAD version.
    pub fn head_version(&self) -> &Version {
        // `validate()` guarantees the head version exists.
        self.versions.get(&self.head).unwrap()
    }

    /// Returns a reference to the specified version, or `NotFound` if it doesn't exist.
    pub fn get_version(&self, version_num: VersionNum) -> Result<&Version> {
        self.versions
            .get(&version_num)
            .ok_or_else(|| not_found(&self.id, Some(version_num)))
    }

    /// Returns a reference to the manifest mapping content paths to digests.
    pub fn manifest(&self) -> &PathBiMap<ContentPath> {
        &self.manifest
    }

    /// True if the given content path exists in the manifest.
    pub fn contains_content_path(&self, content_path: &ContentPath) -> bool {
        self.manifest.contains_path(content_path)
    }

    /// Returns a content path for the given digest. If `version_num` is given, only
    /// content paths introduced in that version or earlier are considered. If
    /// `logical_path` is given and more than one content path matches, the one whose
    /// filename matches `logical_path` is preferred.
    pub fn content_path_for_digest(
        &self,
        digest: &HexDigest,
        version_num: Option<VersionNum>,
        logical_path: Option<&LogicalPath>,
    ) -> Result<&Rc<ContentPath>> {
        let version_num = version_num.unwrap_or(self.head);

        let paths = self.manifest.get_paths(digest).ok_or_else(|| OcflError::CorruptObject {
            object_id: self.id.clone(),
            message: format!("Digest {} not found in manifest", digest),
        })?;

        let mut matches = Vec::new();

        for path in paths {
            let path_version = match path.version {
                ContentPathVersion::MutableHead => self.head,
                ContentPathVersion::VersionNum(v) => v,
            };

            if path_version <= version_num {
                matches.push(path);
            }
        }

        if matches.is_empty() {
            return Err(OcflError::CorruptObject {
                object_id: self.id.clone(),
                message: format!("Digest {} is not mapped to any content paths", digest),
            });
        } else if matches.len() > 1 {
            if let Some(logical_path) = logical_path {
                let suffix = format!("/{}/{}", self.defaulted_content_dir(), logical_path);
                for path in &matches {
                    if path.ends_with(&suffix) {
                        return Ok(path);
                    }
                }
            }
        }

        Ok(matches[0])
    }

    /// Returns the content path that the given logical path resolves to in the
    /// specified (or HEAD) version.
    pub fn content_path_for_logical_path(
        &self,
        logical_path: &LogicalPath,
        version_num: Option<VersionNum>,
    ) -> Result<&Rc<ContentPath>> {
        let version_num = version_num.unwrap_or(self.head);
        let version = self.get_version(version_num)?;

        let digest = version.lookup_digest(logical_path).ok_or_else(|| {
            OcflError::NotFound(format!(
                "Path {} not found in object {} version {}",
                logical_path, self.id, version_num
            ))
        })?;

        self.content_path_for_digest(digest, Some(version_num), Some(logical_path))
    }

    /// Returns the configured content directory name, or the OCFL default if unset.
    pub fn defaulted_content_dir(&self) -> &str {
        match &self.content_directory {
            Some(dir) => dir.as_str(),
            None => DEFAULT_CONTENT_DIR,
        }
    }

    /// Constructs the content path a logical path would map to in the given version,
    /// assuming a direct one-to-one mapping (no dedup against existing content).
    ///
    /// While `mutable_head` is set, every content path routes through the mutable HEAD
    /// extension's namespace regardless of which prospective version number is being
    /// staged: there is no real `vN` directory yet to root a content path under until
    /// the revision is promoted, so `version_num` is only consulted once `mutable_head`
    /// is false.
    pub fn new_content_path(
        &self,
        version_num: VersionNum,
        logical_path: &LogicalPath,
    ) -> Result<ContentPath> {
        if self.mutable_head {
            format!(
                "{}/{}/{}",
                MUTABLE_HEAD_EXT_DIR,
                self.defaulted_content_dir(),
                logical_path.as_str()
            )
            .try_into()
        } else {
            format!(
                "{}/{}/{}",
                version_num,
                self.defaulted_content_dir(),
                logical_path.as_str()
            )
            .try_into()
        }
    }

    /// Builds the inventory that results from staging a new version on top of this
    /// one. Used only by [`crate::updater::VersionUpdater::finalize_update`], which
    /// is the sole place outside this module that needs to assemble an `Inventory`
    /// from parts rather than through [`InventoryBuilder`] or [`Inventory::from_serialized`].
    pub(crate) fn with_staged_version(
        &self,
        new_head: VersionNum,
        manifest: PathBiMap<ContentPath>,
        version: Version,
    ) -> Result<Inventory> {
        let mut versions = self.versions.clone();
        versions.insert(new_head, version);

        let inventory = Self {
            id: self.id.clone(),
            type_declaration: self.type_declaration.clone(),
            digest_algorithm: self.digest_algorithm,
            head: new_head,
            content_directory: self.content_directory.clone(),
            manifest,
            versions,
            fixity: self.fixity.clone(),
            object_root: self.object_root.clone(),
            storage_path: self.storage_path.clone(),
            mutable_head: self.mutable_head,
        };

        inventory.validate()?;

        Ok(inventory)
    }

    /// Builds the inventory that results from promoting a mutable HEAD revision into a
    /// real version directory: same id/head/versions, but `mutable_head` is cleared and
    /// the manifest is replaced with one whose content paths have been rewritten to
    /// point at the newly written `vN` content, by [`crate::commit::CommitEngine`].
    pub(crate) fn promoted(&self, manifest: PathBiMap<ContentPath>) -> Result<Inventory> {
        let inventory = Self {
            manifest,
            mutable_head: false,
            ..self.clone()
        };

        inventory.validate()?;

        Ok(inventory)
    }

    /// A spot check that the inventory is at least internally consistent. This is not
    /// exhaustive; [`crate::validate::inventory`] performs the full checks.
    pub fn validate(&self) -> Result<()> {
        if !self.versions.contains_key(&self.head) {
            return Err(OcflError::CorruptObject {
                object_id: self.id.clone(),
                message: format!("HEAD version {} was not found", self.head),
            });
        }
        Ok(())
    }
}

impl Version {
    fn from_serialized(serialized: SerializedVersion) -> Self {
        Self {
            created: serialized.created,
            state: serialized.state,
            message: serialized.message,
            user: serialized.user,
            logical_dirs: OnceCell::default(),
        }
    }

    fn into_serialized(self) -> SerializedVersion {
        SerializedVersion {
            created: self.created,
            state: self.state,
            message: self.message,
            user: self.user,
        }
    }

    /// Returns a reference to the state map (logical path -> digest).
    pub fn state(&self) -> &PathBiMap<LogicalPath> {
        &self.state
    }

    /// Mutable access to the state map, for [`crate::updater::VersionUpdater`] to
    /// install the version it staged. Resets the cached logical-directory set, since
    /// it's derived from `state` and would otherwise go stale.
    pub(crate) fn state_mut(&mut self) -> &mut PathBiMap<LogicalPath> {
        self.logical_dirs = OnceCell::default();
        &mut self.state
    }

    /// Returns the digest mapped to the given logical path, if any.
    pub fn lookup_digest(&self, logical_path: &LogicalPath) -> Option<&Rc<HexDigest>> {
        self.state.get_id(logical_path)
    }

    /// True if the path exists as either a logical file or a logical directory.
    pub fn exists(&self, path: &LogicalPath) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    /// True if the path exists and is a logical file.
    pub fn is_file(&self, path: &LogicalPath) -> bool {
        self.state.contains_path(path)
    }

    /// True if the path exists and is a logical directory (implied by some deeper file).
    pub fn is_dir(&self, path: &LogicalPath) -> bool {
        self.get_logical_dirs().contains(path)
    }

    fn get_logical_dirs(&self) -> &HashSet<LogicalPath> {
        self.logical_dirs.get_or_init(|| {
            let mut dirs: HashSet<LogicalPath> = HashSet::with_capacity(self.state.len());
            for (path, _) in self.state.iter() {
                let mut parent = path.parent();
                while !parent.is_empty() {
                    let next = parent.parent();
                    dirs.insert(parent);
                    parent = next;
                }
            }
            dirs
        })
    }
}

impl User {
    pub fn new(name: String, address: Option<String>) -> Self {
        Self {
            name: Some(name),
            address,
        }
    }
}
