use std::collections::BTreeMap;

use chrono::Local;
use once_cell::unsync::OnceCell;

use crate::bimap::PathBiMap;
use crate::consts::{DEFAULT_CONTENT_DIR, INVENTORY_TYPE};
use crate::digest::DigestAlgorithm;
use crate::error::Result;
use crate::path::VersionNum;

use super::{Inventory, User, Version};

const STAGING_MESSAGE: &str = "Staging new version";
const ENGINE_USER: &str = "ocflcore";
const ENGINE_ADDRESS: &str = "https://example.invalid/ocflcore";

/// Builds the inventory for a brand new OCFL object. Not a general-purpose builder:
/// it only knows how to produce the first, empty version of a new object, which a
/// caller then populates through [`crate::updater::VersionUpdater`] before committing.
pub struct InventoryBuilder {
    id: String,
    type_declaration: String,
    digest_algorithm: DigestAlgorithm,
    head: VersionNum,
    content_directory: String,
    manifest: PathBiMap<crate::path::ContentPath>,
    versions: BTreeMap<VersionNum, Version>,
    object_root: String,
    storage_path: String,
}

impl InventoryBuilder {
    pub fn new(object_id: &str) -> Self {
        Self {
            id: object_id.to_string(),
            type_declaration: INVENTORY_TYPE.to_string(),
            digest_algorithm: DigestAlgorithm::Sha512,
            head: VersionNum::with_width(1, 0),
            content_directory: DEFAULT_CONTENT_DIR.to_string(),
            manifest: PathBiMap::new(),
            versions: BTreeMap::new(),
            object_root: String::new(),
            storage_path: String::new(),
        }
    }

    pub fn with_digest_algorithm(mut self, digest_algorithm: DigestAlgorithm) -> Self {
        self.digest_algorithm = digest_algorithm;
        self
    }

    pub fn with_content_directory(mut self, content_directory: &str) -> Self {
        self.content_directory = content_directory.to_string();
        self
    }

    pub fn with_object_root(mut self, object_root: &str, storage_path: &str) -> Self {
        self.object_root = object_root.to_string();
        self.storage_path = storage_path.to_string();
        self
    }

    pub fn build(mut self) -> Result<Inventory> {
        self.versions.insert(self.head, new_staged_version());

        let inventory = Inventory {
            id: self.id,
            type_declaration: self.type_declaration,
            digest_algorithm: self.digest_algorithm,
            head: self.head,
            content_directory: Some(self.content_directory),
            manifest: self.manifest,
            versions: self.versions,
            fixity: None,
            object_root: self.object_root,
            storage_path: self.storage_path,
            mutable_head: false,
        };

        inventory.validate()?;

        Ok(inventory)
    }
}

/// Creates a placeholder version populated with staging metadata, to be overwritten
/// once the commit engine knows the real user/message/timestamp for the version.
pub(crate) fn new_staged_version() -> Version {
    staged_version(PathBiMap::new())
}

fn staged_version(state: PathBiMap<crate::path::LogicalPath>) -> Version {
    Version {
        created: Local::now(),
        message: Some(STAGING_MESSAGE.to_string()),
        user: Some(User {
            name: Some(ENGINE_USER.to_string()),
            address: Some(ENGINE_ADDRESS.to_string()),
        }),
        state,
        logical_dirs: OnceCell::default(),
    }
}
