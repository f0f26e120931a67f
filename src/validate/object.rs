//! Validates an on-disk OCFL object against its own inventories, independent of
//! whatever wrote it. Every check below accumulates into a [`ValidationResults`]
//! rather than raising — a malformed object is expected input here, not a bug.

use std::collections::HashSet;
use std::convert::TryInto;
use std::io::Cursor;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::codec::decode_tolerant;
use crate::consts::{
    EXTENSIONS_DIR, INVENTORY_FILE, INVENTORY_SIDECAR_PREFIX, INVENTORY_TYPE,
    MUTABLE_HEAD_EXTENSION_NAME, OBJECT_NAMASTE_CONTENTS, OBJECT_NAMASTE_FILE, RESERVED_ROOT_ENTRIES,
};
use crate::digest::{DigestAlgorithm, HexDigest};
use crate::inventory::{Inventory, InventoryContext};
use crate::layout::LayoutExtensionName;
use crate::path::{ContentPath, InventoryPath, VersionNum};
use crate::storage::{Listing, Storage};
use crate::validate::{IssueCode, ValidationResults};

static SIDECAR_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[\t ]+"#).unwrap());

/// Validates an object rooted at a path within a [`Storage`] backend.
pub struct ObjectValidator<S: Storage> {
    storage: S,
}

impl<S: Storage> ObjectValidator<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Runs the full validation sequence against the object at `object_root`.
    /// `fixity_check` controls whether every fixity-declared digest is recomputed
    /// from disk, which requires reading the object's full content.
    pub fn validate(&self, object_id: &str, object_root: &str, fixity_check: bool) -> ValidationResults {
        let mut results = ValidationResults::with_id(object_id);

        self.validate_namaste(object_root, &mut results);

        let root_listing = match self.storage.list(object_root, false) {
            Ok(listing) => listing,
            Err(_) => {
                results.error(IssueCode::E063, "Object root could not be listed");
                return results;
            }
        };

        let root_inventory = self.validate_root_inventory(object_id, object_root, &root_listing, &mut results);

        let version_dirs = self.version_directories(&root_listing);
        self.validate_root_entries(&root_listing, &version_dirs, &mut results);

        if let Some(inventory) = &root_inventory {
            self.validate_version_set(inventory, &version_dirs, &mut results);

            let mut versions: Vec<VersionNum> = inventory.versions.keys().copied().collect();
            versions.sort_by(|a, b| b.number.cmp(&a.number));

            for version_num in versions {
                self.validate_version_directory(object_root, version_num, inventory, &mut results);
            }

            self.validate_manifest_cross_check(object_root, inventory, &mut results);

            if fixity_check {
                self.validate_fixity(object_root, inventory, &mut results);
            }
        }

        self.validate_extensions(object_root, &root_listing, &mut results);

        results
    }

    fn validate_namaste(&self, object_root: &str, results: &mut ValidationResults) {
        let path = format!("{}/{}", object_root, OBJECT_NAMASTE_FILE);

        match self.storage.exists(&path) {
            Ok(true) => {
                let mut bytes = Vec::new();
                if self.storage.read(&path, &mut bytes).is_ok() {
                    match String::from_utf8(bytes) {
                        Ok(contents) if contents == OBJECT_NAMASTE_CONTENTS => {}
                        Ok(contents) => results.error(
                            IssueCode::E007,
                            format!(
                                "Object version declaration must contain '{}'; found '{}'",
                                OBJECT_NAMASTE_CONTENTS.trim_end(),
                                contents.trim_end()
                            ),
                        ),
                        Err(_) => {
                            results.error(IssueCode::E007, "Object version declaration is not valid UTF-8")
                        }
                    }
                }
            }
            _ => results.error(
                IssueCode::E003,
                format!("Object version declaration {} does not exist", OBJECT_NAMASTE_FILE),
            ),
        }
    }

    fn validate_root_inventory(
        &self,
        object_id: &str,
        object_root: &str,
        root_listing: &[Listing],
        results: &mut ValidationResults,
    ) -> Option<Inventory> {
        if !contains_file(root_listing, INVENTORY_FILE) {
            results.error(IssueCode::E063, "Root inventory.json does not exist");
            return None;
        }

        let inventory_path = format!("{}/{}", object_root, INVENTORY_FILE);
        let mut bytes = Vec::new();
        if self.storage.read(&inventory_path, &mut bytes).is_err() {
            results.error(IssueCode::E063, "Root inventory.json could not be read");
            return None;
        }

        let outcome = decode_tolerant(&bytes);
        for issue in outcome.issues {
            results.push(issue);
        }

        let serialized = outcome.inventory?;

        if serialized.type_declaration != INVENTORY_TYPE {
            results.error(
                IssueCode::E034,
                format!(
                    "Inventory field 'type' must equal '{}'; found '{}'",
                    INVENTORY_TYPE, serialized.type_declaration
                ),
            );
        }

        if object_id != serialized.id {
            results.error(
                IssueCode::E041,
                format!("Inventory id must be '{}'; found '{}'", object_id, serialized.id),
            );
        }

        let digest_algorithm = serialized.digest_algorithm;

        let context = InventoryContext {
            object_root: object_root.to_string(),
            storage_path: object_root.to_string(),
            mutable_head: false,
        };

        let inventory = match Inventory::from_serialized(serialized, context) {
            Ok(inventory) => inventory,
            Err(e) => {
                results.error(IssueCode::E033, format!("Root inventory is structurally invalid: {}", e));
                return None;
            }
        };

        let sidecar_name = format!("{}{}", INVENTORY_SIDECAR_PREFIX, digest_algorithm);
        if !contains_file(root_listing, &sidecar_name) {
            results.error(
                IssueCode::E058,
                format!("Inventory sidecar {} does not exist", sidecar_name),
            );
        } else if let Ok(digest) = digest_algorithm.hash_hex(&mut Cursor::new(&bytes)) {
            self.validate_sidecar(object_root, &sidecar_name, &digest, None, results);
        }

        Some(inventory)
    }

    fn validate_sidecar(
        &self,
        object_root: &str,
        sidecar_name: &str,
        digest: &HexDigest,
        version_num: Option<VersionNum>,
        results: &mut ValidationResults,
    ) {
        let path = format!("{}/{}", object_root, sidecar_name);
        let mut bytes = Vec::new();
        if self.storage.read(&path, &mut bytes).is_err() {
            push(results, version_num, IssueCode::E061, "Inventory sidecar could not be read");
            return;
        }

        match String::from_utf8(bytes) {
            Ok(contents) => {
                let parts: Vec<&str> = SIDECAR_SPLIT.split(contents.trim()).collect();
                if parts.len() != 2 || parts[1] != INVENTORY_FILE {
                    push(results, version_num, IssueCode::E061, "Inventory sidecar is malformed");
                } else {
                    let expected = HexDigest::from(parts[0]);
                    if expected != *digest {
                        push(
                            results,
                            version_num,
                            IssueCode::E060,
                            format!(
                                "Inventory does not match its sidecar digest. Expected: {}; computed: {}",
                                expected, digest
                            ),
                        );
                    }
                }
            }
            Err(_) => push(results, version_num, IssueCode::E061, "Inventory sidecar is not valid UTF-8"),
        }
    }

    fn version_directories(&self, root_listing: &[Listing]) -> Vec<VersionNum> {
        root_listing
            .iter()
            .filter_map(|entry| match entry {
                Listing::Directory(name) => VersionNum::from_str(name).ok(),
                _ => None,
            })
            .collect()
    }

    fn validate_root_entries(
        &self,
        root_listing: &[Listing],
        version_dirs: &[VersionNum],
        results: &mut ValidationResults,
    ) {
        for entry in root_listing {
            let name = entry.path();

            if RESERVED_ROOT_ENTRIES.contains(&name) {
                continue;
            }
            if name.starts_with(INVENTORY_SIDECAR_PREFIX) {
                continue;
            }
            if version_dirs.iter().any(|v| v.to_string() == name) {
                continue;
            }

            results.warn(IssueCode::W001, format!("Unexpected entry in object root: {}", name));
        }
    }

    fn validate_version_set(&self, inventory: &Inventory, version_dirs: &[VersionNum], results: &mut ValidationResults) {
        let on_disk: HashSet<u32> = version_dirs.iter().map(|v| v.number).collect();
        let in_inventory: HashSet<u32> = inventory.versions.keys().map(|v| v.number).collect();

        for missing in in_inventory.difference(&on_disk) {
            results.error(
                IssueCode::E037,
                format!("Version v{} is listed in the inventory but its directory is missing", missing),
            );
        }

        for extra in on_disk.difference(&in_inventory) {
            results.error(
                IssueCode::E037,
                format!("Version directory v{} exists but is not listed in the inventory", extra),
            );
        }
    }

    fn validate_version_directory(
        &self,
        object_root: &str,
        version_num: VersionNum,
        root_inventory: &Inventory,
        results: &mut ValidationResults,
    ) {
        let dir = format!("{}/{}", object_root, version_num);
        let inventory_path = format!("{}/{}", dir, INVENTORY_FILE);

        match self.storage.exists(&inventory_path) {
            Ok(true) => {}
            _ => {
                results.error_version(
                    version_num.to_string(),
                    IssueCode::E063,
                    "Version inventory.json does not exist",
                );
                return;
            }
        }

        let mut bytes = Vec::new();
        if self.storage.read(&inventory_path, &mut bytes).is_err() {
            results.error_version(version_num.to_string(), IssueCode::E063, "Version inventory.json could not be read");
            return;
        }

        let outcome = decode_tolerant(&bytes);
        for mut issue in outcome.issues {
            issue.version_num.get_or_insert_with(|| version_num.to_string());
            results.push(issue);
        }

        let serialized = match outcome.inventory {
            Some(serialized) => serialized,
            None => return,
        };

        if serialized.head != version_num {
            results.error_version(
                version_num.to_string(),
                IssueCode::E064,
                format!(
                    "Version inventory's head must equal {}; found {}",
                    version_num, serialized.head
                ),
            );
        }

        let digest_algorithm = serialized.digest_algorithm;

        let context = InventoryContext {
            object_root: object_root.to_string(),
            storage_path: object_root.to_string(),
            mutable_head: false,
        };

        let version_inventory = match Inventory::from_serialized(serialized, context) {
            Ok(inventory) => inventory,
            Err(e) => {
                results.error_version(
                    version_num.to_string(),
                    IssueCode::E033,
                    format!("Version inventory is structurally invalid: {}", e),
                );
                return;
            }
        };

        let sidecar_name = format!("{}{}", INVENTORY_SIDECAR_PREFIX, digest_algorithm);
        match self.storage.exists(&format!("{}/{}", dir, sidecar_name)) {
            Ok(true) => {
                if let Ok(digest) = digest_algorithm.hash_hex(&mut Cursor::new(&bytes)) {
                    self.validate_sidecar(&dir, &sidecar_name, &digest, Some(version_num), results);
                }
            }
            _ => results.error_version(
                version_num.to_string(),
                IssueCode::E058,
                format!("Inventory sidecar {} does not exist", sidecar_name),
            ),
        }

        if let Some(root_version) = root_inventory.versions.get(&version_num) {
            if let Some(recorded_version) = version_inventory.versions.get(&version_num) {
                let from_root: HashSet<_> = root_version.state().iter().collect();
                let from_version: HashSet<_> = recorded_version.state().iter().collect();
                if from_root != from_version {
                    results.error_version(
                        version_num.to_string(),
                        IssueCode::E049,
                        "Version's state does not agree with the root inventory's record of it",
                    );
                }
            }
        }
    }

    fn validate_manifest_cross_check(&self, object_root: &str, inventory: &Inventory, results: &mut ValidationResults) {
        for (path, _digest) in inventory.manifest().iter() {
            let full = format!("{}/{}", object_root, path.as_str());
            match self.storage.exists(&full) {
                Ok(true) => {}
                _ => results.error(
                    IssueCode::E066,
                    format!("Manifest entry {} does not exist on disk", path),
                ),
            }
        }

        let referenced: HashSet<_> = inventory
            .versions
            .values()
            .flat_map(|version| version.state().iter_id_paths().map(|(digest, _)| digest.as_ref()))
            .collect();

        for (digest, paths) in inventory.manifest().iter_id_paths() {
            if !referenced.contains(digest.as_ref()) {
                results.error(
                    IssueCode::E092,
                    format!(
                        "Manifest digest {} is not referenced by any version's state (paths: {})",
                        digest,
                        paths.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(", ")
                    ),
                );
            }
        }

        for version_num in inventory.versions.keys() {
            let content_dir = format!(
                "{}/{}/{}",
                object_root, version_num, inventory.defaulted_content_dir()
            );

            let listing = match self.storage.list(&content_dir, true) {
                Ok(listing) => listing,
                Err(_) => continue,
            };

            for entry in listing {
                if let Listing::File(relative) = entry {
                    let content_path_str = format!(
                        "{}/{}/{}",
                        version_num,
                        inventory.defaulted_content_dir(),
                        relative
                    );

                    let referenced = content_path_str
                        .as_str()
                        .try_into()
                        .map(|cp: ContentPath| inventory.contains_content_path(&cp))
                        .unwrap_or(false);

                    if !referenced {
                        results.error_version(
                            version_num.to_string(),
                            IssueCode::E067,
                            format!("Content file {} is not referenced by the manifest", content_path_str),
                        );
                    }
                }
            }
        }
    }

    fn validate_fixity(&self, object_root: &str, inventory: &Inventory, results: &mut ValidationResults) {
        let fixity = match &inventory.fixity {
            Some(fixity) => fixity,
            None => return,
        };

        for (algorithm_name, digest_paths) in fixity {
            let algorithm = match algorithm_name.parse::<DigestAlgorithm>() {
                Ok(algorithm) => algorithm,
                Err(_) => {
                    results.warn(
                        IssueCode::W009,
                        format!("Fixity block names an unrecognized digest algorithm: {}", algorithm_name),
                    );
                    continue;
                }
            };

            for (expected_digest, paths) in digest_paths {
                for path in paths {
                    let full = format!("{}/{}", object_root, path);
                    let mut bytes = Vec::new();

                    if self.storage.read(&full, &mut bytes).is_err() {
                        results.error(
                            IssueCode::E069,
                            format!("Fixity entry for {} could not be read from disk", path),
                        );
                        continue;
                    }

                    match algorithm.hash_hex(&mut Cursor::new(&bytes)) {
                        Ok(computed) if computed == HexDigest::from(expected_digest.as_str()) => {}
                        _ => results.error(
                            IssueCode::E069,
                            format!("Fixity mismatch for {} using {}", path, algorithm),
                        ),
                    }
                }
            }
        }
    }

    fn validate_extensions(&self, object_root: &str, root_listing: &[Listing], results: &mut ValidationResults) {
        let has_extensions_dir = root_listing
            .iter()
            .any(|entry| matches!(entry, Listing::Directory(name) if name.as_ref() == EXTENSIONS_DIR));

        if !has_extensions_dir {
            return;
        }

        let extensions_path = format!("{}/{}", object_root, EXTENSIONS_DIR);
        let listing = match self.storage.list(&extensions_path, false) {
            Ok(listing) => listing,
            Err(_) => return,
        };

        for entry in listing {
            let name = match &entry {
                Listing::Directory(name) => name.as_ref(),
                _ => {
                    results.warn(IssueCode::W013, format!("Unexpected file directly inside {}", EXTENSIONS_DIR));
                    continue;
                }
            };

            if name == MUTABLE_HEAD_EXTENSION_NAME {
                continue;
            }

            if name.parse::<LayoutExtensionName>().is_err() {
                results.warn(
                    IssueCode::W009,
                    format!("Extension {} is not recognized by this validator", name),
                );
            }
        }
    }
}

fn contains_file(listing: &[Listing], name: &str) -> bool {
    listing.iter().any(|entry| matches!(entry, Listing::File(file) if file.as_ref() == name))
}

fn push(results: &mut ValidationResults, version_num: Option<VersionNum>, code: IssueCode, message: impl Into<String>) {
    match version_num {
        Some(version_num) => results.error_version(version_num.to_string(), code, message),
        None => results.error(code, message),
    }
}
