//! Pure, no-I/O validators over an in-memory [`Inventory`]. Used by the commit
//! engine to refuse malformed state before anything is written to storage.
//!
//! Unlike the object validator, these never tolerate a structural problem: every
//! finding here is surfaced as a single [`OcflError::InvalidInventory`], because a
//! caller that got this far is not expected to recover from a bad inventory — it's
//! a programming error, not an on-disk deviation to report and move past.

use std::collections::HashSet;

use crate::digest::DigestAlgorithm;
use crate::error::{OcflError, Result};
use crate::inventory::{Inventory, Version};
use crate::path::{InventoryPath, VersionNum};

const ALLOWED_DIGEST_ALGORITHMS: &[DigestAlgorithm] = &[DigestAlgorithm::Sha512, DigestAlgorithm::Sha256];

/// id non-blank; head present; type non-blank; digestAlgorithm allowed;
/// contentDirectory well-formed; versions non-empty, contiguous `v1..vHead`, head
/// the max; HEAD version's state references only manifest digests and contains no
/// logical-path conflicts.
pub fn validate_shallow(inventory: &Inventory) -> Result<()> {
    let mut problems = Vec::new();

    if inventory.id.trim().is_empty() {
        problems.push("id must not be blank".to_string());
    }

    if inventory.type_declaration.trim().is_empty() {
        problems.push("type must not be blank".to_string());
    }

    if !ALLOWED_DIGEST_ALGORITHMS.contains(&inventory.digest_algorithm) {
        problems.push(format!(
            "digestAlgorithm must be sha512 or sha256; found {}",
            inventory.digest_algorithm
        ));
    }

    if let Some(content_dir) = &inventory.content_directory {
        if content_dir == "." || content_dir == ".." || content_dir.contains('/') || content_dir.contains('\\') {
            problems.push(format!(
                "contentDirectory must not be '.', '..', or contain a path separator; found {}",
                content_dir
            ));
        }
    }

    if inventory.versions.is_empty() {
        problems.push("versions must not be empty".to_string());
    } else {
        let max_version = inventory.versions.keys().max().copied().unwrap();
        if max_version != inventory.head {
            problems.push(format!(
                "head must equal the highest version present; head is {} but found {}",
                inventory.head, max_version
            ));
        }

        for number in 1..=inventory.head.number {
            let found = inventory
                .versions
                .keys()
                .any(|v| v.number == number);
            if !found {
                problems.push(format!("versions must be contiguous from v1; missing version {}", number));
            }
        }
    }

    if let Some(head_version) = inventory.versions.get(&inventory.head) {
        problems.extend(validate_version_state(inventory, head_version));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(OcflError::InvalidInventory(problems.join("; ")))
    }
}

fn validate_version_state(inventory: &Inventory, version: &Version) -> Vec<String> {
    let mut problems = Vec::new();

    for (path, digest) in version.state().iter() {
        if !inventory.manifest().contains_id(digest) {
            problems.push(format!(
                "version state references digest {} for path {} that is not present in the manifest",
                digest, path
            ));
        }
    }

    let mut paths: Vec<_> = version.state().iter().map(|(path, _)| path.as_str().to_string()).collect();
    paths.sort();

    for window in paths.windows(2) {
        if window[1].starts_with(&window[0]) && window[1].as_bytes().get(window[0].len()) == Some(&b'/') {
            problems.push(format!(
                "logical path {} conflicts with logical path {} (one implies the other is a directory)",
                window[0], window[1]
            ));
        }
    }

    problems
}

/// Shallow, plus every version validated and the fixity block cross-checked
/// against the manifest, and zero-padding width consistent across all version keys.
pub fn validate_deep(inventory: &Inventory) -> Result<()> {
    validate_shallow(inventory)?;

    let mut problems = Vec::new();

    for version in inventory.versions.values() {
        problems.extend(validate_version_state(inventory, version));
    }

    if let Some(width) = inventory.versions.keys().next().map(|v| v.width) {
        for version_num in inventory.versions.keys() {
            if version_num.width != width {
                problems.push(format!(
                    "version identifiers must share one zero-padding width; found both width {} and {}",
                    width, version_num.width
                ));
            }
        }
    }

    if let Some(fixity) = &inventory.fixity {
        for (algorithm, digest_paths) in fixity {
            for paths in digest_paths.values() {
                for path in paths {
                    let in_manifest = inventory
                        .manifest()
                        .iter()
                        .any(|(p, _)| p.as_str() == path);
                    if !in_manifest {
                        problems.push(format!(
                            "fixity[{}] references path {} that is not present in the manifest",
                            algorithm, path
                        ));
                    }
                }
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(OcflError::InvalidInventory(problems.join("; ")))
    }
}

/// Compares a freshly built inventory against the object's previous root inventory,
/// as the final precondition before a commit's atomic install.
pub fn validate_pairwise(current: &Inventory, previous: &Inventory) -> Result<()> {
    let mut problems = Vec::new();

    if current.id != previous.id {
        problems.push(format!(
            "id must not change between commits; was {}, now {}",
            previous.id, current.id
        ));
    }
    if current.type_declaration != previous.type_declaration {
        problems.push("type must not change between commits".to_string());
    }
    if current.digest_algorithm != previous.digest_algorithm {
        problems.push("digestAlgorithm must not change between commits".to_string());
    }
    if current.defaulted_content_dir() != previous.defaulted_content_dir() {
        problems.push("contentDirectory must not change between commits".to_string());
    }

    match previous.head.next() {
        Ok(expected) if expected == current.head => {}
        Ok(expected) => problems.push(format!(
            "head must advance to {}; found {}",
            expected, current.head
        )),
        Err(e) => problems.push(e.to_string()),
    }

    for (version_num, previous_version) in &previous.versions {
        if let Some(current_version) = current.versions.get(version_num) {
            let previous_state: HashSet<_> = previous_version.state().iter().collect();
            let current_state: HashSet<_> = current_version.state().iter().collect();
            if previous_state != current_state {
                problems.push(format!("version {} state must not change between commits", version_num));
            }
        } else {
            problems.push(format!("version {} present in the previous inventory is missing", version_num));
        }
    }

    for (path, digest) in previous.manifest().iter() {
        match current.manifest().get_id(path) {
            Some(current_digest) if current_digest == digest => {}
            Some(_) => problems.push(format!("manifest path {} must keep its previous digest", path)),
            None => problems.push(format!("manifest path {} present previously is missing", path)),
        }
    }

    let head_prefix = format!("{}/", current.head);
    for (path, _) in current.manifest().iter() {
        if !previous.manifest().contains_path(path) && !path.as_str().starts_with(head_prefix.as_str()) {
            problems.push(format!(
                "new manifest path {} must be rooted under {}",
                path, head_prefix
            ));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(OcflError::InvalidInventory(problems.join("; ")))
    }
}
