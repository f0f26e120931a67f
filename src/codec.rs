//! Turns inventory bytes into [`SerializedInventory`] values and back.
//!
//! Two decoding modes mirror the commit-vs-validate split in the error design: a
//! strict decode that fails outright on any structural problem (used by everything
//! that mutates an object), and a tolerant decode that never fails on a structural
//! problem, instead collecting [`Issue`]s and returning whatever it could make sense
//! of (used only by the object validator).

use serde_json::Value;

use crate::digest::DigestAlgorithm;
use crate::error::Result;
use crate::inventory::SerializedInventory;
use crate::validate::{Issue, IssueCode, Severity};

/// Encodes and decodes the canonical JSON framing of an inventory.
pub trait Codec {
    fn encode(&self, inventory: &SerializedInventory) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<SerializedInventory>;
}

/// The inventory JSON format defined by the OCFL spec: a single canonically-keyed
/// object, keys in `id, type, digestAlgorithm, head, contentDirectory, fixity,
/// manifest, versions` order (spec §6). `serde_json` preserves a struct's field
/// declaration order on serialization, so canonical ordering falls directly out of
/// [`SerializedInventory`]'s field order.
#[derive(Debug, Default, Copy, Clone)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, inventory: &SerializedInventory) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(inventory)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<SerializedInventory> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Result of a tolerant decode: whatever issues were found, plus a best-effort
/// inventory when the top-level shape was recoverable enough to build one.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub inventory: Option<SerializedInventory>,
    pub issues: Vec<Issue>,
}

impl ParseOutcome {
    pub fn is_ok(&self) -> bool {
        self.inventory.is_some() && !self.issues.iter().any(|i| i.severity == Severity::Error)
    }
}

const REQUIRED_TOP_LEVEL: &[&str] = &[
    "id",
    "type",
    "digestAlgorithm",
    "head",
    "manifest",
    "versions",
];

/// Decodes inventory bytes the way the object validator needs: a JSON structural
/// failure becomes one issue rather than an error, and a recoverable top-level
/// object still yields a best-effort inventory even when individual fields are
/// malformed — every malformed or missing field is reported, not just the first.
pub fn decode_tolerant(bytes: &[u8]) -> ParseOutcome {
    let value: Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(e) => {
            return ParseOutcome {
                inventory: None,
                issues: vec![Issue::new(
                    Severity::Error,
                    IssueCode::E033,
                    format!("Inventory could not be parsed as JSON: {}", e),
                )],
            };
        }
    };

    // The common case: the document is well-formed, so the strict decoder applies
    // directly and there's nothing tolerant-specific to do.
    if let Ok(inventory) = serde_json::from_value::<SerializedInventory>(value.clone()) {
        return ParseOutcome {
            inventory: Some(inventory),
            issues: Vec::new(),
        };
    }

    let mut issues = Vec::new();

    let object = match value.as_object() {
        Some(object) => object,
        None => {
            issues.push(Issue::new(
                Severity::Error,
                IssueCode::E033,
                "Inventory root must be a JSON object",
            ));
            return ParseOutcome {
                inventory: None,
                issues,
            };
        }
    };

    for field in REQUIRED_TOP_LEVEL {
        if !object.contains_key(*field) {
            issues.push(Issue::new(
                Severity::Error,
                IssueCode::E033,
                format!("Inventory is missing required field '{}'", field),
            ));
        }
    }

    if let Some(Value::String(algorithm)) = object.get("digestAlgorithm") {
        if algorithm.parse::<DigestAlgorithm>().is_err() {
            issues.push(Issue::new(
                Severity::Error,
                IssueCode::E025,
                format!("Unrecognized digestAlgorithm '{}'", algorithm),
            ));
        }
    }

    let recoverable = issues.is_empty()
        || issues
            .iter()
            .all(|i| i.code != IssueCode::E033 || REQUIRED_TOP_LEVEL.iter().all(|f| object.contains_key(*f)));

    let inventory = if recoverable {
        serde_json::from_value::<SerializedInventory>(value).ok()
    } else {
        None
    };

    if inventory.is_none() && issues.is_empty() {
        issues.push(Issue::new(
            Severity::Error,
            IssueCode::E033,
            "Inventory did not match the expected shape",
        ));
    }

    ParseOutcome { inventory, issues }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Inventory;

    #[test]
    fn strict_round_trip_preserves_fields() {
        let inventory = Inventory::builder("urn:test:1").build().unwrap();
        let (serialized, _) = inventory.into_serialized();

        let codec = JsonCodec;
        let bytes = codec.encode(&serialized).unwrap();
        let decoded = codec.decode(&bytes).unwrap();

        assert_eq!(serialized.id, decoded.id);
        assert_eq!(serialized.head, decoded.head);
    }

    #[test]
    fn tolerant_decode_reports_missing_fields_without_failing() {
        let bytes = br#"{"id": "urn:test:1"}"#;
        let outcome = decode_tolerant(bytes);

        assert!(outcome.inventory.is_none());
        assert!(outcome.issues.len() >= 4);
        assert!(!outcome.is_ok());
    }

    #[test]
    fn tolerant_decode_accepts_well_formed_inventory() {
        let inventory = Inventory::builder("urn:test:1").build().unwrap();
        let (serialized, _) = inventory.into_serialized();
        let bytes = JsonCodec.encode(&serialized).unwrap();

        let outcome = decode_tolerant(&bytes);

        assert!(outcome.is_ok());
        assert_eq!("urn:test:1", outcome.inventory.unwrap().id);
    }

    #[test]
    fn tolerant_decode_flags_unrecognized_digest_algorithm() {
        let bytes = br#"{
            "id": "urn:test:1",
            "type": "https://ocfl.io/1.0/spec/#inventory",
            "digestAlgorithm": "sha999",
            "head": "v1",
            "manifest": {},
            "versions": {
                "v1": {"created": "2021-09-05T20:36:50.923505656-05:00", "state": {}}
            }
        }"#;

        let outcome = decode_tolerant(bytes);
        assert!(outcome
            .issues
            .iter()
            .any(|i| i.code == IssueCode::E025));
    }
}
