//! Custom metadata: the authoritative object descriptor and the typed
//! extraction of the keys a dispatch needs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{FileId, IndexName, MissingMetadataKeys, UserId};

/// Caller-attached key/value pairs stored alongside an object.
pub type CustomMetadata = BTreeMap<String, String>;

/// Metadata keys required for a dispatch, in the order they are reported.
pub const REQUIRED_KEYS: [&str; 6] = ["domain", "file_id", "index", "user_id", "referer", "name"];

/// The state of an object re-read from storage at dispatch time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    /// Uploader-supplied metadata. `None` when the object has none at all.
    pub custom_metadata: Option<CustomMetadata>,
}

impl ObjectDescriptor {
    /// Returns the custom metadata, or `None` if it is absent or empty.
    ///
    /// Both cases mean the object was not uploaded for processing.
    pub fn non_empty_metadata(&self) -> Option<&CustomMetadata> {
        self.custom_metadata.as_ref().filter(|m| !m.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Domain tags
// ---------------------------------------------------------------------------

/// Ordered domain tags parsed from the comma-separated `domain` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainTags(Vec<String>);

impl DomainTags {
    /// Splits on `,` and trims surrounding whitespace from each segment.
    ///
    /// Empty segments are kept: `"a, ,b"` yields `["a", "", "b"]`.
    pub fn parse(raw: &str) -> Self {
        Self(raw.split(',').map(|s| s.trim().to_string()).collect())
    }

    /// Returns the tags in order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Encodes the tags as a JSON array string, the form the orchestration
    /// run expects in its `domain` field.
    pub fn to_wire(&self) -> String {
        // Serialising a Vec<String> cannot fail.
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }
}

// ---------------------------------------------------------------------------
// Required metadata
// ---------------------------------------------------------------------------

/// The validated subset of custom metadata needed to dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredMetadata {
    pub domain: DomainTags,
    pub file_id: FileId,
    pub index: IndexName,
    pub user_id: UserId,
    pub referer: String,
    /// Display file name (`name` key), not the object name.
    pub file_name: String,
}

/// Extracts every required key from non-empty custom metadata.
///
/// A key counts as present whenever it exists. Empty values are forwarded
/// unchanged; only absent keys fail.
///
/// # Errors
///
/// Returns [`MissingMetadataKeys`] listing every absent key. No partial value
/// is ever produced.
pub fn extract_required(
    metadata: &CustomMetadata,
) -> Result<RequiredMetadata, MissingMetadataKeys> {
    let get = |key: &str| metadata.get(key).map(String::as_str);

    let domain = get("domain").map(DomainTags::parse);
    let file_id = get("file_id").map(FileId::new);
    let index = get("index").map(IndexName::new);
    let user_id = get("user_id").map(UserId::new);
    let referer = get("referer").map(str::to_string);
    let file_name = get("name").map(str::to_string);

    match (domain, file_id, index, user_id, referer, file_name) {
        (
            Some(domain),
            Some(file_id),
            Some(index),
            Some(user_id),
            Some(referer),
            Some(file_name),
        ) => Ok(RequiredMetadata {
            domain,
            file_id,
            index,
            user_id,
            referer,
            file_name,
        }),
        (domain, file_id, index, user_id, referer, file_name) => {
            let present = [
                domain.is_some(),
                file_id.is_some(),
                index.is_some(),
                user_id.is_some(),
                referer.is_some(),
                file_name.is_some(),
            ];
            let keys = REQUIRED_KEYS
                .iter()
                .zip(present)
                .filter(|(_, present)| !present)
                .map(|(key, _)| *key)
                .collect::<Vec<_>>();
            tracing::debug!(missing = ?keys, "custom metadata incomplete");
            Err(MissingMetadataKeys { keys })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> CustomMetadata {
        [
            ("domain", "finance,ops"),
            ("file_id", "f1"),
            ("index", "idx1"),
            ("user_id", "u9"),
            ("referer", "web"),
            ("name", "Q3 Report"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn extracts_complete_metadata() {
        let required = extract_required(&complete()).unwrap();
        assert_eq!(required.domain.as_slice(), ["finance", "ops"]);
        assert_eq!(required.file_id.as_str(), "f1");
        assert_eq!(required.index.as_str(), "idx1");
        assert_eq!(required.user_id.as_str(), "u9");
        assert_eq!(required.referer, "web");
        assert_eq!(required.file_name, "Q3 Report");
    }

    #[test]
    fn reports_every_missing_key_in_order() {
        let mut metadata = complete();
        metadata.remove("name");
        metadata.remove("file_id");
        metadata.remove("referer");

        let err = extract_required(&metadata).unwrap_err();
        assert_eq!(err.keys, vec!["file_id", "referer", "name"]);
    }

    #[test]
    fn each_single_missing_key_fails() {
        for key in REQUIRED_KEYS {
            let mut metadata = complete();
            metadata.remove(key);
            let err = extract_required(&metadata).unwrap_err();
            assert_eq!(err.keys, vec![key]);
        }
    }

    #[test]
    fn empty_values_are_present_keys() {
        let mut metadata = complete();
        for key in ["file_id", "index", "user_id", "referer", "name"] {
            metadata.insert(key.into(), String::new());
        }

        let required = extract_required(&metadata).unwrap();

        assert_eq!(required.file_id.as_str(), "");
        assert_eq!(required.index.as_str(), "");
        assert_eq!(required.user_id.as_str(), "");
        assert_eq!(required.referer, "");
        assert_eq!(required.file_name, "");
    }

    #[test]
    fn domain_keeps_order_and_empty_segments() {
        assert_eq!(DomainTags::parse("a,b,c").as_slice(), ["a", "b", "c"]);
        assert_eq!(DomainTags::parse("a, ,b").as_slice(), ["a", "", "b"]);
        assert_eq!(DomainTags::parse(" legal ").as_slice(), ["legal"]);
        assert_eq!(DomainTags::parse("").as_slice(), [""]);
    }

    #[test]
    fn domain_wire_form_round_trips() {
        let wire = DomainTags::parse("a,b,c").to_wire();
        assert_eq!(wire, r#"["a","b","c"]"#);
        let decoded: Vec<String> = serde_json::from_str(&wire).unwrap();
        assert_eq!(decoded, ["a", "b", "c"]);
    }

    #[test]
    fn empty_or_absent_metadata_is_not_usable() {
        assert!(ObjectDescriptor::default().non_empty_metadata().is_none());
        let empty = ObjectDescriptor {
            custom_metadata: Some(CustomMetadata::new()),
        };
        assert!(empty.non_empty_metadata().is_none());
        let full = ObjectDescriptor {
            custom_metadata: Some(complete()),
        };
        assert_eq!(full.non_empty_metadata(), Some(&complete()));
    }
}
