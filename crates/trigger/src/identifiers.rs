//! Newtype domain identifiers.
//!
//! Every value with an identity is a distinct newtype wrapping a primitive, so
//! a [`BucketName`] can never be passed where an [`ObjectName`] is expected
//! even though both are strings under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macros for String-wrapped newtypes.
// `string_newtype!` generates the struct, as_str() and Display.
// `string_id!` adds new() returning Option<Self> (empty values rejected).
// `metadata_id!` adds new() returning Self (values passed through as given).
// ---------------------------------------------------------------------------
macro_rules! string_newtype {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        string_newtype! { $(#[$attr])* $name }

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }
        }
    };
}

macro_rules! metadata_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        string_newtype! { $(#[$attr])* $name }

        impl $name {
            /// Wraps a metadata value exactly as the uploader supplied it.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: assigned by the storage service
// ---------------------------------------------------------------------------

string_id! {
    /// Opaque CloudEvent `id`. Used for logging and tracing only.
    EventId
}

string_id! {
    /// CloudEvent `type` tag (e.g. `google.cloud.storage.object.v1.finalized`).
    EventType
}

string_id! {
    /// Name of the storage bucket holding the object.
    BucketName
}

string_id! {
    /// Full object name within its bucket, including any `/`-separated prefix.
    ///
    /// Example: `reports/q3.pdf`.
    ObjectName
}

// ---------------------------------------------------------------------------
// Identifiers: supplied by the uploader as custom metadata
//
// Presence of the key is all that is checked; an empty value is forwarded.
// ---------------------------------------------------------------------------

metadata_id! {
    /// Caller-assigned file identifier (`file_id` metadata key).
    FileId
}

metadata_id! {
    /// Search index the processed document is written to (`index` metadata key).
    IndexName
}

metadata_id! {
    /// Identifier of the user who uploaded the object (`user_id` metadata key).
    UserId
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Correlation token for one dispatch attempt.
///
/// Generated fresh for every dispatch; never derived from the event, so a
/// redelivered event produces a different orchestration run with a different
/// token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Generates a new random (v4) transaction identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`TransactionId`] from an existing UUID (e.g. read back from a log).
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_ids_are_rejected() {
        assert!(BucketName::new("").is_none());
        assert!(ObjectName::new("").is_none());
        assert_eq!(
            ObjectName::new("reports/q3.pdf").map(|n| n.to_string()),
            Some("reports/q3.pdf".to_string())
        );
    }

    #[test]
    fn metadata_ids_keep_empty_values() {
        assert_eq!(FileId::new("").as_str(), "");
        assert_eq!(UserId::new("u9").to_string(), "u9");
    }

    #[test]
    fn string_ids_serialise_as_plain_strings() {
        let bucket = BucketName::new("uploads").expect("non-empty");
        assert_eq!(serde_json::to_string(&bucket).unwrap(), "\"uploads\"");
    }

    #[test]
    fn transaction_ids_are_unique_and_v4() {
        let a = TransactionId::new_random();
        let b = TransactionId::new_random();
        assert_ne!(a, b);
        assert_eq!(a.as_uuid().get_version_num(), 4);
        assert_eq!(TransactionId::from_uuid(a.as_uuid()), a);
    }
}
