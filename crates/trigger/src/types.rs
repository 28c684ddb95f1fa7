//! Event value types.
//!
//! [`IncomingEvent`] is built once per invocation from the CloudEvent
//! attributes and the storage object body; [`EventSummary`] is what every
//! non-error path hands back to the caller.

use serde::{Deserialize, Serialize, Serializer};

use crate::{BucketName, EventId, EventType, ObjectName, TransactionId, UploaderError};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// An object timestamp (`timeCreated`, `updated`) exactly as delivered.
///
/// Never parsed: the value is echoed back in the result tuple and in logs
/// byte-for-byte, whatever format the storage service used.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    /// Wraps a timestamp string, returning `None` if it is empty.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let v = value.into();
        if v.is_empty() {
            None
        } else {
            Some(Self(v))
        }
    }

    /// Returns the timestamp as received.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Metageneration
// ---------------------------------------------------------------------------

/// Object metageneration as delivered by the storage service.
///
/// Cloud Storage CloudEvents carry it as a decimal string; older notification
/// formats use a JSON number. Both are accepted and passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metageneration {
    /// JSON number form.
    Number(i64),
    /// JSON string form.
    Text(String),
}

impl std::fmt::Display for Metageneration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound event
// ---------------------------------------------------------------------------

/// The `data` body of a storage object CloudEvent.
///
/// Fields are optional here so that absence can be reported by name through
/// [`IncomingEvent::from_cloud_event`]; any other object fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageObjectData {
    /// Bucket holding the object.
    pub bucket: Option<String>,
    /// Object name.
    pub name: Option<String>,
    /// Metadata generation of the object.
    pub metageneration: Option<Metageneration>,
    /// Creation time, unparsed.
    pub time_created: Option<String>,
    /// Last update time, unparsed.
    pub updated: Option<String>,
}

/// One storage-change notification, validated for field presence.
///
/// Read-only for the rest of the invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingEvent {
    /// CloudEvent `id`.
    pub event_id: EventId,
    /// CloudEvent `type`.
    pub event_type: EventType,
    /// Bucket holding the object.
    pub bucket: BucketName,
    /// Object name within the bucket.
    pub object_name: ObjectName,
    /// Metadata generation at notification time.
    pub metageneration: Metageneration,
    /// Object creation time.
    pub created_at: Timestamp,
    /// Object last-update time.
    pub updated_at: Timestamp,
}

impl IncomingEvent {
    /// Builds an event from CloudEvent attributes and the object body.
    ///
    /// Empty strings count as absent.
    ///
    /// # Errors
    ///
    /// Returns [`UploaderError::MalformedEvent`] naming the first absent field.
    pub fn from_cloud_event(
        id: Option<&str>,
        event_type: Option<&str>,
        data: StorageObjectData,
    ) -> Result<Self, UploaderError> {
        fn missing(field: &str) -> UploaderError {
            UploaderError::malformed(format!("missing required field `{field}`"))
        }

        Ok(Self {
            event_id: id.and_then(EventId::new).ok_or_else(|| missing("id"))?,
            event_type: event_type
                .and_then(EventType::new)
                .ok_or_else(|| missing("type"))?,
            bucket: data
                .bucket
                .and_then(BucketName::new)
                .ok_or_else(|| missing("bucket"))?,
            object_name: data
                .name
                .and_then(ObjectName::new)
                .ok_or_else(|| missing("name"))?,
            metageneration: data
                .metageneration
                .ok_or_else(|| missing("metageneration"))?,
            created_at: data
                .time_created
                .and_then(Timestamp::new)
                .ok_or_else(|| missing("timeCreated"))?,
            updated_at: data
                .updated
                .and_then(Timestamp::new)
                .ok_or_else(|| missing("updated"))?,
        })
    }

    /// The `gs://{bucket}/{name}` URL handed to the orchestration run.
    pub fn object_url(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.object_name)
    }

    /// The result tuple for this event.
    pub fn summary(&self) -> EventSummary {
        EventSummary {
            event_id: self.event_id.clone(),
            event_type: self.event_type.clone(),
            bucket: self.bucket.clone(),
            name: self.object_name.clone(),
            metageneration: self.metageneration.clone(),
            time_created: self.created_at.clone(),
            updated: self.updated_at.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Invocation result
// ---------------------------------------------------------------------------

/// `(eventId, eventType, bucket, name, metageneration, timeCreated, updated)`.
///
/// Returned on every non-error path. Serialises as a seven-element JSON array
/// in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSummary {
    pub event_id: EventId,
    pub event_type: EventType,
    pub bucket: BucketName,
    pub name: ObjectName,
    pub metageneration: Metageneration,
    pub time_created: Timestamp,
    pub updated: Timestamp,
}

impl Serialize for EventSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (
            &self.event_id,
            &self.event_type,
            &self.bucket,
            &self.name,
            &self.metageneration,
            &self.time_created,
            &self.updated,
        )
            .serialize(serializer)
    }
}

/// The terminal, non-error state an invocation reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Disposition {
    /// The object name did not end in an allow-listed suffix.
    Ineligible,
    /// The object carries no custom metadata; nothing to do.
    MetadataMissing,
    /// One orchestration run was requested.
    Dispatched {
        /// Correlation token sent with the run.
        transaction_id: TransactionId,
    },
}

/// Everything an invocation returns on success.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invocation {
    /// The result tuple.
    #[serde(rename = "result")]
    pub summary: EventSummary,
    /// How the invocation ended.
    pub disposition: Disposition,
}
