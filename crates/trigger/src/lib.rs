//! Core domain for the uploader trigger.
//!
//! This crate contains every domain concept used when a storage upload is
//! turned into an orchestration run: the inbound event, the re-fetched object
//! descriptor, the required metadata, the dispatch payload, the error
//! taxonomy, and the port traits the infrastructure crates implement.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`BucketName`, `ObjectName`, `TransactionId`, etc.) |
//! | [`types`] | Inbound event, result tuple, and terminal dispositions |
//! | [`eligibility`] | Suffix allow-list |
//! | [`metadata`] | Object descriptor and required-metadata extraction |
//! | [`dispatch`] | Run-trigger payload |
//! | [`config`] | Process configuration |
//! | [`ports`] | `ObjectStore` and `WorkflowTrigger` traits |
//! | [`errors`] | Error and retry-policy types |

pub mod config;
pub mod dispatch;
pub mod eligibility;
pub mod errors;
pub mod identifiers;
pub mod metadata;
pub mod ports;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use config::{AirflowConfig, Secret, StorageConfig, UploaderConfig};
pub use dispatch::{DagRunBody, DispatchRequest, DispatchSettings};
pub use eligibility::is_eligible;
pub use errors::{
    ConfigError, DispatchError, MissingMetadataKeys, RetryPolicy, StorageError, UploaderError,
};
pub use identifiers::{
    BucketName, EventId, EventType, FileId, IndexName, ObjectName, TransactionId, UserId,
};
pub use metadata::{extract_required, CustomMetadata, DomainTags, ObjectDescriptor, RequiredMetadata};
pub use ports::{ObjectStore, WorkflowTrigger};
pub use types::{
    Disposition, EventSummary, IncomingEvent, Invocation, Metageneration, StorageObjectData,
    Timestamp,
};
