//! Port traits for the two external collaborators.
//!
//! Infrastructure crates implement these; the `dispatcher` crate only ever
//! sees `dyn ObjectStore` and `dyn WorkflowTrigger`. Implementations make
//! exactly one network call per method invocation, bounded by a timeout, and
//! never retry. Redelivery belongs to the hosting infrastructure.

use async_trait::async_trait;

use crate::{BucketName, DispatchError, DispatchRequest, ObjectDescriptor, ObjectName, StorageError};

/// Read access to object descriptors in the storage service.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Re-reads the current descriptor of `bucket/object`.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the object cannot be read. A missing
    /// object is [`StorageError::NotFound`].
    async fn fetch_descriptor(
        &self,
        bucket: &BucketName,
        object: &ObjectName,
    ) -> Result<ObjectDescriptor, StorageError>;
}

/// Starts runs of the processing workflow.
#[async_trait]
pub trait WorkflowTrigger: Send + Sync {
    /// Requests one run configured with `request`.
    ///
    /// Success means the orchestration service answered with a 2xx status;
    /// the response body is not inspected.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] on any non-success status or transport
    /// failure. The run may still have been created.
    async fn start_run(&self, request: &DispatchRequest) -> Result<(), DispatchError>;
}
