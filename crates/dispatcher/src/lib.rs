//! Uploader orchestration layer.
//!
//! [`Uploader`] runs one invocation: it decides whether an uploaded object is
//! eligible, re-reads its descriptor, extracts the required metadata, and
//! starts exactly one orchestration run.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** The uploader sequences calls between the domain
//! rules in [`trigger`] and the [`trigger::ObjectStore`] /
//! [`trigger::WorkflowTrigger`] ports. It contains no rules of its own and
//! keeps no state between invocations.
//!
//! ## Invocation states
//!
//! ```text
//! Received ─┬─ suffix not allow-listed ──────────────▶ Ineligible
//!           ├─ descriptor re-fetch fails ────────────▶ Err(StorageAccess)
//!           ├─ no custom metadata ───────────────────▶ MetadataMissing
//!           ├─ required keys missing ────────────────▶ Err(MetadataIncomplete)
//!           ├─ trigger call fails ───────────────────▶ Err(Dispatch)
//!           └─ trigger call succeeds ────────────────▶ Dispatched
//! ```

use std::sync::Arc;

use trigger::{
    eligibility, extract_required, Disposition, DispatchRequest, DispatchSettings, IncomingEvent,
    Invocation, ObjectStore, TransactionId, UploaderError, WorkflowTrigger,
};

/// Runs the trigger-to-dispatch path for one event at a time.
///
/// Cheap to share: hold it in an `Arc` and call [`Uploader::handle`] from as
/// many concurrent requests as needed.
pub struct Uploader {
    storage: Arc<dyn ObjectStore>,
    workflow: Arc<dyn WorkflowTrigger>,
    settings: DispatchSettings,
}

impl std::fmt::Debug for Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Uploader {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        workflow: Arc<dyn WorkflowTrigger>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            storage,
            workflow,
            settings,
        }
    }

    /// Handles one storage event.
    ///
    /// # Errors
    ///
    /// - [`UploaderError::StorageAccess`] if the descriptor cannot be re-read.
    /// - [`UploaderError::MetadataIncomplete`] if custom metadata exists but
    ///   lacks required keys.
    /// - [`UploaderError::Dispatch`] if the trigger call fails.
    ///
    /// None of these are retried here.
    #[tracing::instrument(
        name = "uploader.handle",
        skip(self, event),
        fields(
            event_id = %event.event_id,
            event_type = %event.event_type,
            bucket = %event.bucket,
            object = %event.object_name,
        )
    )]
    pub async fn handle(&self, event: &IncomingEvent) -> Result<Invocation, UploaderError> {
        let disposition = self.process(event).await?;
        Ok(Invocation {
            summary: event.summary(),
            disposition,
        })
    }

    async fn process(&self, event: &IncomingEvent) -> Result<Disposition, UploaderError> {
        if !eligibility::is_eligible(&event.object_name) {
            tracing::debug!("object suffix not allow-listed; ignoring");
            return Ok(Disposition::Ineligible);
        }

        let descriptor = self
            .storage
            .fetch_descriptor(&event.bucket, &event.object_name)
            .await?;

        let Some(metadata) = descriptor.non_empty_metadata() else {
            tracing::info!("object has no custom metadata; nothing to dispatch");
            return Ok(Disposition::MetadataMissing);
        };

        let required = extract_required(metadata)?;

        let transaction_id = TransactionId::new_random();
        let request = DispatchRequest::new(event, &required, &self.settings, transaction_id);
        self.workflow.start_run(&request).await?;

        tracing::info!(
            %transaction_id,
            file_id = %required.file_id,
            metageneration = %event.metageneration,
            time_created = %event.created_at,
            updated = %event.updated_at,
            "orchestration run requested"
        );

        Ok(Disposition::Dispatched { transaction_id })
    }
}
