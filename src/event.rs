//! Upload saga event system.
//!
//! Every stage transition of an upload saga is reported as a discrete event
//! keyed by record id and stage, so an external observer can trace exactly
//! where a run failed. Saga errors are never surfaced to the submitting
//! caller; this trace and the persisted record are the only witnesses.

use crate::record::UploadStage;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events emitted while an upload saga runs.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// A stage has started for the given record.
    StageStarted {
        /// Record the saga is driving.
        record_id: Uuid,
        /// Stage that just started.
        stage: UploadStage,
    },

    /// A stage has completed successfully.
    StageCompleted {
        /// Record the saga is driving.
        record_id: Uuid,
        /// Stage that just completed.
        stage: UploadStage,
    },

    /// The whole saga completed; the record is uploaded and paid for.
    Completed {
        /// Record the saga drove to completion.
        record_id: Uuid,
    },

    /// The saga failed and the record was marked failed.
    Failed {
        /// Record the saga was driving.
        record_id: Uuid,
        /// Stage at which the failure occurred.
        stage: UploadStage,
        /// Failure description.
        message: String,
    },
}

impl UploadEvent {
    /// The record this event belongs to.
    #[must_use]
    pub fn record_id(&self) -> Uuid {
        match self {
            Self::StageStarted { record_id, .. }
            | Self::StageCompleted { record_id, .. }
            | Self::Completed { record_id }
            | Self::Failed { record_id, .. } => *record_id,
        }
    }
}

/// Channel for receiving upload events.
pub type UploadEventsChannel = broadcast::Receiver<UploadEvent>;

/// Sender for upload events.
pub type UploadEventsSender = broadcast::Sender<UploadEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (UploadEventsSender, UploadEventsChannel) {
    broadcast::channel(256)
}
