//! The staged upload saga.
//!
//! A staged record is driven through three stages against external
//! collaborators, with the outcome persisted on the record itself:
//!
//! ```text
//! PENDING -> UPLOADING -> PAYING -> NOTIFYING -> COMPLETE
//!      \-> FAILED (from any stage on error)
//! ```
//!
//! The submitting caller only waits for acceptance; the pipeline runs on
//! its own task and the caller polls the record (or the event trace) for
//! the outcome. There is no rollback: effects of completed stages survive
//! a later failure and are reconciled out of band.

mod orchestrator;

pub use orchestrator::{Acknowledgement, UploadOrchestrator};
