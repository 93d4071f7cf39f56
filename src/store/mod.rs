//! Local persistence for staged files.
//!
//! Two stores live side by side under the gateway's root directory:
//!
//! - [`RecordStore`] keeps the bookkeeping entries (`LocalFileRecord`),
//!   one rmp-encoded file per record, mirrored in memory.
//! - [`ByteStore`] keeps the staged byte content, one plain file per
//!   record, appended to as chunks arrive.
//!
//! Neither store guards concurrent writers; callers serialise per-record
//! mutation through [`crate::sync::RecordLocks`].

mod bytes;
mod records;

pub use bytes::ByteStore;
pub use records::RecordStore;
