//! Service-node gateway for a decentralized data storage (DDS) network.
//!
//! The gateway stages client files locally, drives them through an upload
//! saga against the storage network and a billing service, and resolves
//! file keys by probing discovery-listed validator nodes for possession.
//!
//! The main entry point is [`GatewayBuilder`], which assembles a
//! [`Gateway`] over persistent record and byte stores plus pluggable
//! collaborator clients:
//!
//! ```no_run
//! use dds_gateway::{GatewayBuilder, GatewayConfig};
//!
//! # async fn run() -> dds_gateway::Result<()> {
//! let gateway = GatewayBuilder::new(GatewayConfig::default()).build()?;
//! let _events = gateway.subscribe_events();
//! # Ok(())
//! # }
//! ```

pub mod clients;
pub mod config;
pub mod error;
pub mod event;
pub mod filekey;
pub mod gateway;
pub mod logging;
pub mod probe;
pub mod record;
pub mod saga;
pub mod signature;
pub mod store;
pub mod sync;

pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use event::{UploadEvent, UploadEventsChannel};
pub use gateway::{Gateway, GatewayBuilder};
pub use record::{FileInfo, LocalFileRecord, NewFileRecord, UploadCheck, UploadStage};
pub use saga::Acknowledgement;
pub use signature::{SignedRequest, SignatureVerifier};
