#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod client;
pub mod config;
pub mod error;
pub mod file;
pub mod registry;

pub use client::{GenericTransferClient, TransferBackend, TransferClient};
pub use config::{Protocol, Settings, TransferConfig};
pub use error::{Error, ErrorKind, Result};
pub use file::{RemoteMetadata, TransferFile};
pub use registry::ClientRegistry;
