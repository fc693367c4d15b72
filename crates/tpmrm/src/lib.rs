//! TPM resource manager.
//!
//! [`ResourceManager`] gives callers stable virtual handles for transient
//! objects, keeps sessions resident on demand, and recovers from the device's
//! resource warnings by evicting, reloading and retrying.
//! [`ResourceManagerService`] confines one manager to a worker thread.

pub mod bridge;
pub mod config;
pub mod error;
pub mod handle;
mod init;
pub mod manager;
pub mod objects;
pub mod recovery;
pub mod sessions;
pub mod transceiver;
pub mod worker;

use std::fmt;

pub use bridge::ContextBridge;
pub use config::ResourceManagerConfig;
pub use error::{ConfigError, HandleError, InitError, WorkerError};
pub use handle::{HandleInfo, Residency};
pub use manager::ResourceManager;
pub use objects::ObjectTable;
pub use recovery::Remediation;
pub use sessions::SessionRegistry;
pub use transceiver::{ResponseCallback, Transceiver};
pub use worker::ResourceManagerService;

/// Displays a handle or response code as fixed-width hex in log fields.
pub(crate) struct Hex(pub(crate) u32);

impl fmt::Display for Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
