//! Track the status of cloud storage daemons (Nextcloud, ownCloud, ...) over D-Bus.
//!
//! ```no_run
//! # async fn run() -> Result<(), cloud_providers::TransportError> {
//! use cloud_providers::ProviderRegistry;
//!
//! let registry = ProviderRegistry::instance().await?;
//! registry.connect_changed(move || {
//!     for provider in registry.providers() {
//!         println!("{:?}: {}", provider.name(), provider.status());
//!     }
//! });
//! # Ok(())
//! # }
//! ```

mod backend;
pub mod config;
mod extensions;
pub mod signal;

pub use backend::cloud_provider::*;
pub use config::{BusType, Config, ConfigError};
pub use signal::HandlerId;
