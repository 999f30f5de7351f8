//! Mirror of the cloud provider daemons running in the session.
//!
//! Each daemon installs a descriptor file telling where it lives on the bus, and exports
//! the `org.gtk.CloudProvider` interface there. The [`ProviderRegistry`] reads those files and
//! keeps one [`ProviderProxy`] per daemon, which caches the daemon's name and status.
//!
//! Daemons can also call `CloudProviderChanged` on `org.gtk.CloudProviderManager`
//! (see [`ManagerService`]) to ask for their state to be fetched again.

mod descriptor;
mod error;
mod manager;
mod model;
mod provider;
pub mod proxy;
mod registry;
mod transport;

pub use descriptor::{DescriptorSource, DirectorySource, ProviderDescriptor};
pub use error::{DiscoveryError, TransportError};
pub use manager::ManagerService;
pub use model::{Icon, MenuItem, MenuModel, Status};
pub use provider::{ConnectionState, ProviderProxy, ProviderState};
pub use registry::{ProviderRegistry, ScanSummary};
pub use transport::{DBusTransport, Endpoint, Transport};
