mod manager;
mod provider;

pub use manager::CloudProviderManagerProxy;
pub use provider::CloudProviderProxy;
