use zbus::proxy;

#[proxy(
    default_service = "org.gtk.CloudProviderManager",
    interface = "org.gtk.CloudProviderManager",
    default_path = "/org/gtk/CloudProviderManager"
)]
pub trait CloudProviderManager {
    /// Tell the manager that the calling provider changed its state.
    ///
    /// The manager is expected to query every provider again.
    fn cloud_provider_changed(&self) -> zbus::Result<()>;
}
