use zbus::proxy;

/// The interface every cloud provider daemon exports.
///
/// Replies are read as raw wire types. Conversion to [`Status`](crate::Status) happens
/// in the provider, so that an out-of-range value is reported instead of rejected by zbus.
#[proxy(interface = "org.gtk.CloudProvider")]
pub trait CloudProvider {
    /// Display name of the provider, for instance "MyCloud".
    fn get_name(&self) -> zbus::Result<String>;

    /// Current synchronization status: 0 = invalid, 1 = idle, 2 = syncing, 3 = error.
    fn get_status(&self) -> zbus::Result<i32>;
}
