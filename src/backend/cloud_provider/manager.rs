use super::{registry::WeakRegistry, ProviderRegistry};
use log::{debug, info, warn};
use zbus::{
    fdo::{RequestNameFlags, RequestNameReply},
    interface,
    message::Header,
    Connection,
};

/// The `org.gtk.CloudProviderManager` service, through which providers report their changes.
#[derive(Debug, Clone)]
pub struct ManagerService {
    registry: WeakRegistry,
}

impl ManagerService {
    pub const PATH: &'static str = "/org/gtk/CloudProviderManager";
    pub const WELL_KNOWN_NAME: &'static str = "org.gtk.CloudProviderManager";

    /// Export the service for `registry` and try to own its well-known name.
    ///
    /// Return whether the name was acquired. When another manager already owns it,
    /// providers will talk to that one and `registry` has to be refreshed by its users.
    pub async fn serve(connection: &Connection, registry: &ProviderRegistry) -> zbus::Result<bool> {
        if !Self::export(connection, registry).await? {
            warn!("A cloud provider manager is already exported on this connection");
        }

        let flags = RequestNameFlags::DoNotQueue.into();
        match connection
            .request_name_with_flags(Self::WELL_KNOWN_NAME, flags)
            .await
        {
            Ok(RequestNameReply::PrimaryOwner | RequestNameReply::AlreadyOwner) => {
                info!("Owning {}", Self::WELL_KNOWN_NAME);
                Ok(true)
            }
            // we asked not to be queued, but treat it like a refusal anyway
            Ok(RequestNameReply::Exists | RequestNameReply::InQueue)
            | Err(zbus::Error::NameTaken) => {
                warn!(
                    "{} is owned by another process, provider changes won't be pushed to us",
                    Self::WELL_KNOWN_NAME
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Only export the object, without asking for the name.
    ///
    /// Enough on a peer-to-peer connection. Return `false` if something is already exported there.
    pub async fn export(connection: &Connection, registry: &ProviderRegistry) -> zbus::Result<bool> {
        let this = Self {
            registry: registry.downgrade(),
        };
        connection.object_server().at(Self::PATH, this).await
    }
}

#[interface(name = "org.gtk.CloudProviderManager")]
impl ManagerService {
    async fn cloud_provider_changed(&self, #[zbus(header)] header: Header<'_>) {
        debug!("Cloud provider {:?} reported a change", header.sender());

        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        registry.update().await;
    }
}
