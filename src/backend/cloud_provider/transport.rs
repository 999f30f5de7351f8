use super::{proxy::CloudProviderProxy, ProviderDescriptor, TransportError};
use futures::{future::BoxFuture, FutureExt};
use std::sync::Arc;
use zbus::{proxy::CacheProperties, Connection};

/// Opens connections to provider daemons.
pub trait Transport: Send + Sync + 'static {
    fn connect(
        &self,
        descriptor: &ProviderDescriptor,
    ) -> BoxFuture<'static, Result<Arc<dyn Endpoint>, TransportError>>;
}

/// A connected provider daemon.
///
/// Returned futures own everything they need, so that a call can outlive the borrow of its endpoint.
pub trait Endpoint: Send + Sync + 'static {
    fn get_name(&self) -> BoxFuture<'static, Result<String, TransportError>>;

    /// Raw status, as sent on the wire.
    fn get_status(&self) -> BoxFuture<'static, Result<i32, TransportError>>;
}

/// [`Transport`] over a zbus connection.
#[derive(Debug, Clone)]
pub struct DBusTransport {
    connection: Connection,
}

impl DBusTransport {
    pub const fn new(connection: Connection) -> Self {
        Self { connection }
    }

    pub async fn session() -> Result<Self, TransportError> {
        Connection::session()
            .await
            .map(Self::new)
            .map_err(TransportError::BusUnavailable)
    }

    pub async fn system() -> Result<Self, TransportError> {
        Connection::system()
            .await
            .map(Self::new)
            .map_err(TransportError::BusUnavailable)
    }

    pub const fn connection(&self) -> &Connection {
        &self.connection
    }
}

impl Transport for DBusTransport {
    fn connect(
        &self,
        descriptor: &ProviderDescriptor,
    ) -> BoxFuture<'static, Result<Arc<dyn Endpoint>, TransportError>> {
        let connection = self.connection.clone();
        let destination = descriptor.bus_name().to_owned();
        let path = descriptor.object_path().to_owned();

        async move {
            let refused = |e: zbus::Error| TransportError::ConnectionRefused {
                destination: destination.clone(),
                reason: e.to_string(),
            };

            let proxy = CloudProviderProxy::builder(&connection)
                .destination(destination.clone())
                .map_err(refused)?
                .path(path)
                .map_err(refused)?
                // the interface has no properties
                .cache_properties(CacheProperties::No)
                .build()
                .await
                .map_err(refused)?;

            Ok(Arc::new(DBusEndpoint { proxy }) as Arc<dyn Endpoint>)
        }
        .boxed()
    }
}

#[derive(Debug, Clone)]
struct DBusEndpoint {
    proxy: CloudProviderProxy<'static>,
}

impl DBusEndpoint {
    fn destination(&self) -> String {
        self.proxy.inner().destination().to_string()
    }
}

impl Endpoint for DBusEndpoint {
    fn get_name(&self) -> BoxFuture<'static, Result<String, TransportError>> {
        let this = self.clone();
        async move {
            this.proxy
                .get_name()
                .await
                .map_err(|e| TransportError::from_call(&this.destination(), "GetName", e))
        }
        .boxed()
    }

    fn get_status(&self) -> BoxFuture<'static, Result<i32, TransportError>> {
        let this = self.clone();
        async move {
            this.proxy
                .get_status()
                .await
                .map_err(|e| TransportError::from_call(&this.destination(), "GetStatus", e))
        }
        .boxed()
    }
}
