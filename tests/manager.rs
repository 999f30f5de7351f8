#![allow(clippy::unwrap_used)]

mod common;

use cloud_providers::{
    proxy::CloudProviderManagerProxy, DirectorySource, ManagerService, ProviderRegistry,
};
use common::{settle, stub, write_descriptor, Controller};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::UnixStream;
use zbus::{connection, proxy::CacheProperties, Connection, Guid};

/// A manager and a provider talking over a socket pair, no bus daemon involved.
async fn peers() -> (Connection, Connection) {
    let guid = Guid::generate();
    let (manager, provider) = UnixStream::pair().unwrap();
    futures::try_join!(
        connection::Builder::unix_stream(manager)
            .server(guid)
            .unwrap()
            .p2p()
            .build(),
        connection::Builder::unix_stream(provider).p2p().build(),
    )
    .unwrap()
}

async fn manager_proxy(connection: &Connection) -> CloudProviderManagerProxy<'static> {
    CloudProviderManagerProxy::builder(connection)
        .cache_properties(CacheProperties::No)
        .build()
        .await
        .unwrap()
}

async fn setup(dir: &TempDir) -> (ProviderRegistry, Controller) {
    let (transport, mut controller) = stub();
    let source = DirectorySource::new(vec![dir.path().to_owned()]);
    let registry = ProviderRegistry::new(transport, Arc::new(source));
    registry.rescan().await;
    controller.settle_all("Cloud", 1).await;
    (registry, controller)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn changed_call_updates_registry() {
    let dir = TempDir::new().unwrap();
    write_descriptor(dir.path(), "a.ini", "org.example.A", "/org/example/A");
    let (registry, mut controller) = setup(&dir).await;

    let (server, client) = peers().await;
    assert!(ManagerService::export(&server, &registry).await.unwrap());
    // a second export on the same connection is refused
    assert!(!ManagerService::export(&server, &registry).await.unwrap());

    write_descriptor(dir.path(), "b.ini", "org.example.B", "/org/example/B");
    let manager = manager_proxy(&client).await;
    manager.cloud_provider_changed().await.unwrap();

    // the provider that was already there is asked again
    let (name, status) = controller.next_refresh().await;
    assert_eq!(name.bus_name, "org.example.A");
    name.answer("Renamed", 2);
    status.answer("Renamed", 2);

    // and the new descriptor was picked up on the way
    let connect = controller.next_connect().await;
    assert_eq!(connect.descriptor.bus_name(), "org.example.B");
    connect.accept();
    controller.settle_all("Other", 1).await;

    let providers = registry.providers();
    assert_eq!(providers.len(), 2);
    assert_eq!(providers[0].name().as_deref(), Some("Renamed"));
    assert_eq!(providers[1].name().as_deref(), Some("Other"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn changed_call_after_registry_is_gone() {
    let dir = TempDir::new().unwrap();
    write_descriptor(dir.path(), "a.ini", "org.example.A", "/org/example/A");
    let (registry, mut controller) = setup(&dir).await;

    let (server, client) = peers().await;
    assert!(ManagerService::export(&server, &registry).await.unwrap());
    drop(registry);
    settle().await;

    let manager = manager_proxy(&client).await;
    manager.cloud_provider_changed().await.unwrap();

    controller.assert_no_call().await;
    controller.assert_no_connect().await;
}
