//! A fake cloud provider, to try the registry without a real sync daemon.
//!
//! Install a descriptor like this one in `~/.local/share/gtk+/cloud-providers/example.ini`:
//!
//! ```ini
//! [Gtk Cloud Provider]
//! BusName=org.gtk.CloudProviderServerExample
//! ObjectPath=/org/gtk/CloudProviderServerExample
//! ```

use anyhow::Context;
use cloud_providers::{proxy::CloudProviderManagerProxy, Status};
use log::{debug, error, info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use std::{
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
    },
    time::Duration,
};
use zbus::{
    fdo::{RequestNameFlags, RequestNameReply},
    interface, Connection,
};

const WELL_KNOWN_NAME: &str = "org.gtk.CloudProviderServerExample";
const PATH: &str = "/org/gtk/CloudProviderServerExample";
const CHANGE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
struct CloudProvider {
    name: String,
    status: Arc<AtomicI32>,
}

#[interface(name = "org.gtk.CloudProvider")]
impl CloudProvider {
    fn get_name(&self) -> String {
        debug!("GetName called");
        self.name.clone()
    }

    fn get_status(&self) -> i32 {
        debug!("GetStatus called");
        self.status.load(Ordering::SeqCst)
    }
}

const fn next_status(status: Status) -> Status {
    match status {
        Status::Invalid | Status::Error => Status::Idle,
        Status::Idle => Status::Syncing,
        Status::Syncing => Status::Error,
    }
}

async fn run() -> anyhow::Result<()> {
    let connection = Connection::session()
        .await
        .context("Cannot connect to the session bus")?;

    let provider = CloudProvider {
        name: "MyCloud".to_owned(),
        status: Arc::new(AtomicI32::new(Status::Syncing as i32)),
    };
    let status = Arc::clone(&provider.status);

    info!("Registering cloud provider server '{}'", provider.name);
    connection.object_server().at(PATH, provider).await?;
    match connection
        .request_name_with_flags(WELL_KNOWN_NAME, RequestNameFlags::DoNotQueue.into())
        .await?
    {
        RequestNameReply::PrimaryOwner | RequestNameReply::AlreadyOwner => {}
        RequestNameReply::Exists | RequestNameReply::InQueue => {
            anyhow::bail!("{WELL_KNOWN_NAME} is already owned by another process");
        }
    }

    let manager = match CloudProviderManagerProxy::new(&connection).await {
        Ok(manager) => Some(manager),
        Err(e) => {
            warn!("Error creating proxy for cloud provider manager: {e}");
            None
        }
    };

    let mut interval = tokio::time::interval(CHANGE_INTERVAL);
    // the first tick completes immediately
    interval.tick().await;
    loop {
        interval.tick().await;

        let current = Status::from_repr(status.load(Ordering::SeqCst)).unwrap_or_default();
        let new_status = next_status(current);
        status.store(new_status as i32, Ordering::SeqCst);
        debug!("Status is now {new_status}");

        if let Some(manager) = &manager {
            if let Err(e) = manager.cloud_provider_changed().await {
                error!("Cannot notify the cloud provider manager: {e}");
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .thread_name("cloud-provider-server")
        .enable_all()
        .build()
        .context("Failed to initialize tokio runtime")?;

    rt.block_on(run())
}
