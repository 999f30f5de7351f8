use super::{
    DBusTransport, DescriptorSource, DirectorySource, ManagerService, ProviderDescriptor,
    ProviderProxy, Transport, TransportError,
};
use crate::{
    config::{BusType, Config},
    extensions::RwLockExt,
    signal::{HandlerId, Signal},
};
use log::{error, info, warn};
use std::{
    collections::HashSet,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock, Weak,
    },
};
use tokio::sync::{Mutex, OnceCell};

static INSTANCE: OnceCell<ProviderRegistry> = OnceCell::const_new();

/// What a [`ProviderRegistry::rescan`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub added: usize,
    pub removed: usize,
    pub kept: usize,
}

impl ScanSummary {
    pub const fn changed(&self) -> bool {
        self.added > 0 || self.removed > 0
    }
}

/// Keeps one [`ProviderProxy`] per advertised provider.
///
/// Cloning gives another handle to the same registry.
#[derive(Clone)]
pub struct ProviderRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    source: Arc<dyn DescriptorSource>,
    providers: RwLock<Vec<ProviderProxy>>,
    /// Only one scan at a time
    scanning: Mutex<()>,
    shut_down: AtomicBool,
    changed: Arc<Signal>,
}

impl ProviderRegistry {
    /// A registry with no provider. Call [`Self::rescan`] to populate it.
    pub fn new(transport: Arc<dyn Transport>, source: Arc<dyn DescriptorSource>) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                source,
                providers: RwLock::default(),
                scanning: Mutex::new(()),
                shut_down: AtomicBool::new(false),
                changed: Arc::new(Signal::new()),
            }),
        }
    }

    /// The process-wide registry, created from [`Config::load_or_default`] on first call.
    pub async fn instance() -> Result<&'static Self, TransportError> {
        INSTANCE
            .get_or_try_init(|| Self::start(Config::load_or_default()))
            .await
    }

    /// Like [`Self::instance`], with an explicit configuration.
    ///
    /// The configuration is ignored if the registry already exists.
    pub async fn instance_with_config(config: Config) -> Result<&'static Self, TransportError> {
        if INSTANCE.initialized() {
            warn!("The cloud provider registry is already running, ignoring new configuration");
        }
        INSTANCE.get_or_try_init(|| Self::start(config)).await
    }

    async fn start(config: Config) -> Result<Self, TransportError> {
        let transport = match config.bus {
            BusType::Session => DBusTransport::session().await?,
            BusType::System => DBusTransport::system().await?,
        };
        let connection = transport.connection().clone();

        let this = Self::new(
            Arc::new(transport),
            Arc::new(DirectorySource::new(config.directories)),
        );

        if config.export_manager {
            if let Err(e) = ManagerService::serve(&connection, &this).await {
                warn!("Cannot export the cloud provider manager, providers won't be able to push changes: {e}");
            }
        }

        this.rescan().await;
        Ok(this)
    }

    /// Snapshot of the current providers, in display order.
    ///
    /// A provider kept after a rescan removed it is closed: it still answers with its last state.
    pub fn providers(&self) -> Vec<ProviderProxy> {
        self.inner.providers.read_ignore_poison().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.providers.read_ignore_poison().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, descriptor: &ProviderDescriptor) -> Option<ProviderProxy> {
        self.inner
            .providers
            .read_ignore_poison()
            .iter()
            .find(|provider| provider.descriptor() == descriptor)
            .cloned()
    }

    /// Read the advertised providers again and synchronize with them.
    ///
    /// New providers are connected (and refresh themselves once connected), vanished ones are closed,
    /// the others are left alone. Notifies once if anything was added or removed.
    pub async fn rescan(&self) -> ScanSummary {
        self.rescan_inner().await.0
    }

    /// Rescan, then refresh the providers that were already there.
    ///
    /// This is what a provider asks for when it reports a change.
    pub async fn update(&self) -> ScanSummary {
        let (summary, kept) = self.rescan_inner().await;
        for provider in kept {
            provider.refresh();
        }
        summary
    }

    /// Refresh every provider.
    pub fn refresh_all(&self) {
        for provider in self.providers() {
            provider.refresh();
        }
    }

    /// Close every provider, cancelling their in-flight calls. Later rescans do nothing.
    pub async fn shutdown(&self) {
        let _scanning = self.inner.scanning.lock().await;
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let providers = std::mem::take(&mut *self.inner.providers.write_ignore_poison());
        for provider in &providers {
            provider.close();
        }
        info!("Cloud provider registry shut down");

        if !providers.is_empty() {
            self.inner.changed.emit();
        }
    }

    /// Run `handler` when any provider changes, or when providers are added or removed.
    ///
    /// Every underlying change gives exactly one call, nothing is merged.
    pub fn connect_changed(&self, handler: impl Fn() + Send + Sync + 'static) -> HandlerId {
        self.inner.changed.connect(handler)
    }

    pub fn disconnect(&self, id: HandlerId) -> bool {
        self.inner.changed.disconnect(id)
    }

    pub(crate) fn downgrade(&self) -> WeakRegistry {
        WeakRegistry(Arc::downgrade(&self.inner))
    }

    async fn rescan_inner(&self) -> (ScanSummary, Vec<ProviderProxy>) {
        let _scanning = self.inner.scanning.lock().await;
        if self.inner.shut_down.load(Ordering::SeqCst) {
            return (ScanSummary::default(), Vec::new());
        }

        let source = Arc::clone(&self.inner.source);
        let descriptors = match tokio::task::spawn_blocking(move || source.descriptors()).await {
            Ok(descriptors) => descriptors,
            Err(e) => {
                error!("Cloud provider discovery failed: {e}");
                return (ScanSummary::default(), self.providers());
            }
        };

        let (summary, kept, removed) = self.apply(descriptors);

        // outside of the list lock: closing waits for running handlers, which may read the list
        for provider in &removed {
            info!("Cloud provider {} removed", provider.descriptor());
            provider.close();
        }
        if summary.changed() {
            self.inner.changed.emit();
        }

        (summary, kept)
    }

    fn apply(
        &self,
        descriptors: Vec<ProviderDescriptor>,
    ) -> (ScanSummary, Vec<ProviderProxy>, Vec<ProviderProxy>) {
        let mut providers = self.inner.providers.write_ignore_poison();
        let wanted: HashSet<&ProviderDescriptor> = descriptors.iter().collect();

        let (kept, removed): (Vec<_>, Vec<_>) = providers
            .drain(..)
            .partition(|provider| wanted.contains(provider.descriptor()));
        providers.extend(kept.iter().cloned());

        let mut known: HashSet<ProviderDescriptor> = kept
            .iter()
            .map(|provider| provider.descriptor().clone())
            .collect();
        let mut added = 0;
        for descriptor in descriptors {
            if !known.insert(descriptor.clone()) {
                continue;
            }

            info!("Cloud provider {descriptor} added");
            providers.push(self.create(descriptor));
            added += 1;
        }

        let summary = ScanSummary {
            added,
            removed: removed.len(),
            kept: kept.len(),
        };
        (summary, kept, removed)
    }

    fn create(&self, descriptor: ProviderDescriptor) -> ProviderProxy {
        let provider = ProviderProxy::new(descriptor);

        let changed = Arc::clone(&self.inner.changed);
        provider.connect_changed(move || changed.emit());
        provider.start(&*self.inner.transport);

        provider
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &*self.inner.providers.read_ignore_poison())
            .field("shut_down", &self.inner.shut_down.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// A registry handle that doesn't keep it alive.
#[derive(Debug, Clone)]
pub(crate) struct WeakRegistry(Weak<Inner>);

impl WeakRegistry {
    pub fn upgrade(&self) -> Option<ProviderRegistry> {
        self.0.upgrade().map(|inner| ProviderRegistry { inner })
    }
}
