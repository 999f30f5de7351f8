use super::{
    Endpoint, Icon, MenuModel, ProviderDescriptor, Status, Transport, TransportError,
};
use crate::{
    extensions::{MutexExt, RwLockExt},
    signal::{HandlerId, Signal},
};
use log::{debug, info, warn};
use std::{
    fmt,
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, RwLock, Weak,
    },
};
use tokio::task::AbortHandle;

/// Last known state of a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderState {
    pub name: Option<String>,
    pub status: Status,
    pub icon: Option<Icon>,
    pub menu: Option<MenuModel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Connected,
    /// The connection could not be established, it won't be retried.
    Failed,
    /// The provider was removed, nothing will change anymore.
    Closed,
}

enum Link {
    Connecting,
    Connected(Arc<dyn Endpoint>),
    Failed,
}

/// A live mirror of one cloud provider daemon.
///
/// Cloning gives another handle to the same provider.
#[derive(Clone)]
pub struct ProviderProxy {
    inner: Arc<Inner>,
}

struct Inner {
    descriptor: ProviderDescriptor,
    state: RwLock<ProviderState>,
    link: Mutex<Link>,
    closed: AtomicBool,
    /// Completion handlers hold it for reading while they update and notify,
    /// [`ProviderProxy::close`] holds it for writing while it sets `closed`.
    gate: RwLock<()>,
    tasks: Mutex<Vec<AbortHandle>>,
    changed: Signal,
}

impl ProviderProxy {
    /// Start connecting to the daemon described by `descriptor`.
    ///
    /// This returns immediately, once connected the provider refreshes itself.
    /// Must be called from within a tokio runtime.
    pub fn connect(descriptor: ProviderDescriptor, transport: &dyn Transport) -> Self {
        let this = Self::new(descriptor);
        this.start(transport);
        this
    }

    /// A provider that doesn't connect until [`Self::start`] is called,
    /// so that handlers can be connected before anything happens.
    pub(crate) fn new(descriptor: ProviderDescriptor) -> Self {
        Self {
            inner: Arc::new(Inner {
                descriptor,
                state: RwLock::default(),
                link: Mutex::new(Link::Connecting),
                closed: AtomicBool::new(false),
                gate: RwLock::new(()),
                tasks: Mutex::default(),
                changed: Signal::new(),
            }),
        }
    }

    pub(crate) fn start(&self, transport: &dyn Transport) {
        debug!("Connecting to cloud provider {}", self.inner.descriptor);
        let connecting = transport.connect(&self.inner.descriptor);

        self.spawn(|this| async move {
            let result = connecting.await;
            if let Some(this) = this.upgrade() {
                this.on_connected(result);
            }
        });
    }

    pub fn descriptor(&self) -> &ProviderDescriptor {
        &self.inner.descriptor
    }

    pub fn name(&self) -> Option<String> {
        self.inner.state.read_ignore_poison().name.clone()
    }

    pub fn status(&self) -> Status {
        self.inner.state.read_ignore_poison().status
    }

    pub fn icon(&self) -> Option<Icon> {
        self.inner.state.read_ignore_poison().icon.clone()
    }

    pub fn menu(&self) -> Option<MenuModel> {
        self.inner.state.read_ignore_poison().menu.clone()
    }

    /// Snapshot of every cached value at once.
    pub fn state(&self) -> ProviderState {
        self.inner.state.read_ignore_poison().clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        if self.is_closed() {
            return ConnectionState::Closed;
        }

        match *self.inner.link.acquire() {
            Link::Connecting => ConnectionState::Connecting,
            Link::Connected(_) => ConnectionState::Connected,
            Link::Failed => ConnectionState::Failed,
        }
    }

    /// Ask the daemon for its name and status again.
    ///
    /// Both calls are independent, each reply updates its own value and notifies on its own.
    /// Does nothing until the connection is established.
    pub fn refresh(&self) {
        if self.is_closed() {
            return;
        }

        let endpoint = match &*self.inner.link.acquire() {
            Link::Connected(endpoint) => Arc::clone(endpoint),
            Link::Connecting | Link::Failed => {
                debug!(
                    "Not refreshing {}, it is not connected",
                    self.inner.descriptor
                );
                return;
            }
        };

        let get_name = endpoint.get_name();
        self.spawn(|this| async move {
            let result = get_name.await;
            if let Some(this) = this.upgrade() {
                this.on_name(result);
            }
        });

        let get_status = endpoint.get_status();
        self.spawn(|this| async move {
            let result = get_status.await;
            if let Some(this) = this.upgrade() {
                this.on_status(result);
            }
        });
    }

    /// Run `handler` every time a reply from the daemon arrives.
    ///
    /// The handler runs while the reply is being applied: it may read or refresh the provider,
    /// but must not close it.
    pub fn connect_changed(&self, handler: impl Fn() + Send + Sync + 'static) -> HandlerId {
        self.inner.changed.connect(handler)
    }

    pub fn disconnect(&self, id: HandlerId) -> bool {
        self.inner.changed.disconnect(id)
    }

    /// Stop mirroring the daemon.
    ///
    /// In-flight calls are cancelled, and replies that were already on their way are dropped:
    /// after this returns, the state never changes and no notification is sent.
    pub fn close(&self) {
        let gate = self.inner.gate.write_ignore_poison();
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        drop(gate);

        debug!("Closing cloud provider {}", self.inner.descriptor);
        self.inner.abort_tasks();
        self.inner.changed.disconnect_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn spawn<F, Fut>(&self, task: F)
    where
        F: FnOnce(WeakProvider) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task(WeakProvider(Arc::downgrade(&self.inner))));

        let mut tasks = self.inner.tasks.acquire();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle.abort_handle());
    }

    fn on_connected(&self, result: Result<Arc<dyn Endpoint>, TransportError>) {
        let gate = self.inner.gate.read_ignore_poison();
        if self.is_closed() {
            return;
        }

        match result {
            Ok(endpoint) => {
                info!("Connected to cloud provider {}", self.inner.descriptor);
                *self.inner.link.acquire() = Link::Connected(endpoint);
                if let Some(icon) = self.inner.descriptor.icon() {
                    self.inner.state.write_ignore_poison().icon = Some(icon.clone());
                }
            }
            Err(e) => {
                warn!(
                    "Error creating proxy for cloud provider {}: {e}",
                    self.inner.descriptor
                );
                *self.inner.link.acquire() = Link::Failed;
                return;
            }
        }
        drop(gate);

        self.refresh();
    }

    fn on_name(&self, result: Result<String, TransportError>) {
        self.complete(result.map(|name| move |state: &mut ProviderState| state.name = Some(name)));
    }

    fn on_status(&self, result: Result<i32, TransportError>) {
        let result = result.and_then(|raw| {
            Status::from_repr(raw).ok_or_else(|| TransportError::MalformedReply {
                method: "GetStatus",
                reason: format!("unknown status {raw}"),
            })
        });
        self.complete(result.map(|status| move |state: &mut ProviderState| state.status = status));
    }

    /// Apply a reply, then notify even if the call failed, so observers know nothing is pending.
    fn complete(&self, update: Result<impl FnOnce(&mut ProviderState), TransportError>) {
        let gate = self.inner.gate.read_ignore_poison();
        if self.is_closed() {
            debug!(
                "Ignoring reply for closed cloud provider {}",
                self.inner.descriptor
            );
            return;
        }

        match update {
            Ok(update) => update(&mut *self.inner.state.write_ignore_poison()),
            Err(e) => warn!(
                "Error refreshing cloud provider {}: {e}",
                self.inner.descriptor
            ),
        }

        self.inner.changed.emit();
        drop(gate);
    }
}

impl Inner {
    fn abort_tasks(&self) {
        for task in self.tasks.acquire().drain(..) {
            task.abort();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

impl PartialEq for ProviderProxy {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ProviderProxy {}

impl fmt::Debug for ProviderProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderProxy")
            .field("descriptor", &self.inner.descriptor)
            .field("state", &*self.inner.state.read_ignore_poison())
            .field("connection", &self.connection_state())
            .finish()
    }
}

/// Handle held by in-flight tasks, so that they don't keep a dropped provider alive.
struct WeakProvider(Weak<Inner>);

impl WeakProvider {
    fn upgrade(&self) -> Option<ProviderProxy> {
        self.0.upgrade().map(|inner| ProviderProxy { inner })
    }
}
