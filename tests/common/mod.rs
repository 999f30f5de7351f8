//! A transport whose connections and replies are released by hand.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use cloud_providers::{Endpoint, ProviderDescriptor, ProviderProxy, ProviderRegistry, Transport, TransportError};
use futures::{future::BoxFuture, FutureExt};
use std::{fs, path::Path, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    time::timeout,
};

const WAIT: Duration = Duration::from_secs(2);
const SETTLE: Duration = Duration::from_millis(50);

pub fn descriptor(bus_name: &str, object_path: &str) -> ProviderDescriptor {
    ProviderDescriptor::new(bus_name, object_path).unwrap()
}

/// Give spawned tasks, including aborted ones, a chance to run.
pub async fn settle() {
    tokio::time::sleep(SETTLE).await;
}

pub fn write_descriptor(dir: &Path, file: &str, bus_name: &str, object_path: &str) {
    fs::write(
        dir.join(file),
        format!("[Gtk Cloud Provider]\nBusName={bus_name}\nObjectPath={object_path}\n"),
    )
    .unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    GetName,
    GetStatus,
}

#[derive(Debug)]
pub enum Reply {
    Name(String),
    Status(i32),
}

pub struct PendingConnect {
    pub descriptor: ProviderDescriptor,
    reply: oneshot::Sender<Result<(), TransportError>>,
}

impl PendingConnect {
    pub fn accept(self) {
        // the provider may be gone already, that's fine
        let _ = self.reply.send(Ok(()));
    }

    pub fn refuse(self) {
        let _ = self.reply.send(Err(TransportError::ConnectionRefused {
            destination: self.descriptor.bus_name().to_owned(),
            reason: "no such service".to_owned(),
        }));
    }
}

pub struct PendingCall {
    pub bus_name: String,
    pub method: Method,
    reply: oneshot::Sender<Result<Reply, TransportError>>,
}

impl PendingCall {
    /// Return whether the caller was still waiting.
    pub fn reply(self, reply: Reply) -> bool {
        self.reply.send(Ok(reply)).is_ok()
    }

    pub fn fail(self) -> bool {
        let method = match self.method {
            Method::GetName => "GetName",
            Method::GetStatus => "GetStatus",
        };
        self.reply.send(Err(TransportError::Timeout { method })).is_ok()
    }

    /// Answer with what a well-behaved daemon would send.
    pub fn answer(self, name: &str, status: i32) -> bool {
        match self.method {
            Method::GetName => self.reply(Reply::Name(name.to_owned())),
            Method::GetStatus => self.reply(Reply::Status(status)),
        }
    }
}

#[derive(Clone)]
pub struct StubTransport {
    connects: mpsc::UnboundedSender<PendingConnect>,
    calls: mpsc::UnboundedSender<PendingCall>,
}

pub struct Controller {
    connects: mpsc::UnboundedReceiver<PendingConnect>,
    calls: mpsc::UnboundedReceiver<PendingCall>,
}

pub fn stub() -> (Arc<StubTransport>, Controller) {
    let (connects_tx, connects_rx) = mpsc::unbounded_channel();
    let (calls_tx, calls_rx) = mpsc::unbounded_channel();
    (
        Arc::new(StubTransport {
            connects: connects_tx,
            calls: calls_tx,
        }),
        Controller {
            connects: connects_rx,
            calls: calls_rx,
        },
    )
}

impl Transport for StubTransport {
    fn connect(
        &self,
        descriptor: &ProviderDescriptor,
    ) -> BoxFuture<'static, Result<Arc<dyn Endpoint>, TransportError>> {
        let (tx, rx) = oneshot::channel();
        self.connects
            .send(PendingConnect {
                descriptor: descriptor.clone(),
                reply: tx,
            })
            .unwrap();

        let endpoint = StubEndpoint {
            bus_name: descriptor.bus_name().to_owned(),
            calls: self.calls.clone(),
        };
        async move {
            match rx.await {
                Ok(Ok(())) => Ok(Arc::new(endpoint) as Arc<dyn Endpoint>),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(TransportError::Timeout { method: "connect" }),
            }
        }
        .boxed()
    }
}

struct StubEndpoint {
    bus_name: String,
    calls: mpsc::UnboundedSender<PendingCall>,
}

impl StubEndpoint {
    fn call(&self, method: Method) -> oneshot::Receiver<Result<Reply, TransportError>> {
        let (tx, rx) = oneshot::channel();
        self.calls
            .send(PendingCall {
                bus_name: self.bus_name.clone(),
                method,
                reply: tx,
            })
            .unwrap();
        rx
    }
}

impl Endpoint for StubEndpoint {
    fn get_name(&self) -> BoxFuture<'static, Result<String, TransportError>> {
        let reply = self.call(Method::GetName);
        async move {
            match reply.await {
                Ok(Ok(Reply::Name(name))) => Ok(name),
                Ok(Ok(other)) => Err(TransportError::MalformedReply {
                    method: "GetName",
                    reason: format!("{other:?}"),
                }),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(TransportError::Timeout { method: "GetName" }),
            }
        }
        .boxed()
    }

    fn get_status(&self) -> BoxFuture<'static, Result<i32, TransportError>> {
        let reply = self.call(Method::GetStatus);
        async move {
            match reply.await {
                Ok(Ok(Reply::Status(status))) => Ok(status),
                Ok(Ok(other)) => Err(TransportError::MalformedReply {
                    method: "GetStatus",
                    reason: format!("{other:?}"),
                }),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(TransportError::Timeout { method: "GetStatus" }),
            }
        }
        .boxed()
    }
}

impl Controller {
    pub async fn next_connect(&mut self) -> PendingConnect {
        timeout(WAIT, self.connects.recv())
            .await
            .expect("no connection was attempted")
            .unwrap()
    }

    pub async fn next_call(&mut self) -> PendingCall {
        timeout(WAIT, self.calls.recv())
            .await
            .expect("no call was issued")
            .unwrap()
    }

    /// The `GetName` and `GetStatus` calls of one refresh, in that order.
    pub async fn next_refresh(&mut self) -> (PendingCall, PendingCall) {
        let first = self.next_call().await;
        let second = self.next_call().await;
        let (name, status) = match first.method {
            Method::GetName => (first, second),
            Method::GetStatus => (second, first),
        };
        assert_eq!(name.method, Method::GetName);
        assert_eq!(status.method, Method::GetStatus);
        (name, status)
    }

    pub async fn assert_no_call(&mut self) {
        tokio::time::sleep(SETTLE).await;
        assert!(self.calls.try_recv().is_err(), "unexpected call");
    }

    pub async fn assert_no_connect(&mut self) {
        tokio::time::sleep(SETTLE).await;
        assert!(self.connects.try_recv().is_err(), "unexpected connection");
    }

    /// Connect every pending provider and answer all their calls.
    pub async fn settle_all(&mut self, name: &str, status: i32) {
        loop {
            tokio::time::sleep(SETTLE).await;
            let mut idle = true;
            while let Ok(connect) = self.connects.try_recv() {
                connect.accept();
                idle = false;
            }
            while let Ok(call) = self.calls.try_recv() {
                call.answer(name, status);
                idle = false;
            }
            if idle {
                break;
            }
        }
    }
}

/// Records every notification of a provider or a registry.
pub struct Changes {
    rx: mpsc::UnboundedReceiver<()>,
}

impl Changes {
    pub fn of_provider(provider: &ProviderProxy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        provider.connect_changed(move || {
            let _ = tx.send(());
        });
        Self { rx }
    }

    pub fn of_registry(registry: &ProviderRegistry) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        registry.connect_changed(move || {
            let _ = tx.send(());
        });
        Self { rx }
    }

    pub async fn next(&mut self) {
        timeout(WAIT, self.rx.recv())
            .await
            .expect("no change notification")
            .unwrap();
    }

    /// Let pending tasks run, then count the notifications received so far.
    pub async fn count(&mut self) -> usize {
        tokio::time::sleep(SETTLE).await;
        let mut count = 0;
        while self.rx.try_recv().is_ok() {
            count += 1;
        }
        count
    }
}
