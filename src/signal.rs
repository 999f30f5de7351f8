use crate::extensions::MutexExt;
use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

/// Identifies a handler connected to a [`Signal`], used to disconnect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Arc<dyn Fn() + Send + Sync>;

/// A list of callbacks run every time something changes.
///
/// Handlers are called synchronously, in connection order, by the task that emits.
/// They may connect or disconnect handlers (including themselves) while running.
#[derive(Default)]
pub struct Signal {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(HandlerId, Handler)>>,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, handler: impl Fn() + Send + Sync + 'static) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.acquire().push((id, Arc::new(handler)));
        id
    }

    /// Return whether the handler was connected.
    pub fn disconnect(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.acquire();
        let count = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != count
    }

    pub fn disconnect_all(&self) {
        self.handlers.acquire().clear();
    }

    pub fn emit(&self) {
        // snapshot so handlers can touch the list without deadlocking
        let handlers: Vec<_> = self
            .handlers
            .acquire()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in handlers {
            handler();
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.acquire().len()
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn emits_to_every_handler() {
        let signal = Signal::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = Arc::clone(&count);
            signal.connect(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        signal.emit();
        signal.emit();

        assert_eq!(count.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn disconnected_handler_is_not_called() {
        let signal = Signal::new();
        let count = Arc::new(AtomicUsize::new(0));

        let id = {
            let count = Arc::clone(&count);
            signal.connect(move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert!(signal.disconnect(id));
        assert!(!signal.disconnect(id));
        signal.emit();

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(signal.handler_count(), 0);
    }

    #[test]
    fn handler_can_connect_while_emitting() {
        let signal = Arc::new(Signal::new());
        let inner = Arc::clone(&signal);
        signal.connect(move || {
            inner.connect(|| {});
        });

        signal.emit();
        assert_eq!(signal.handler_count(), 2);
    }
}
