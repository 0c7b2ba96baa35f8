/// file: src/registry.rs
/// description: Listener registry and isolated event dispatch
use crate::events::{ChannelEvent, EventKind};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, trace, warn};

/// A subscriber callback. Identity is the `Arc` allocation, so keep a clone
/// around to unregister it later.
pub type Listener = Arc<dyn Fn(&ChannelEvent) -> anyhow::Result<()> + Send + Sync>;

pub fn listener<F>(callback: F) -> Listener
where
    F: Fn(&ChannelEvent) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(callback)
}

#[derive(Default)]
pub struct EventRegistry {
    listeners: HashMap<EventKind, Vec<Listener>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `listener`; registering the same listener twice runs it twice.
    pub fn on(&mut self, kind: EventKind, listener: Listener) {
        self.listeners.entry(kind).or_default().push(listener);
    }

    /// Removes the first registration of `listener` for `kind`.
    /// Returns false when nothing matched.
    pub fn off(&mut self, kind: EventKind, listener: &Listener) -> bool {
        let Some(registered) = self.listeners.get_mut(&kind) else {
            return false;
        };
        match registered.iter().position(|l| Arc::ptr_eq(l, listener)) {
            Some(index) => {
                registered.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    fn snapshot(&self, kind: EventKind) -> Vec<Listener> {
        self.listeners.get(&kind).cloned().unwrap_or_default()
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in EventKind::ALL {
            map.entry(&kind, &self.listener_count(kind));
        }
        map.finish()
    }
}

pub type SharedRegistry = Arc<Mutex<EventRegistry>>;

pub fn lock(registry: &Mutex<EventRegistry>) -> std::sync::MutexGuard<'_, EventRegistry> {
    // A listener cannot run while the lock is held, so a poisoned lock still
    // holds a consistent map.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Runs every listener registered for the event's kind, in registration order.
///
/// The registry lock is released before the first listener runs, so listeners
/// may register or remove listeners; such changes apply from the next event.
/// A listener that returns an error or panics is logged and skipped.
pub fn dispatch(registry: &Mutex<EventRegistry>, event: &ChannelEvent) -> DispatchReport {
    let kind = event.kind();
    let listeners = lock(registry).snapshot(kind);
    let mut report = DispatchReport::default();

    for listener in listeners {
        match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
            Ok(Ok(())) => report.delivered += 1,
            Ok(Err(e)) => {
                report.failed += 1;
                warn!(event = %kind, error = %e, "Event listener failed");
            }
            Err(payload) => {
                report.failed += 1;
                error!(
                    event = %kind,
                    panic = panic_message(payload.as_ref()),
                    "Event listener panicked"
                );
            }
        }
    }

    if report.failed > 0 {
        crate::monitoring::LISTENER_FAILURE_COUNTER.increment(report.failed as u64);
    }
    trace!(event = %kind, delivered = report.delivered, failed = report.failed, "Dispatched");
    report
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
