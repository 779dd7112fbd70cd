use std::any::Any;
use std::cell::Cell;
use std::fmt::{self, Debug, Display};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use thiserror::Error;
use tracing::warn;

/// Error returned by an observer callback. The bus logs it and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ListenerError {
    message: String,
}

impl ListenerError {
    pub fn new(message: impl Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

pub type ListenerResult = Result<(), ListenerError>;

/// An event that can be routed through an [`EventBus`] by its kind.
pub trait BusEvent {
    type Kind: Copy + PartialEq + Debug;

    fn kind(&self) -> Self::Kind;
}

/// Handle returned by [`EventBus::subscribe`]. Dropping it keeps the listener
/// registered; call [`Subscription::unsubscribe`] to remove it.
#[derive(Debug, Clone)]
pub struct Subscription {
    active: Rc<Cell<bool>>,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        self.active.set(false);
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

type Callback<E> = Box<dyn FnMut(&E) -> ListenerResult>;

struct ListenerEntry<E: BusEvent> {
    kind: E::Kind,
    active: Rc<Cell<bool>>,
    callback: Callback<E>,
}

/// Per-instance observer registry. Listeners for one kind run in
/// registration order; each call is supervised so an error or panic in one
/// never reaches its siblings or the emitter.
pub struct EventBus<E: BusEvent> {
    label: &'static str,
    listeners: Vec<ListenerEntry<E>>,
}

impl<E: BusEvent> EventBus<E> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            listeners: Vec::new(),
        }
    }

    pub fn subscribe<F>(&mut self, kind: E::Kind, callback: F) -> Subscription
    where
        F: FnMut(&E) -> ListenerResult + 'static,
    {
        let active = Rc::new(Cell::new(true));
        self.listeners.push(ListenerEntry {
            kind,
            active: Rc::clone(&active),
            callback: Box::new(callback),
        });
        Subscription { active }
    }

    /// Delivers `event` to every active listener of its kind and returns how
    /// many of them completed without failing.
    pub fn emit(&mut self, event: &E) -> usize {
        self.listeners.retain(|entry| entry.active.get());

        let kind = event.kind();
        let mut delivered = 0;
        for entry in &mut self.listeners {
            if entry.kind != kind || !entry.active.get() {
                continue;
            }
            let callback = &mut entry.callback;
            match supervise(|| callback(event)) {
                Ok(()) => delivered += 1,
                Err(error) => {
                    warn!(bus = self.label, kind = ?kind, error = %error, "listener_failed");
                }
            }
        }
        delivered
    }

    pub fn listener_count(&self, kind: E::Kind) -> usize {
        self.listeners
            .iter()
            .filter(|entry| entry.kind == kind && entry.active.get())
            .count()
    }

    /// Drops every listener; outstanding subscriptions report inactive.
    pub fn clear(&mut self) {
        for entry in self.listeners.drain(..) {
            entry.active.set(false);
        }
    }
}

impl<E: BusEvent> Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("label", &self.label)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Runs `call`, turning both a returned error and a panic into a message.
pub(crate) fn supervise<T, E, F>(call: F) -> Result<T, String>
where
    E: Display,
    F: FnOnce() -> Result<T, E>,
{
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(error.to_string()),
        Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum PingKind {
        Ping,
        Pong,
    }

    #[derive(Debug)]
    struct Ping(PingKind, u32);

    impl BusEvent for Ping {
        type Kind = PingKind;

        fn kind(&self) -> PingKind {
            self.0
        }
    }

    #[test]
    fn listeners_run_in_registration_order_for_matching_kind() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new("test");
        for tag in ["first", "second"] {
            let seen = Rc::clone(&seen);
            bus.subscribe(PingKind::Ping, move |event: &Ping| {
                seen.borrow_mut().push((tag, event.1));
                Ok(())
            });
        }
        let other = Rc::clone(&seen);
        bus.subscribe(PingKind::Pong, move |_: &Ping| {
            other.borrow_mut().push(("pong", 0));
            Ok(())
        });

        assert_eq!(bus.emit(&Ping(PingKind::Ping, 7)), 2);
        assert_eq!(*seen.borrow(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn failing_listener_does_not_stop_siblings() {
        let hits = Rc::new(Cell::new(0));
        let mut bus = EventBus::new("test");
        bus.subscribe(PingKind::Ping, |_: &Ping| Err(ListenerError::new("boom")));
        bus.subscribe(PingKind::Ping, |_: &Ping| -> ListenerResult { panic!("listener panic") });
        let counter = Rc::clone(&hits);
        bus.subscribe(PingKind::Ping, move |_: &Ping| {
            counter.set(counter.get() + 1);
            Ok(())
        });

        assert_eq!(bus.emit(&Ping(PingKind::Ping, 1)), 1);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn unsubscribe_removes_listener() {
        let hits = Rc::new(Cell::new(0));
        let mut bus = EventBus::new("test");
        let counter = Rc::clone(&hits);
        let subscription = bus.subscribe(PingKind::Ping, move |_: &Ping| {
            counter.set(counter.get() + 1);
            Ok(())
        });

        bus.emit(&Ping(PingKind::Ping, 1));
        subscription.unsubscribe();
        bus.emit(&Ping(PingKind::Ping, 2));

        assert_eq!(hits.get(), 1);
        assert_eq!(bus.listener_count(PingKind::Ping), 0);
    }

    #[test]
    fn clear_deactivates_outstanding_subscriptions() {
        let mut bus: EventBus<Ping> = EventBus::new("test");
        let subscription = bus.subscribe(PingKind::Pong, |_| Ok(()));
        bus.clear();

        assert!(!subscription.is_active());
        assert_eq!(bus.listener_count(PingKind::Pong), 0);
    }

    #[test]
    fn supervise_reports_panic_payload() {
        let result: Result<(), String> = supervise(|| -> Result<(), String> { panic!("bad frame") });
        assert_eq!(result, Err("panicked: bad frame".to_string()));
    }
}
