//! Publish/subscribe for component events.
//!
//! Every component that emits events owns its own [`EventEmitter`]; there is
//! no process-wide bus. Subscribers choose how many deliveries they want:
//! unlimited, exactly one, or at most N. A subscription is dropped as soon as
//! its delivery count is exhausted.

use std::fmt;

/// An event that can be published through an [`EventEmitter`].
pub trait Event {
    /// Discriminant used to match subscribers.
    type Kind: Copy + Eq + fmt::Debug;

    /// The kind of this event.
    fn kind(&self) -> Self::Kind;
}

/// How many times a subscriber is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryLimit {
    /// Called for every matching event.
    Unlimited,
    /// Called at most this many times, then unsubscribed.
    Limited(usize),
}

/// Callback type for event subscribers.
pub type EventCallback<E> = Box<dyn FnMut(&E) + Send>;

struct Subscription<E: Event> {
    kind: E::Kind,
    callback: EventCallback<E>,
    delivery: DeliveryLimit,
    calls: usize,
}

impl<E: Event> Subscription<E> {
    fn is_exhausted(&self) -> bool {
        match self.delivery {
            DeliveryLimit::Unlimited => false,
            DeliveryLimit::Limited(max) => self.calls >= max,
        }
    }
}

/// Dispatches events to subscribers registered by kind.
pub struct EventEmitter<E: Event> {
    subscriptions: Vec<Subscription<E>>,
}

impl<E: Event> EventEmitter<E> {
    /// Create an emitter with no subscribers.
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
        }
    }

    /// Subscribe for every event of `kind`.
    pub fn on<F>(&mut self, kind: E::Kind, callback: F) -> &mut Self
    where
        F: FnMut(&E) + Send + 'static,
    {
        self.subscribe(kind, DeliveryLimit::Unlimited, callback)
    }

    /// Subscribe for the next event of `kind` only.
    pub fn once<F>(&mut self, kind: E::Kind, callback: F) -> &mut Self
    where
        F: FnMut(&E) + Send + 'static,
    {
        self.subscribe(kind, DeliveryLimit::Limited(1), callback)
    }

    /// Subscribe with an explicit delivery count.
    pub fn subscribe<F>(&mut self, kind: E::Kind, delivery: DeliveryLimit, callback: F) -> &mut Self
    where
        F: FnMut(&E) + Send + 'static,
    {
        if delivery == DeliveryLimit::Limited(0) {
            return self;
        }
        self.subscriptions.push(Subscription {
            kind,
            callback: Box::new(callback),
            delivery,
            calls: 0,
        });
        self
    }

    /// Deliver an event to every matching subscriber.
    ///
    /// Returns the number of callbacks invoked.
    pub fn trigger(&mut self, event: &E) -> usize {
        let kind = event.kind();
        let mut invoked = 0;

        for subscription in &mut self.subscriptions {
            if subscription.kind == kind && !subscription.is_exhausted() {
                (subscription.callback)(event);
                subscription.calls += 1;
                invoked += 1;
            }
        }

        self.subscriptions.retain(|s| !s.is_exhausted());
        invoked
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether there are no live subscriptions.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Drop every subscription for `kind`.
    pub fn clear(&mut self, kind: E::Kind) {
        self.subscriptions.retain(|s| s.kind != kind);
    }
}

impl<E: Event> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field(
                "subscriptions",
                &self.subscriptions.iter().map(|s| s.kind).collect::<Vec<_>>(),
            )
            .finish()
    }
}
