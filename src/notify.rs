//! Keyed change notifications.
//!
//! Entities in this crate are plain values and never call back into the
//! application by themselves.  An owning container that hands out access
//! to a [`Field`](crate::Field) or [`Line`](crate::Line) announces
//! mutations through a [`Hub`]: observers subscribe to a key (for example
//! a channel name) and receive the structured event, instead of parsing
//! detail strings.
//!
//! ```rust
//! use scanprobe::notify::Hub;
//!
//! #[derive(Clone)]
//! struct DataChanged { version: u64 }
//!
//! let mut hub = Hub::new();
//! let seen = std::rc::Rc::new(std::cell::Cell::new(0));
//!
//! let seen2 = seen.clone();
//! hub.subscribe("channel/0", move |e: &DataChanged| seen2.set(e.version));
//!
//! hub.emit("channel/0", &DataChanged { version: 3 });
//! assert_eq!(seen.get(), 3);
//! ```

// ======================================================================
// Subscription - PUBLIC

/// Handle returned by [`Hub::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Subscription(u64);

// ======================================================================
// Hub - PUBLIC

/// Dispatches structured events to subscribers by exact key match.
pub struct Hub<E> {
    next_id: u64,
    subscribers: Vec<(Subscription, String, Box<dyn FnMut(&E)>)>,
}

impl<E> Hub<E> {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            subscribers: Vec::new(),
        }
    }

    /// Subscribes a callback to events emitted under `key`.
    pub fn subscribe<F>(&mut self, key: &str, callback: F) -> Subscription
    where
        F: FnMut(&E) + 'static,
    {
        let id = Subscription(self.next_id);
        self.next_id += 1;
        self.subscribers
            .push((id, key.to_owned(), Box::new(callback)));
        id
    }

    /// Removes a subscription.  Unknown handles are ignored.
    pub fn unsubscribe(&mut self, subscription: Subscription) {
        self.subscribers.retain(|(id, _, _)| *id != subscription);
    }

    /// Delivers an event to every subscriber of `key`.
    pub fn emit(&mut self, key: &str, event: &E) {
        for (_, k, callback) in self.subscribers.iter_mut() {
            if k == key {
                callback(event);
            }
        }
    }

    /// Returns the number of active subscriptions.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Returns `true` when nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl<E> Default for Hub<E> {
    fn default() -> Self {
        Self::new()
    }
}

// ======================================================================
// TESTS
