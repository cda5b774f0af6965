//! In-process change notifications.
//!
//! A [`ChangeEvent`] carries no payload; it only says that authoritative
//! cart or wishlist state moved on the server. Listeners re-fetch.
//!
//! Dispatch is synchronous and in subscription order. There is no buffering:
//! a listener that subscribes after a publish never sees it. The bus is an
//! ordinary value passed to whoever needs it, there is no global instance.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// The two resources that can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeEvent {
    CartUpdated,
    WishlistUpdated,
}

impl ChangeEvent {
    /// Wire-style event name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CartUpdated => "cartUpdated",
            Self::WishlistUpdated => "wishlistUpdated",
        }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChangeEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cartUpdated" => Ok(Self::CartUpdated),
            "wishlistUpdated" => Ok(Self::WishlistUpdated),
            _ => Err(format!("unknown change event: {s}")),
        }
    }
}

type Handler = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

struct Listener {
    id: u64,
    event: ChangeEvent,
    active: Arc<AtomicBool>,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    listeners: Mutex<Vec<Listener>>,
    next_id: AtomicU64,
}

/// Publish/subscribe channel for [`ChangeEvent`]s.
///
/// Cloning is cheap and every clone shares the same listeners.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`.
    ///
    /// The handler runs on the publishing thread, so it must not block.
    /// It stays registered until the returned [`Subscription`] is dropped
    /// or unsubscribed.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, event: ChangeEvent, handler: F) -> Subscription
    where
        F: Fn(ChangeEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Listener {
                id,
                event,
                active: Arc::clone(&active),
                handler: Arc::new(handler),
            });

        tracing::trace!(%event, id, "listener subscribed");
        Subscription {
            bus: Arc::downgrade(&self.inner),
            id,
            active,
        }
    }

    /// Invoke every listener currently subscribed to `event`.
    ///
    /// Returns how many handlers ran.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        // Snapshot so handlers may subscribe or unsubscribe while we dispatch.
        let targets: Vec<(Arc<AtomicBool>, Handler)> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|l| l.event == event)
            .map(|l| (Arc::clone(&l.active), Arc::clone(&l.handler)))
            .collect();

        let mut delivered = 0;
        for (active, handler) in targets {
            if active.load(Ordering::Acquire) {
                handler(event);
                delivered += 1;
            }
        }

        tracing::debug!(%event, delivered, "change event published");
        delivered
    }

    /// Number of live listeners for `event`.
    #[must_use]
    pub fn listener_count(&self, event: ChangeEvent) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|l| l.event == event)
            .count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("cart_listeners", &self.listener_count(ChangeEvent::CartUpdated))
            .field(
                "wishlist_listeners",
                &self.listener_count(ChangeEvent::WishlistUpdated),
            )
            .finish()
    }
}

/// Handle to a registered listener. Dropping it unsubscribes.
///
/// Once this is dropped the handler is never invoked again, even by a
/// publish that is already dispatching.
pub struct Subscription {
    bus: Weak<BusInner>,
    id: u64,
    active: Arc<AtomicBool>,
}

impl Subscription {
    /// Unsubscribe explicitly.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Whether the listener is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(bus) = self.bus.upgrade() {
            bus.listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|l| l.id != self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Handler) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_for = Arc::clone(&log);
        let make = move |tag: &'static str| -> Handler {
            let log = Arc::clone(&log_for);
            Arc::new(move |_| log.lock().unwrap().push(tag))
        };
        (log, make)
    }

    #[test]
    fn test_event_names() {
        assert_eq!(ChangeEvent::CartUpdated.to_string(), "cartUpdated");
        assert_eq!(
            "wishlistUpdated".parse::<ChangeEvent>().unwrap(),
            ChangeEvent::WishlistUpdated
        );
        assert!("ordersUpdated".parse::<ChangeEvent>().is_err());
    }

    #[test]
    fn test_dispatch_in_subscription_order() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let first = make("first");
        let second = make("second");
        let _a = bus.subscribe(ChangeEvent::CartUpdated, move |e| first(e));
        let _b = bus.subscribe(ChangeEvent::CartUpdated, move |e| second(e));

        assert_eq!(bus.publish(ChangeEvent::CartUpdated), 2);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_only_matching_event_is_delivered() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let cart = make("cart");
        let _s = bus.subscribe(ChangeEvent::CartUpdated, move |e| cart(e));

        assert_eq!(bus.publish(ChangeEvent::WishlistUpdated), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dropped_subscription_is_not_invoked() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let cart = make("cart");
        let sub = bus.subscribe(ChangeEvent::CartUpdated, move |e| cart(e));
        assert_eq!(bus.listener_count(ChangeEvent::CartUpdated), 1);

        sub.unsubscribe();
        assert_eq!(bus.listener_count(ChangeEvent::CartUpdated), 0);
        assert_eq!(bus.publish(ChangeEvent::CartUpdated), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let bus = EventBus::new();
        bus.publish(ChangeEvent::CartUpdated);

        let (log, make) = recorder();
        let late = make("late");
        let _s = bus.subscribe(ChangeEvent::CartUpdated, move |e| late(e));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_clones_share_listeners() {
        let bus = EventBus::new();
        let other = bus.clone();
        let (log, make) = recorder();
        let h = make("x");
        let _s = bus.subscribe(ChangeEvent::WishlistUpdated, move |e| h(e));

        assert_eq!(other.publish(ChangeEvent::WishlistUpdated), 1);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_subscription_outliving_bus() {
        let bus = EventBus::new();
        let sub = bus.subscribe(ChangeEvent::CartUpdated, |_| {});
        drop(bus);
        assert!(sub.is_active());
        drop(sub);
    }
}
