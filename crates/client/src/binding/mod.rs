//! View state synchronization.
//!
//! A [`ViewBinding`] keeps one view's copy of a remote resource in step with
//! the server. The lifecycle is the same for every resource:
//!
//! 1. **Mount** - consult the session; anonymous or expired sessions show
//!    empty data without a request, otherwise fetch.
//! 2. **Subscribed** - every change event for the resource triggers exactly
//!    one re-fetch, preceded by the same session check.
//! 3. **Route change** - [`ViewBinding::route_changed`] re-runs the mount
//!    logic when the route differs from the last one seen.
//! 4. **Unmount** - the event subscription is dropped and nothing more is
//!    written, even if a fetch is still in flight.
//!
//! Triggers are processed one at a time by a driver task owned by the mount.
//! A driver whose mount has ended stops without fetching, even with triggers
//! still queued. Every fetch takes a ticket and only the newest ticket may
//! write, so a slow response can never overwrite a newer one.
//!
//! State is published through a [`tokio::sync::watch`] channel.

mod resources;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use secrecy::ExposeSecret;
use tokio::sync::{mpsc, watch};

use tienda_core::{Cart, ProductId, ProductRef, Wishlist};

use crate::api::{QuantityChange, StoreClient};
use crate::error::{ClientError, Notice};
use crate::events::{ChangeEvent, EventBus, Subscription};
use crate::session::SessionStore;
use crate::token;

pub use resources::{CartResource, WishlistResource};

/// A remote collection a view can display.
pub trait Resource: Send + Sync + 'static {
    /// The authoritative value; `Default` is what anonymous views show.
    type State: Clone + Default + Send + Sync + 'static;

    /// The change event that invalidates this resource.
    const EVENT: ChangeEvent;

    /// Short name for logs.
    const NAME: &'static str;

    /// Fetch the authoritative state.
    fn fetch(&self) -> impl Future<Output = Result<Self::State, ClientError>> + Send;
}

/// Where a view is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Never mounted.
    #[default]
    Unmounted,
    /// No usable session; data is empty and no request was made.
    Anonymous,
    /// A fetch is in flight; data is the last known value.
    Loading,
    /// Data matches the server as of the last fetch.
    Ready,
    /// The last fetch failed; data is the last confirmed value.
    Failed,
}

/// What a view renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState<T> {
    pub data: T,
    pub phase: Phase,
    /// Transient message for the user, if any.
    pub notice: Option<Notice>,
    /// Set when the user should be sent to the login screen.
    pub login_required: bool,
    /// Bumped on every write.
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Mount,
    Event,
    Route,
    Revert,
    /// A mutation succeeded without announcing a change.
    Refresh,
}

enum Gate {
    Open,
    Anonymous { expired: bool },
}

struct Mounted {
    trigger: mpsc::UnboundedSender<Trigger>,
    _subscription: Subscription,
}

#[derive(Default)]
struct Lifecycle {
    epoch: u64,
    mounted: Option<Mounted>,
    route: Option<String>,
}

struct BindingInner<R: Resource> {
    resource: R,
    session: Arc<dyn SessionStore>,
    events: EventBus,
    state: watch::Sender<ViewState<R::State>>,
    /// Last value the server confirmed; restored when a mutation fails.
    confirmed: Mutex<R::State>,
    lifecycle: Mutex<Lifecycle>,
    tickets: AtomicU64,
    /// Change events delivered to this binding while mounted.
    heard: Arc<AtomicU64>,
}

/// Keeps a view's copy of a [`Resource`] synchronized with the server.
///
/// Dropping the binding unmounts it.
pub struct ViewBinding<R: Resource> {
    inner: Arc<BindingInner<R>>,
}

impl<R: Resource> ViewBinding<R> {
    /// Create an unmounted binding.
    #[must_use]
    pub fn new(resource: R, session: Arc<dyn SessionStore>, events: EventBus) -> Self {
        let (state, _) = watch::channel(ViewState::default());
        Self {
            inner: Arc::new(BindingInner {
                resource,
                session,
                events,
                state,
                confirmed: Mutex::new(R::State::default()),
                lifecycle: Mutex::new(Lifecycle::default()),
                tickets: AtomicU64::new(0),
                heard: Arc::new(AtomicU64::new(0)),
            }),
        }
    }

    /// Subscribe to the resource's change event and run the mount logic.
    ///
    /// Mounting an already mounted binding does nothing.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn mount(&self) {
        let mut lifecycle = self.inner.lifecycle();
        if lifecycle.mounted.is_some() {
            return;
        }
        lifecycle.epoch += 1;
        let epoch = lifecycle.epoch;

        let (tx, rx) = mpsc::unbounded_channel();
        let on_event = tx.clone();
        let heard = Arc::clone(&self.inner.heard);
        let subscription = self.inner.events.subscribe(R::EVENT, move |_| {
            heard.fetch_add(1, Ordering::SeqCst);
            // The receiver is gone only after unmount, when this handler is
            // already unsubscribed.
            let _ = on_event.send(Trigger::Event);
        });
        tokio::spawn(drive(Arc::downgrade(&self.inner), epoch, rx));
        let _ = tx.send(Trigger::Mount);

        lifecycle.mounted = Some(Mounted {
            trigger: tx,
            _subscription: subscription,
        });
        tracing::debug!(resource = R::NAME, epoch, "view mounted");
    }

    /// Stop listening. In-flight fetches finish but their results are
    /// discarded.
    pub fn unmount(&self) {
        let mounted = {
            let mut lifecycle = self.inner.lifecycle();
            lifecycle.epoch += 1;
            lifecycle.mounted.take()
        };
        if mounted.is_some() {
            tracing::debug!(resource = R::NAME, "view unmounted");
        }
        drop(mounted);
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner.lifecycle().mounted.is_some()
    }

    /// Report the active route.
    ///
    /// The first route reported is the baseline. Any later, different route
    /// re-runs the mount logic on a mounted binding, since navigation (for
    /// example back from the login page) may have changed the session.
    /// Returns whether a re-sync was scheduled.
    pub fn route_changed(&self, route: &str) -> bool {
        let mut lifecycle = self.inner.lifecycle();
        let previous = lifecycle.route.replace(route.to_string());
        match previous {
            Some(previous) if previous != route => lifecycle
                .mounted
                .as_ref()
                .is_some_and(|m| m.trigger.send(Trigger::Route).is_ok()),
            _ => false,
        }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> ViewState<R::State> {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ViewState<R::State>> {
        self.inner.state.subscribe()
    }

    /// Clear the notice and the login flag after the view has shown them.
    pub fn dismiss_notice(&self) {
        self.inner.write_if_mounted(|state, _| {
            state.notice = None;
            state.login_required = false;
        });
    }

    /// Apply `optimistic` to the displayed data, then run `operation`.
    ///
    /// On success the operation's change event re-fetches the authoritative
    /// state; if it published none, a re-fetch is scheduled here instead.
    /// On failure the last confirmed state is restored, the error's notice
    /// is shown and a re-fetch is scheduled.
    ///
    /// Any fetch in flight when the mutation starts is discarded.
    ///
    /// # Errors
    ///
    /// Returns the operation's error.
    pub async fn mutate<F, Fut, T>(&self, optimistic: F, operation: Fut) -> Result<T, ClientError>
    where
        F: FnOnce(&mut R::State),
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let heard_before = self.inner.heard.load(Ordering::SeqCst);
        self.inner.tickets.fetch_add(1, Ordering::SeqCst);
        self.inner
            .write_if_mounted(|state, _| optimistic(&mut state.data));

        match operation.await {
            Ok(value) => {
                if self.inner.heard.load(Ordering::SeqCst) == heard_before {
                    self.inner.trigger(Trigger::Refresh);
                }
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(resource = R::NAME, error = %e, "mutation failed, reverting");
                let notice = e.notice();
                let login_required = e.requires_login();
                self.inner.write_if_mounted(|state, confirmed| {
                    state.data = confirmed.clone();
                    state.notice = Some(notice);
                    state.login_required |= login_required;
                });
                self.inner.trigger(Trigger::Revert);
                Err(e)
            }
        }
    }
}

impl ViewBinding<CartResource> {
    /// Binding for the cart of `client`'s session.
    #[must_use]
    pub fn cart(client: &StoreClient) -> Self {
        Self::new(
            CartResource::new(client.clone()),
            Arc::clone(client.session()),
            client.events().clone(),
        )
    }

    /// Add `quantity` units of a product, optimistically. The product
    /// snapshot is what the view shows until the server answers.
    ///
    /// # Errors
    ///
    /// Returns the request error after reverting the view.
    pub async fn add(&self, product: &ProductRef, quantity: u32) -> Result<(), ClientError> {
        let client = self.inner.resource.client();
        self.mutate(
            |cart: &mut Cart| cart.add_local(product.clone(), quantity),
            client.add_to_cart(&product.id, quantity),
        )
        .await
    }

    /// Add one unit, optimistically.
    ///
    /// # Errors
    ///
    /// Returns the request error after reverting the view.
    pub async fn increment(&self, product_id: &ProductId) -> Result<(), ClientError> {
        let client = self.inner.resource.client();
        self.mutate(
            |cart: &mut Cart| cart.apply_delta(product_id, 1),
            client.increment(product_id),
        )
        .await
    }

    /// Remove one unit, optimistically. A displayed quantity of one removes
    /// the line.
    ///
    /// # Errors
    ///
    /// Returns the request error after reverting the view.
    pub async fn decrement(&self, product_id: &ProductId) -> Result<QuantityChange, ClientError> {
        let client = self.inner.resource.client();
        let current = self.inner.state.borrow().data.quantity_of(product_id);
        self.mutate(
            |cart: &mut Cart| cart.apply_delta(product_id, -1),
            client.decrement_from(product_id, current),
        )
        .await
    }

    /// Remove a line, optimistically.
    ///
    /// # Errors
    ///
    /// Returns the request error after reverting the view.
    pub async fn remove(&self, product_id: &ProductId) -> Result<(), ClientError> {
        let client = self.inner.resource.client();
        self.mutate(
            |cart: &mut Cart| cart.remove_local(product_id),
            client.remove_from_cart(product_id),
        )
        .await
    }
}

impl ViewBinding<WishlistResource> {
    /// Binding for the wishlist of `client`'s session.
    #[must_use]
    pub fn wishlist(client: &StoreClient) -> Self {
        Self::new(
            WishlistResource::new(client.clone()),
            Arc::clone(client.session()),
            client.events().clone(),
        )
    }

    /// Flip a product's membership, optimistically. Returns the new state.
    ///
    /// # Errors
    ///
    /// Returns the request error after reverting the view.
    pub async fn toggle(&self, product: &ProductRef) -> Result<bool, ClientError> {
        let client = self.inner.resource.client();
        let currently_in = self.inner.state.borrow().data.contains(&product.id);
        self.mutate(
            |wishlist: &mut Wishlist| {
                if currently_in {
                    wishlist.remove_local(&product.id);
                } else {
                    wishlist.insert_local(product.clone());
                }
            },
            client.toggle_wishlist(&product.id, currently_in),
        )
        .await
    }
}

impl<R: Resource> Drop for ViewBinding<R> {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl<R: Resource> std::fmt::Debug for ViewBinding<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("ViewBinding")
            .field("resource", &R::NAME)
            .field("phase", &state.phase)
            .field("version", &state.version)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Process one mount's triggers in order until it is unmounted.
async fn drive<R: Resource>(
    binding: Weak<BindingInner<R>>,
    epoch: u64,
    mut triggers: mpsc::UnboundedReceiver<Trigger>,
) {
    while let Some(trigger) = triggers.recv().await {
        let Some(inner) = binding.upgrade() else {
            break;
        };
        if !inner.sync(epoch, trigger).await {
            tracing::debug!(resource = R::NAME, epoch, "mount ended, stopping driver");
            break;
        }
    }
}

impl<R: Resource> BindingInner<R> {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn trigger(&self, trigger: Trigger) {
        if let Some(mounted) = &self.lifecycle().mounted {
            let _ = mounted.trigger.send(trigger);
        }
    }

    fn gate(&self) -> Gate {
        let Some(token) = self.session.token() else {
            return Gate::Anonymous { expired: false };
        };
        let expiry = token::expiry(token.expose_secret(), chrono::Utc::now());
        if expiry.is_usable() {
            Gate::Open
        } else {
            tracing::debug!(resource = R::NAME, ?expiry, "token expired, skipping fetch");
            Gate::Anonymous { expired: true }
        }
    }

    /// Take a ticket for `epoch`, or `None` once that mount has ended.
    ///
    /// The ticket is drawn under the lifecycle lock, so a later mount always
    /// outranks every ticket of an earlier one.
    fn begin(&self, epoch: u64) -> Option<u64> {
        let lifecycle = self.lifecycle();
        if lifecycle.epoch != epoch || lifecycle.mounted.is_none() {
            return None;
        }
        Some(self.tickets.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// One run of the mount logic. Returns `false` once `epoch` is no
    /// longer mounted; nothing is fetched in that case.
    async fn sync(&self, epoch: u64, trigger: Trigger) -> bool {
        let Some(ticket) = self.begin(epoch) else {
            return false;
        };
        tracing::debug!(resource = R::NAME, ?trigger, ticket, "syncing view");

        if let Gate::Anonymous { expired } = self.gate() {
            self.write(epoch, ticket, |state, confirmed| {
                *confirmed = R::State::default();
                state.data = R::State::default();
                state.phase = Phase::Anonymous;
                if trigger == Trigger::Mount {
                    state.notice = None;
                    state.login_required = expired;
                } else {
                    // A rejection seen earlier still stands.
                    state.login_required |= expired;
                }
            });
            return true;
        }

        self.write(epoch, ticket, |state, _| {
            state.phase = Phase::Loading;
            if trigger == Trigger::Mount {
                state.notice = None;
            }
        });

        let result = self.resource.fetch().await;

        let written = match result {
            Ok(data) => self.write(epoch, ticket, |state, confirmed| {
                confirmed.clone_from(&data);
                state.data = data;
                state.phase = Phase::Ready;
                state.login_required = false;
            }),
            Err(e) if e.requires_login() => self.write(epoch, ticket, |state, confirmed| {
                *confirmed = R::State::default();
                state.data = R::State::default();
                state.phase = Phase::Anonymous;
                state.login_required = true;
                state.notice = Some(e.notice());
            }),
            Err(e) => {
                tracing::warn!(resource = R::NAME, error = %e, "fetch failed");
                self.write(epoch, ticket, |state, confirmed| {
                    state.data = confirmed.clone();
                    state.phase = Phase::Failed;
                    state.notice = Some(e.notice());
                })
            }
        };
        if !written {
            tracing::debug!(resource = R::NAME, ticket, "discarding stale fetch result");
        }
        true
    }

    /// Write if `epoch` is still mounted and `ticket` is the newest.
    fn write<F>(&self, epoch: u64, ticket: u64, f: F) -> bool
    where
        F: FnOnce(&mut ViewState<R::State>, &mut R::State),
    {
        let lifecycle = self.lifecycle();
        if lifecycle.epoch != epoch
            || lifecycle.mounted.is_none()
            || self.tickets.load(Ordering::SeqCst) != ticket
        {
            return false;
        }
        self.apply(f);
        true
    }

    /// Write if mounted, regardless of tickets.
    fn write_if_mounted<F>(&self, f: F)
    where
        F: FnOnce(&mut ViewState<R::State>, &mut R::State),
    {
        let lifecycle = self.lifecycle();
        if lifecycle.mounted.is_some() {
            self.apply(f);
        }
    }

    fn apply<F>(&self, f: F)
    where
        F: FnOnce(&mut ViewState<R::State>, &mut R::State),
    {
        let mut confirmed = self.confirmed.lock().unwrap_or_else(PoisonError::into_inner);
        self.state.send_modify(|state| {
            f(state, &mut *confirmed);
            state.version += 1;
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use tokio::sync::Notify;

    use super::*;
    use crate::session::{MemorySessionStore, Session};

    const WAIT: Duration = Duration::from_secs(2);

    #[derive(Clone, Default)]
    struct FakeResource {
        calls: Arc<AtomicUsize>,
        value: Arc<AtomicUsize>,
        fail_with_401: Arc<AtomicBool>,
        gate: Option<Arc<Notify>>,
        latency: Option<Duration>,
    }

    impl Resource for FakeResource {
        type State = usize;
        const EVENT: ChangeEvent = ChangeEvent::CartUpdated;
        const NAME: &'static str = "fake";

        fn fetch(&self) -> impl Future<Output = Result<usize, ClientError>> + Send {
            let this = self.clone();
            async move {
                this.calls.fetch_add(1, Ordering::SeqCst);
                if let Some(gate) = &this.gate {
                    gate.notified().await;
                }
                if let Some(latency) = this.latency {
                    tokio::time::sleep(latency).await;
                }
                if this.fail_with_401.load(Ordering::SeqCst) {
                    return Err(ClientError::Unauthorized);
                }
                Ok(this.value.load(Ordering::SeqCst))
            }
        }
    }

    fn binding(resource: &FakeResource, token: Option<&str>) -> (ViewBinding<FakeResource>, EventBus) {
        let store = token.map_or_else(MemorySessionStore::new, |t| {
            MemorySessionStore::with_session(Session::new(t))
        });
        let events = EventBus::new();
        let binding = ViewBinding::new(resource.clone(), Arc::new(store), events.clone());
        (binding, events)
    }

    async fn wait_for_phase(binding: &ViewBinding<FakeResource>, phase: Phase) -> ViewState<usize> {
        let mut rx = binding.watch();
        tokio::time::timeout(WAIT, rx.wait_for(|s| s.phase == phase))
            .await
            .unwrap()
            .unwrap()
            .clone()
    }

    async fn wait_for_calls(resource: &FakeResource, n: usize) {
        tokio::time::timeout(WAIT, async {
            while resource.calls.load(Ordering::SeqCst) < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    fn expired_jwt() -> String {
        format!(
            "h.{}.s",
            URL_SAFE_NO_PAD.encode(r#"{"sub":"u1","exp":1000000000}"#)
        )
    }

    #[tokio::test]
    async fn test_anonymous_mount_makes_no_calls() {
        let resource = FakeResource::default();
        let (binding, _events) = binding(&resource, None);
        binding.mount();

        let state = wait_for_phase(&binding, Phase::Anonymous).await;
        assert_eq!(state.data, 0);
        assert!(!state.login_required);
        assert_eq!(resource.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_token_skips_fetch_and_requests_login() {
        let resource = FakeResource::default();
        let (binding, _events) = binding(&resource, Some(&expired_jwt()));
        binding.mount();

        let state = wait_for_phase(&binding, Phase::Anonymous).await;
        assert!(state.login_required);
        assert_eq!(resource.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mount_fetches_once() {
        let resource = FakeResource::default();
        resource.value.store(3, Ordering::SeqCst);
        let (binding, _events) = binding(&resource, Some("opaque"));
        binding.mount();
        binding.mount();

        let state = wait_for_phase(&binding, Phase::Ready).await;
        assert_eq!(state.data, 3);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(resource.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_one_fetch_per_publish() {
        let resource = FakeResource::default();
        let (binding, events) = binding(&resource, Some("opaque"));
        binding.mount();
        wait_for_phase(&binding, Phase::Ready).await;

        events.publish(ChangeEvent::CartUpdated);
        events.publish(ChangeEvent::CartUpdated);
        events.publish(ChangeEvent::WishlistUpdated);

        wait_for_calls(&resource, 3).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(resource.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unmounted_view_is_not_invoked() {
        let resource = FakeResource::default();
        let (binding, events) = binding(&resource, Some("opaque"));
        binding.mount();
        wait_for_phase(&binding, Phase::Ready).await;

        binding.unmount();
        assert!(!binding.is_mounted());
        assert_eq!(events.publish(ChangeEvent::CartUpdated), 0);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(resource.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropping_binding_unsubscribes() {
        let resource = FakeResource::default();
        let (binding, events) = binding(&resource, Some("opaque"));
        binding.mount();
        assert_eq!(events.listener_count(ChangeEvent::CartUpdated), 1);

        drop(binding);
        assert_eq!(events.listener_count(ChangeEvent::CartUpdated), 0);
    }

    #[tokio::test]
    async fn test_in_flight_fetch_is_discarded_after_unmount() {
        let gate = Arc::new(Notify::new());
        let resource = FakeResource {
            gate: Some(Arc::clone(&gate)),
            ..FakeResource::default()
        };
        resource.value.store(7, Ordering::SeqCst);
        let (binding, _events) = binding(&resource, Some("opaque"));
        binding.mount();

        wait_for_phase(&binding, Phase::Loading).await;
        wait_for_calls(&resource, 1).await;
        binding.unmount();
        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let state = binding.state();
        assert_eq!(state.phase, Phase::Loading);
        assert_eq!(state.data, 0);
    }

    #[tokio::test]
    async fn test_route_change_resyncs() {
        let resource = FakeResource::default();
        let (binding, _events) = binding(&resource, Some("opaque"));
        binding.mount();
        wait_for_phase(&binding, Phase::Ready).await;

        assert!(!binding.route_changed("/"));
        assert!(!binding.route_changed("/"));
        assert!(binding.route_changed("/cart"));

        wait_for_calls(&resource, 2).await;
    }

    #[tokio::test]
    async fn test_rejected_token_shows_anonymous_and_requests_login() {
        let resource = FakeResource::default();
        resource.fail_with_401.store(true, Ordering::SeqCst);
        let (binding, _events) = binding(&resource, Some("opaque"));
        binding.mount();

        let state = wait_for_phase(&binding, Phase::Anonymous).await;
        assert!(state.login_required);
        assert!(state.notice.is_some());
    }

    #[tokio::test]
    async fn test_failed_mutation_reverts_and_refetches() {
        let resource = FakeResource::default();
        resource.value.store(5, Ordering::SeqCst);
        let (binding, _events) = binding(&resource, Some("opaque"));
        binding.mount();
        wait_for_phase(&binding, Phase::Ready).await;

        let result: Result<(), ClientError> = binding
            .mutate(
                |n| *n = 4,
                async {
                    Err(ClientError::NetworkFailure {
                        message: "connection reset".to_string(),
                        timed_out: false,
                    })
                },
            )
            .await;

        assert!(result.is_err());
        let state = binding.state();
        assert_eq!(state.data, 5);
        assert!(state.notice.is_some());
        wait_for_calls(&resource, 2).await;
    }

    #[tokio::test]
    async fn test_optimistic_edit_is_visible_before_operation_completes() {
        let resource = FakeResource::default();
        resource.value.store(5, Ordering::SeqCst);
        let (binding, _events) = binding(&resource, Some("opaque"));
        binding.mount();
        wait_for_phase(&binding, Phase::Ready).await;

        let rx = binding.watch();
        binding
            .mutate(
                |n| *n = 6,
                async {
                    assert_eq!(rx.borrow().data, 6);
                    Ok(())
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_remount_ignores_triggers_queued_before_unmount() {
        let resource = FakeResource {
            latency: Some(Duration::from_millis(50)),
            ..FakeResource::default()
        };
        resource.value.store(42, Ordering::SeqCst);
        let (binding, events) = binding(&resource, Some("opaque"));
        binding.mount();
        wait_for_phase(&binding, Phase::Ready).await;

        events.publish(ChangeEvent::CartUpdated);
        events.publish(ChangeEvent::CartUpdated);
        wait_for_calls(&resource, 2).await;
        binding.unmount();
        let at_unmount = resource.calls.load(Ordering::SeqCst);

        binding.mount();
        let remounted_at = binding.state().version;
        let mut rx = binding.watch();
        let state = tokio::time::timeout(
            WAIT,
            rx.wait_for(|s| s.version > remounted_at && s.phase == Phase::Ready),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(state.data, 42);

        tokio::time::sleep(Duration::from_millis(200)).await;
        // Only the new mount fetched; the old driver stopped with its queue.
        assert_eq!(resource.calls.load(Ordering::SeqCst), at_unmount + 1);
        assert_eq!(binding.state().phase, Phase::Ready);
    }

    #[tokio::test]
    async fn test_silent_mutation_schedules_refetch() {
        let resource = FakeResource::default();
        resource.value.store(5, Ordering::SeqCst);
        let (binding, _events) = binding(&resource, Some("opaque"));
        binding.mount();
        wait_for_phase(&binding, Phase::Ready).await;

        resource.value.store(9, Ordering::SeqCst);
        binding
            .mutate(|n| *n = 8, async { Ok::<_, ClientError>(()) })
            .await
            .unwrap();

        let mut rx = binding.watch();
        let state = tokio::time::timeout(
            WAIT,
            rx.wait_for(|s| s.phase == Phase::Ready && s.data == 9),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(state.data, 9);
        assert_eq!(resource.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_announced_mutation_refetches_once() {
        let resource = FakeResource::default();
        let (binding, events) = binding(&resource, Some("opaque"));
        binding.mount();
        wait_for_phase(&binding, Phase::Ready).await;

        let bus = events.clone();
        binding
            .mutate(|n| *n = 1, async move {
                bus.publish(ChangeEvent::CartUpdated);
                Ok::<_, ClientError>(())
            })
            .await
            .unwrap();

        wait_for_calls(&resource, 2).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(resource.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_login_flag_survives_later_anonymous_sync() {
        let resource = FakeResource::default();
        resource.fail_with_401.store(true, Ordering::SeqCst);
        let store = Arc::new(MemorySessionStore::with_session(Session::new("opaque")));
        let events = EventBus::new();
        let session: Arc<dyn SessionStore> = store.clone();
        let binding = ViewBinding::new(resource.clone(), session, events.clone());
        binding.mount();
        let state = wait_for_phase(&binding, Phase::Anonymous).await;
        assert!(state.login_required);

        // The client clears the session and announces it after a 401.
        store.clear_session().unwrap();
        events.publish(ChangeEvent::CartUpdated);
        let mut rx = binding.watch();
        let seen = state.version;
        let state = tokio::time::timeout(WAIT, rx.wait_for(|s| s.version > seen))
            .await
            .unwrap()
            .unwrap()
            .clone();

        assert_eq!(state.phase, Phase::Anonymous);
        assert!(state.login_required);
        assert_eq!(resource.calls.load(Ordering::SeqCst), 1);
    }
}
