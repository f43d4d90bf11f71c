use std::any::Any;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use log::debug;
use log::trace;

use super::Event;
use super::EventCategory;
use super::subscription::Decorator;
use super::subscription::Handler;
use super::subscription::Receiver;
use super::subscription::Subscription;
use super::subscription::SubscriptionId;
use super::subscription::bind_dyn;
use super::subscription::bind_typed;
use super::subscription::origin_of;
use crate::context::ContextProvider;
use crate::context::Sender;
use crate::error::DispatchError;

type Caster = fn(&dyn Any) -> Option<&dyn Event>;

fn cast<E: Event>(value: &dyn Any) -> Option<&dyn Event> {
    value.downcast_ref::<E>().map(|event| event as &dyn Event)
}

struct CatalogEntry {
    category: EventCategory,
    cast: Caster,
}

struct Adapter<S> {
    id: SubscriptionId,
    origin: usize,
    receiver: Receiver<S>,
}

struct RoutingTable<S> {
    category: EventCategory,
    receivers: HashMap<S, Vec<Adapter<S>>>,
}

impl<S: Sender> RoutingTable<S> {
    fn new(category: EventCategory) -> Self {
        Self {
            category,
            receivers: HashMap::new(),
        }
    }

    /// Removes every adapter under `sender` matching `pred`, returning how many went.
    fn remove_where(&mut self, sender: &S, pred: impl Fn(&Adapter<S>) -> bool) -> usize {
        let Some(adapters) = self.receivers.get_mut(sender) else {
            return 0;
        };
        let before = adapters.len();
        adapters.retain(|adapter| !pred(adapter));
        let removed = before - adapters.len();
        if adapters.is_empty() {
            self.receivers.remove(sender);
        }
        removed
    }
}

fn undeclared(id: TypeId) -> DispatchError {
    DispatchError::InvalidEventType {
        found: format!("{:?} is not a declared event category", id),
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Synchronous publish/subscribe registry scoped by sender.
///
/// Handlers are stored per (event category, sender) and invoked on the
/// dispatching thread in subscription order. A dispatch only reaches handlers
/// registered for exactly the resolved sender; there is no wildcard scope.
///
/// ## Usage
///
/// ```rust
/// use scoped_events::event::dispatcher::EventDispatcher;
/// use scoped_events::impl_event;
///
/// #[derive(Debug)]
/// struct OrderCreated;
/// impl_event!(OrderCreated);
///
/// let dispatcher = EventDispatcher::new(Some("shop"));
/// let subscription = dispatcher
///     .subscribe(|_: &OrderCreated| Ok(()), None)
///     .unwrap();
///
/// dispatcher.dispatch(&OrderCreated, None).unwrap();
/// assert!(dispatcher.unsubscribe(&subscription));
/// ```
pub struct EventDispatcher<S: Sender> {
    tables: RwLock<HashMap<TypeId, RoutingTable<S>>>,
    catalog: RwLock<HashMap<TypeId, CatalogEntry>>,
    default_sender: RwLock<Option<S>>,
    context: Option<Arc<dyn ContextProvider<S>>>,
    next_id: AtomicU64,
}

impl<S: Sender> EventDispatcher<S> {
    pub fn new(default_sender: Option<S>) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            catalog: RwLock::new(HashMap::new()),
            default_sender: RwLock::new(default_sender),
            context: None,
            next_id: AtomicU64::new(1),
        }
    }

    /// Consults `provider` for the sender whenever a call doesn't pass one.
    pub fn with_context_provider(mut self, provider: Arc<dyn ContextProvider<S>>) -> Self {
        self.context = Some(provider);
        self
    }

    /// Binds the default sender used when neither an explicit nor an ambient
    /// sender is available. Replaces any previously bound sender.
    pub fn init(&self, default_sender: S) {
        debug!("Event dispatcher bound to {:?}", default_sender);
        *write(&self.default_sender) = Some(default_sender);
    }

    pub fn resolve_sender(&self, explicit: Option<S>) -> Result<S, DispatchError> {
        if let Some(sender) = explicit {
            return Ok(sender);
        }
        let ambient = self
            .context
            .as_ref()
            .filter(|provider| provider.is_active())
            .and_then(|provider| provider.current());
        if let Some(sender) = ambient {
            return Ok(sender);
        }
        read(&self.default_sender)
            .clone()
            .ok_or(DispatchError::NotInitialized)
    }

    /// Declares `E` as an event category, making it known to the untyped API.
    ///
    /// Typed subscribe and decorator calls declare their category implicitly.
    pub fn declare<E: Event>(&self) -> EventCategory {
        let category = EventCategory::of::<E>();
        write(&self.catalog)
            .entry(category.id())
            .or_insert(CatalogEntry {
                category,
                cast: cast::<E>,
            });
        category
    }

    /// Looks up a declared category by its type tag.
    pub fn category(&self, id: TypeId) -> Result<EventCategory, DispatchError> {
        read(&self.catalog)
            .get(&id)
            .map(|entry| entry.category)
            .ok_or_else(|| undeclared(id))
    }

    pub fn subscribe<E, F>(
        &self,
        handler: F,
        sender: Option<S>,
    ) -> Result<Subscription<S>, DispatchError>
    where
        E: Event,
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: Handler<E> = Arc::new(handler);
        self.connect(&handler, sender)
    }

    /// Subscribes a shared handler so that it can later be removed with
    /// [`disconnect`](Self::disconnect).
    pub fn connect<E: Event>(
        &self,
        handler: &Handler<E>,
        sender: Option<S>,
    ) -> Result<Subscription<S>, DispatchError> {
        let sender = self.resolve_sender(sender)?;
        let category = self.declare::<E>();
        let receiver = bind_typed::<S, E>(handler.clone());
        Ok(self.register(category, handler, receiver, sender))
    }

    /// Subscribes a handler to a category given only its type tag.
    pub fn subscribe_dyn<F>(
        &self,
        category: TypeId,
        handler: F,
        sender: Option<S>,
    ) -> Result<Subscription<S>, DispatchError>
    where
        F: Fn(&dyn Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let sender = self.resolve_sender(sender)?;
        let category = self.category(category)?;
        let handler: Handler<dyn Event> = Arc::new(handler);
        let receiver = bind_dyn::<S>(handler.clone());
        Ok(self.register(category, &handler, receiver, sender))
    }

    /// Decorator form of [`subscribe`](Self::subscribe).
    ///
    /// The sender is resolved now; the handler is registered when the returned
    /// decorator is applied.
    pub fn decorator<E: Event>(
        &self,
        sender: Option<S>,
    ) -> Result<Decorator<'_, S, E>, DispatchError> {
        let sender = self.resolve_sender(sender)?;
        let category = self.declare::<E>();
        Ok(Decorator::new(self, category.id(), sender, bind_typed::<S, E>))
    }

    /// Decorator form of [`subscribe_dyn`](Self::subscribe_dyn).
    ///
    /// An undeclared `category` is only reported when the decorator is applied.
    pub fn decorator_dyn(
        &self,
        category: TypeId,
        sender: Option<S>,
    ) -> Result<Decorator<'_, S, dyn Event>, DispatchError> {
        let sender = self.resolve_sender(sender)?;
        Ok(Decorator::new(self, category, sender, bind_dyn::<S>))
    }

    pub(crate) fn register<T: ?Sized>(
        &self,
        category: EventCategory,
        handler: &Handler<T>,
        receiver: Receiver<S>,
        sender: S,
    ) -> Subscription<S> {
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let adapter = Adapter {
            id,
            origin: origin_of(handler),
            receiver,
        };

        write(&self.tables)
            .entry(category.id())
            .or_insert_with(|| RoutingTable::new(category))
            .receivers
            .entry(sender.clone())
            .or_default()
            .push(adapter);

        debug!("Subscribed {} to {} for {:?}", id, category, sender);
        Subscription::new(id, category, sender)
    }

    /// Removes the adapter created for `subscription`.
    ///
    /// Returns `false` when it was already removed.
    pub fn unsubscribe(&self, subscription: &Subscription<S>) -> bool {
        let category = subscription.category();
        let removed = self.remove(category.id(), subscription.sender(), |adapter| {
            adapter.id == subscription.id()
        });
        if removed > 0 {
            debug!("Unsubscribed {} from {}", subscription.id(), category);
        }
        removed > 0
    }

    /// Removes every subscription of `handler` to `E` under the resolved sender.
    pub fn disconnect<E: Event>(
        &self,
        handler: &Handler<E>,
        sender: Option<S>,
    ) -> Result<(), DispatchError> {
        let sender = self.resolve_sender(sender)?;
        self.disconnect_origin(EventCategory::of::<E>(), origin_of(handler), &sender);
        Ok(())
    }

    /// Untyped counterpart of [`disconnect`](Self::disconnect).
    pub fn disconnect_dyn(
        &self,
        category: TypeId,
        handler: &Handler<dyn Event>,
        sender: Option<S>,
    ) -> Result<(), DispatchError> {
        let sender = self.resolve_sender(sender)?;
        let category = self.category(category)?;
        self.disconnect_origin(category, origin_of(handler), &sender);
        Ok(())
    }

    fn disconnect_origin(&self, category: EventCategory, origin: usize, sender: &S) {
        let removed = self.remove(category.id(), sender, |adapter| adapter.origin == origin);
        if removed > 0 {
            debug!("Disconnected {} handler(s) from {} for {:?}", removed, category, sender);
        }
    }

    fn remove(&self, category: TypeId, sender: &S, pred: impl Fn(&Adapter<S>) -> bool) -> usize {
        write(&self.tables)
            .get_mut(&category)
            .map_or(0, |table| table.remove_where(sender, pred))
    }

    /// Delivers `event` to every handler subscribed to its category under the
    /// resolved sender.
    ///
    /// Handlers run in subscription order. The first handler error is returned
    /// immediately and the remaining handlers are not called. Subscriptions
    /// made or removed by a handler take effect from the next dispatch.
    pub fn dispatch<E: Event>(&self, event: &E, sender: Option<S>) -> Result<(), DispatchError> {
        self.dispatch_dyn(event, sender)
    }

    /// Dispatches by the runtime type of `event`.
    ///
    /// Fails with [`DispatchError::InvalidEventType`] when the event's
    /// `category()` names a different type than the one `as_any()` exposes.
    pub fn dispatch_dyn(&self, event: &dyn Event, sender: Option<S>) -> Result<(), DispatchError> {
        let sender = self.resolve_sender(sender)?;
        let category = event.category();
        if category.id() != event.as_any().type_id() {
            return Err(DispatchError::InvalidEventType {
                found: format!("{} claiming to be {}", event.event_name(), category),
            });
        }

        let receivers: Vec<Receiver<S>> = write(&self.tables)
            .entry(category.id())
            .or_insert_with(|| RoutingTable::new(category))
            .receivers
            .get(&sender)
            .map(|adapters| adapters.iter().map(|adapter| adapter.receiver.clone()).collect())
            .unwrap_or_default();

        trace!(
            "Dispatching {} to {} handler(s) for {:?}",
            category,
            receivers.len(),
            sender
        );
        for receiver in receivers {
            receiver(&sender, event)?;
        }
        Ok(())
    }

    /// Dispatches a value whose type is only known at runtime.
    ///
    /// Only a type already known to this dispatcher is recognised as an event:
    /// one named by a typed subscribe or decorator, or by [`declare`](Self::declare).
    /// Anything else, including an `Event` type never declared here, fails with
    /// [`DispatchError::InvalidEventType`].
    pub fn dispatch_any(&self, value: &dyn Any, sender: Option<S>) -> Result<(), DispatchError> {
        let id = value.type_id();
        let cast = read(&self.catalog).get(&id).map(|entry| entry.cast);
        let event = cast
            .and_then(|cast| cast(value))
            .ok_or_else(|| undeclared(id))?;
        self.dispatch_dyn(event, sender)
    }

    /// Number of handlers subscribed to `category` under `sender`.
    pub fn receiver_count(&self, category: EventCategory, sender: &S) -> usize {
        read(&self.tables)
            .get(&category.id())
            .and_then(|table| table.receivers.get(sender))
            .map_or(0, Vec::len)
    }

    /// Categories that have a routing table, i.e. were subscribed to or
    /// dispatched at least once.
    pub fn routed_categories(&self) -> Vec<EventCategory> {
        read(&self.tables)
            .values()
            .map(|table| table.category)
            .collect()
    }

    /// Binds `sender` for a sequence of calls.
    pub fn scoped(&self, sender: S) -> ScopedDispatcher<'_, S> {
        ScopedDispatcher {
            dispatcher: self,
            sender,
        }
    }
}

impl<S: Sender> Default for EventDispatcher<S> {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Request-scoped view of a dispatcher with a fixed sender.
pub struct ScopedDispatcher<'d, S: Sender> {
    dispatcher: &'d EventDispatcher<S>,
    sender: S,
}

impl<S: Sender> ScopedDispatcher<'_, S> {
    pub fn sender(&self) -> &S {
        &self.sender
    }

    pub fn subscribe<E, F>(&self, handler: F) -> Result<Subscription<S>, DispatchError>
    where
        E: Event,
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(handler, Some(self.sender.clone()))
    }

    pub fn dispatch<E: Event>(&self, event: &E) -> Result<(), DispatchError> {
        self.dispatcher.dispatch(event, Some(self.sender.clone()))
    }

    pub fn disconnect<E: Event>(&self, handler: &Handler<E>) -> Result<(), DispatchError> {
        self.dispatcher.disconnect(handler, Some(self.sender.clone()))
    }
}
