//! Handler types, subscription handles and the decorator form of subscribe.

use std::any::TypeId;
use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;

use super::Event;
use super::EventCategory;
use super::dispatcher::EventDispatcher;
use crate::context::Sender;
use crate::error::DispatchError;

/// Shareable event handler.
///
/// `T` is either a concrete event type or `dyn Event` for handlers registered
/// through the untyped API. Handler identity is the identity of the `Arc`.
pub type Handler<T> = Arc<dyn Fn(&T) -> anyhow::Result<()> + Send + Sync>;

/// Internal delivery signature stored in routing tables.
pub(crate) type Receiver<S> = Arc<dyn Fn(&S, &dyn Event) -> anyhow::Result<()> + Send + Sync>;

/// Wraps a closure into a [`Handler`] so it can later be passed to `disconnect`.
pub fn handler<T, F>(f: F) -> Handler<T>
where
    T: ?Sized + 'static,
    F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscription-{}", self.0)
    }
}

/// Opaque handle returned by every subscribe call.
///
/// Passing it to [`EventDispatcher::unsubscribe`] removes exactly the adapter
/// it was created for, even when the same handler was subscribed several times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription<S> {
    id: SubscriptionId,
    category: EventCategory,
    sender: S,
}

impl<S> Subscription<S> {
    pub(crate) fn new(id: SubscriptionId, category: EventCategory, sender: S) -> Self {
        Self {
            id,
            category,
            sender,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn category(&self) -> EventCategory {
        self.category
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }
}

/// Deferred subscription returned by [`EventDispatcher::decorator`].
///
/// The sender is fixed when the decorator is created; the category is checked
/// again when [`apply`](Decorator::apply) is called.
pub struct Decorator<'d, S: Sender, T: ?Sized + 'static> {
    dispatcher: &'d EventDispatcher<S>,
    category: TypeId,
    sender: S,
    bind: fn(Handler<T>) -> Receiver<S>,
}

impl<'d, S: Sender, T: ?Sized + 'static> Decorator<'d, S, T> {
    pub(crate) fn new(
        dispatcher: &'d EventDispatcher<S>,
        category: TypeId,
        sender: S,
        bind: fn(Handler<T>) -> Receiver<S>,
    ) -> Self {
        Self {
            dispatcher,
            category,
            sender,
            bind,
        }
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// Registers `f` and hands it back as a [`Handler`].
    ///
    /// The returned handler calls `f` when invoked directly and is the identity
    /// that `disconnect` matches against.
    pub fn apply<F>(self, f: F) -> Result<Handler<T>, DispatchError>
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let category = self.dispatcher.category(self.category)?;
        let handler: Handler<T> = Arc::new(f);
        let receiver = (self.bind)(handler.clone());
        self.dispatcher.register(category, &handler, receiver, self.sender);
        Ok(handler)
    }
}

/// Adapter for handlers of a concrete event type.
pub(crate) fn bind_typed<S: Sender, E: Event>(handler: Handler<E>) -> Receiver<S> {
    Arc::new(move |_: &S, event: &dyn Event| {
        match event.as_any().downcast_ref::<E>() {
            Some(event) => handler(event),
            None => Err(anyhow!(
                "{} delivered to a handler of {}",
                event.event_name(),
                type_name::<E>()
            )),
        }
    })
}

/// Adapter for handlers registered through the untyped API.
pub(crate) fn bind_dyn<S: Sender>(handler: Handler<dyn Event>) -> Receiver<S> {
    Arc::new(move |_: &S, event: &dyn Event| handler(event))
}

/// Address of the handler's allocation, used as its identity tag.
pub(crate) fn origin_of<T: ?Sized>(handler: &Handler<T>) -> usize {
    Arc::as_ptr(handler) as *const () as usize
}
