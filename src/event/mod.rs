//! Event categories and the marker trait for dispatchable events.

use std::any::Any;
use std::any::TypeId;
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;

pub mod dispatcher;
pub mod subscription;

/// Marker trait for events that can be dispatched through the event dispatcher.
///
/// The concrete type of an implementor is its event category. Most types only
/// need `as_any`, which [`impl_event!`](crate::impl_event) writes for you.
pub trait Event: Any + Send + Sync + 'static {
    /// Downcast this event to a concrete type.
    ///
    /// Used internally by handler adapters to extract the specific event type
    /// from a trait object. Most users won't need to call this directly.
    fn as_any(&self) -> &dyn Any;

    /// Get the name of the event type.
    fn event_name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    /// Get the runtime category of this event.
    ///
    /// Called through `&dyn Event` this still reports the concrete type.
    fn category(&self) -> EventCategory {
        EventCategory {
            id: TypeId::of::<Self>(),
            name: std::any::type_name::<Self>(),
        }
    }
}

/// Routing key identifying a class of events.
///
/// Two categories are equal only if they come from the same Rust type; the
/// name is informational.
#[derive(Clone, Copy, Debug)]
pub struct EventCategory {
    id: TypeId,
    name: &'static str,
}

impl EventCategory {
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: std::any::type_name::<E>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EventCategory {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventCategory {}

impl Hash for EventCategory {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
