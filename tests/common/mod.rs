use std::sync::Arc;
use std::sync::Mutex;

use scoped_events::event::dispatcher::EventDispatcher;
use scoped_events::impl_event;
use uuid::Uuid;

pub const APP: &str = "dummy";

#[derive(Clone, Debug, PartialEq)]
#[allow(dead_code)]
pub struct OrderCreated {
    pub id: Uuid,
}

impl OrderCreated {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[allow(dead_code)]
pub struct OrderCancelled {
    pub id: Uuid,
    pub reason: String,
}

impl_event!(OrderCreated, OrderCancelled);

#[allow(dead_code)]
pub fn dispatcher() -> EventDispatcher<&'static str> {
    EventDispatcher::new(Some(APP))
}

// RECORDER

/// Collects every event a handler receives.
#[derive(Clone)]
#[allow(dead_code)]
pub struct Recorder<E> {
    seen: Arc<Mutex<Vec<E>>>,
}

#[allow(dead_code)]
impl<E: Clone + Send + 'static> Recorder<E> {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn handler(&self) -> impl Fn(&E) -> anyhow::Result<()> + Send + Sync + use<E> {
        let seen = self.seen.clone();
        move |event: &E| {
            seen.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    pub fn seen(&self) -> Vec<E> {
        self.seen.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<E> {
        self.seen.lock().unwrap().last().cloned()
    }
}
