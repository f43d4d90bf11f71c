//! Senders and ambient context providers.
//!
//! A sender scopes subscriptions and dispatches. When a call does not name one
//! explicitly, the dispatcher asks its [`ContextProvider`] (if any) for the
//! current sender before falling back to its bound default.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::thread;
use std::thread::ThreadId;

/// Identity value that partitions subscriptions and dispatches.
///
/// Automatically implemented for every type that can be used as a map key and
/// shared across threads.
pub trait Sender: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> Sender for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Source of an implicit, dynamically-scoped sender.
///
/// Attached to a dispatcher with `EventDispatcher::with_context_provider`.
/// The dispatcher only asks for [`current`](Self::current) while
/// [`is_active`](Self::is_active) holds.
pub trait ContextProvider<S>: Send + Sync {
    /// Whether a context is currently active.
    fn is_active(&self) -> bool {
        self.current().is_some()
    }

    /// The sender identifying the active context, if any.
    fn current(&self) -> Option<S>;
}

struct Frame<S> {
    token: u64,
    sender: S,
}

/// Per-thread stacks of entered contexts; the innermost one on the calling
/// thread is current.
///
/// A context entered on one thread is never visible from another, so a
/// dispatcher shared between request threads resolves each request to its own
/// sender.
pub struct ContextStack<S> {
    frames: Mutex<HashMap<ThreadId, Vec<Frame<S>>>>,
    next_token: AtomicU64,
}

impl<S: Sender> ContextStack<S> {
    pub fn new() -> Self {
        Self {
            frames: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(0),
        }
    }

    /// Makes `sender` current on this thread until the returned guard is dropped.
    pub fn enter(&self, sender: S) -> ContextGuard<'_, S> {
        let thread = thread::current().id();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.lock()
            .entry(thread)
            .or_default()
            .push(Frame { token, sender });
        ContextGuard {
            stack: self,
            thread,
            token,
        }
    }

    /// Number of contexts entered on the calling thread.
    pub fn depth(&self) -> usize {
        self.lock()
            .get(&thread::current().id())
            .map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ThreadId, Vec<Frame<S>>>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn leave(&self, thread: ThreadId, token: u64) {
        let mut frames = self.lock();
        let Some(stack) = frames.get_mut(&thread) else {
            return;
        };
        stack.retain(|frame| frame.token != token);
        if stack.is_empty() {
            frames.remove(&thread);
        }
    }
}

impl<S: Sender> ContextProvider<S> for ContextStack<S> {
    fn current(&self) -> Option<S> {
        self.lock()
            .get(&thread::current().id())
            .and_then(|stack| stack.last())
            .map(|frame| frame.sender.clone())
    }
}

/// Leaves the context it was created for when dropped, whatever order guards
/// are dropped in.
#[must_use = "the context is left as soon as the guard is dropped"]
pub struct ContextGuard<'a, S: Sender> {
    stack: &'a ContextStack<S>,
    thread: ThreadId,
    token: u64,
}

impl<S: Sender> Drop for ContextGuard<'_, S> {
    fn drop(&mut self) {
        self.stack.leave(self.thread, self.token);
    }
}
