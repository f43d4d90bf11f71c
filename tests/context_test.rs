use std::sync::Arc;
use std::sync::Barrier;
use std::thread;

use mockall::mock;
use scoped_events::context::ContextProvider;
use scoped_events::context::ContextStack;
use scoped_events::error::DispatchError;
use scoped_events::event::dispatcher::EventDispatcher;

use common::APP;
use common::OrderCreated;
use common::Recorder;

mod common;

mock! {
    pub Ambient {}

    impl ContextProvider<&'static str> for Ambient {
        fn is_active(&self) -> bool;
        fn current(&self) -> Option<&'static str>;
    }
}

#[test]
fn test_explicit_sender_wins() {
    let mut ambient = MockAmbient::new();
    ambient.expect_is_active().never();
    ambient.expect_current().never();
    let dispatcher = EventDispatcher::new(Some(APP)).with_context_provider(Arc::new(ambient));

    assert_eq!(dispatcher.resolve_sender(Some("explicit")).unwrap(), "explicit");
}

#[test]
fn test_ambient_sender_beats_default() {
    let mut ambient = MockAmbient::new();
    ambient.expect_is_active().times(1).return_const(true);
    ambient.expect_current().times(1).return_const(Some("request"));
    let dispatcher = EventDispatcher::new(Some(APP)).with_context_provider(Arc::new(ambient));

    assert_eq!(dispatcher.resolve_sender(None).unwrap(), "request");
}

#[test]
fn test_inactive_ambient_falls_back_to_default() {
    let mut ambient = MockAmbient::new();
    ambient.expect_is_active().return_const(false);
    ambient.expect_current().never();
    let dispatcher = EventDispatcher::new(Some(APP)).with_context_provider(Arc::new(ambient));

    assert_eq!(dispatcher.resolve_sender(None).unwrap(), APP);
}

#[test]
fn test_active_ambient_without_sender_falls_back_to_default() {
    let mut ambient = MockAmbient::new();
    ambient.expect_is_active().return_const(true);
    ambient.expect_current().times(1).return_const(None::<&str>);
    let dispatcher = EventDispatcher::new(Some(APP)).with_context_provider(Arc::new(ambient));

    assert_eq!(dispatcher.resolve_sender(None).unwrap(), APP);
}

#[test]
fn test_no_sender_anywhere_is_not_initialized() {
    let mut ambient = MockAmbient::new();
    ambient.expect_is_active().return_const(false);
    let dispatcher: EventDispatcher<&str> =
        EventDispatcher::new(None).with_context_provider(Arc::new(ambient));

    let err = dispatcher.resolve_sender(None).unwrap_err();

    assert!(matches!(err, DispatchError::NotInitialized));
    assert_eq!(err.to_string(), "Event dispatcher is not initialized.");
}

#[test]
fn test_ambient_context_works_without_default() {
    let stack: Arc<ContextStack<&str>> = Arc::new(ContextStack::new());
    let dispatcher = EventDispatcher::new(None).with_context_provider(stack.clone());
    let recorder = Recorder::<OrderCreated>::new();

    {
        let _app = stack.enter("app");
        dispatcher.subscribe(recorder.handler(), None).unwrap();
        dispatcher.dispatch(&OrderCreated::new(), None).unwrap();
    }
    assert_eq!(recorder.seen().len(), 1);

    let err = dispatcher.dispatch(&OrderCreated::new(), None).unwrap_err();
    assert!(matches!(err, DispatchError::NotInitialized));
}

#[test]
fn test_request_context_scopes_subscriptions() {
    let stack: Arc<ContextStack<&str>> = Arc::new(ContextStack::new());
    let dispatcher = EventDispatcher::new(Some(APP)).with_context_provider(stack.clone());
    let app_events = Recorder::<OrderCreated>::new();
    let request_events = Recorder::<OrderCreated>::new();

    dispatcher.subscribe(app_events.handler(), None).unwrap();
    {
        let _request = stack.enter("request-1");
        dispatcher.subscribe(request_events.handler(), None).unwrap();
        dispatcher.dispatch(&OrderCreated::new(), None).unwrap();
    }
    dispatcher.dispatch(&OrderCreated::new(), None).unwrap();

    assert_eq!(request_events.seen().len(), 1);
    assert_eq!(app_events.seen().len(), 1);
}

#[test]
fn test_decorator_captures_sender_at_creation() {
    let stack: Arc<ContextStack<&str>> = Arc::new(ContextStack::new());
    let dispatcher = EventDispatcher::new(Some(APP)).with_context_provider(stack.clone());
    let recorder = Recorder::<OrderCreated>::new();

    let decorator = {
        let _request = stack.enter("request-1");
        dispatcher.decorator::<OrderCreated>(None).unwrap()
    };
    assert_eq!(decorator.sender(), &"request-1");
    decorator.apply(recorder.handler()).unwrap();

    dispatcher.dispatch(&OrderCreated::new(), None).unwrap();
    assert!(recorder.seen().is_empty());

    dispatcher.dispatch(&OrderCreated::new(), Some("request-1")).unwrap();
    assert_eq!(recorder.seen().len(), 1);
}

#[test]
fn test_request_context_is_local_to_its_thread() {
    let stack: Arc<ContextStack<&str>> = Arc::new(ContextStack::new());
    let dispatcher = EventDispatcher::new(Some(APP)).with_context_provider(stack.clone());
    let entered = Barrier::new(2);
    let checked = Barrier::new(2);

    let (seen_here, resolved_here, seen_there) = thread::scope(|scope| {
        let worker = scope.spawn(|| {
            let _request = stack.enter("request-B");
            entered.wait();
            let seen = stack.current();
            checked.wait();
            seen
        });

        entered.wait();
        let seen = stack.current();
        let resolved = dispatcher.resolve_sender(None).unwrap();
        checked.wait();

        (seen, resolved, worker.join().unwrap())
    });

    assert_eq!(seen_here, None);
    assert_eq!(resolved_here, APP);
    assert_eq!(seen_there, Some("request-B"));
    assert_eq!(stack.depth(), 0);
}

#[test]
fn test_out_of_order_guards_keep_inner_request() {
    let stack: Arc<ContextStack<&str>> = Arc::new(ContextStack::new());
    let dispatcher = EventDispatcher::new(Some(APP)).with_context_provider(stack.clone());
    let recorder = Recorder::<OrderCreated>::new();

    let outer = stack.enter("request-1");
    let inner = stack.enter("request-2");
    drop(outer);

    dispatcher.subscribe(recorder.handler(), None).unwrap();
    dispatcher.dispatch(&OrderCreated::new(), Some("request-2")).unwrap();
    assert_eq!(recorder.seen().len(), 1);

    drop(inner);
    assert_eq!(dispatcher.resolve_sender(None).unwrap(), APP);
}
