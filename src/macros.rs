/// Implements [`Event`](crate::event::Event) for one or more types.
///
/// Every implementor needs the same `as_any` body, so plain event structs can
/// be declared without repeating it.
///
/// # Example
///
/// ```rust
/// use scoped_events::impl_event;
///
/// #[derive(Clone, Debug)]
/// pub struct OrderCreated;
///
/// #[derive(Clone, Debug)]
/// pub struct OrderShipped {
///     pub tracking: String,
/// }
///
/// impl_event!(OrderCreated, OrderShipped);
/// ```
#[macro_export]
macro_rules! impl_event {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::event::Event for $ty {
                fn as_any(&self) -> &dyn ::std::any::Any {
                    self
                }
            }
        )+
    };
}
