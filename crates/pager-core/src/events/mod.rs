//! Injected publish/subscribe bus for pagination and selection notifications

use std::any::{Any, TypeId};
use std::sync::Arc;
use parking_lot::Mutex;
use ahash::AHashMap;

/// Event bus shared by the components of one list
pub struct EventBus {
    handlers: Arc<Mutex<AHashMap<TypeId, Vec<Box<dyn EventHandler>>>>>,
}

/// Event trait that all events must implement
pub trait Event: Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
}

/// Handler trait for event handlers
pub trait EventHandler: Send + Sync {
    fn handle(&mut self, event: &dyn Event);
}

/// Events published by the engine
pub mod events {
    use super::Event;
    use crate::persistence::StorageKey;

    /// A page transition committed
    #[derive(Debug, Clone, PartialEq)]
    pub struct PageChanged {
        pub page: usize,
        pub previous: usize,
    }

    /// A page size change committed
    #[derive(Debug, Clone, PartialEq)]
    pub struct PageSizeChanged {
        pub page_size: usize,
        pub previous: usize,
    }

    /// A source invocation rejected; state was left at its last committed value
    #[derive(Debug, Clone, PartialEq)]
    pub struct FetchFailed {
        pub source_name: String,
        pub page: usize,
        pub error: String,
    }

    /// Infinite scroll appended a page
    #[derive(Debug, Clone, PartialEq)]
    pub struct MoreLoaded {
        pub page: usize,
        pub appended: usize,
        pub total_loaded: usize,
    }

    /// The live selection changed
    #[derive(Debug, Clone, PartialEq)]
    pub struct SelectionChanged {
        pub selected: usize,
    }

    /// A selection would have exceeded the configured limit and was aborted
    #[derive(Debug, Clone, PartialEq)]
    pub struct SelectionLimitExceeded {
        pub limit: usize,
        pub attempted: usize,
    }

    /// Persisted state was found and applied at mount
    #[derive(Debug, Clone, PartialEq)]
    pub struct StateRestored {
        pub key: StorageKey,
        pub page: usize,
        pub selected_records: usize,
    }

    /// Conflicting configuration was resolved by a fixed policy
    #[derive(Debug, Clone, PartialEq)]
    pub struct ConfigWarning {
        pub widget: String,
        pub message: String,
    }

    // Implement Event trait for all event types
    macro_rules! impl_event {
        ($($t:ty),*) => {
            $(
                impl Event for $t {
                    fn as_any(&self) -> &dyn std::any::Any {
                        self
                    }
                }
            )*
        }
    }

    impl_event!(
        PageChanged,
        PageSizeChanged,
        FetchFailed,
        MoreLoaded,
        SelectionChanged,
        SelectionLimitExceeded,
        StateRestored,
        ConfigWarning
    );
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(AHashMap::new())),
        }
    }

    /// Subscribe to events of a specific type
    pub fn subscribe<E: Event>(&self, handler: Box<dyn EventHandler>) {
        let type_id = TypeId::of::<E>();
        let mut handlers = self.handlers.lock();
        handlers.entry(type_id).or_insert_with(Vec::new).push(handler);
    }

    /// Subscribe a closure that receives the concrete event type
    pub fn on<E, F>(&self, mut f: F)
    where
        E: Event,
        F: FnMut(&E) + Send + Sync + 'static,
    {
        self.subscribe::<E>(handler_from_fn(move |event: &dyn Event| {
            if let Some(event) = event.as_any().downcast_ref::<E>() {
                f(event);
            }
        }));
    }

    /// Publish an event.
    ///
    /// Handlers run synchronously; a handler must not publish on the same bus.
    pub fn publish<E: Event>(&self, event: E) {
        let type_id = TypeId::of::<E>();
        let mut handlers = self.handlers.lock();

        if let Some(event_handlers) = handlers.get_mut(&type_id) {
            for handler in event_handlers.iter_mut() {
                handler.handle(&event);
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper struct for creating event handlers from closures
pub struct ClosureEventHandler<F> {
    handler: F,
}

impl<F> EventHandler for ClosureEventHandler<F>
where
    F: FnMut(&dyn Event) + Send + Sync,
{
    fn handle(&mut self, event: &dyn Event) {
        (self.handler)(event);
    }
}

/// Create an event handler from a closure
pub fn handler_from_fn<F>(f: F) -> Box<dyn EventHandler>
where
    F: FnMut(&dyn Event) + Send + Sync + 'static,
{
    Box::new(ClosureEventHandler { handler: f })
}

#[cfg(test)]
mod tests {
    use super::events::*;
    use super::*;

    #[test]
    fn test_typed_subscription() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.on::<PageChanged, _>(move |e| sink.lock().push(e.page));

        bus.publish(PageChanged { page: 2, previous: 1 });
        bus.publish(SelectionChanged { selected: 4 });
        bus.publish(PageChanged { page: 3, previous: 2 });

        assert_eq!(*seen.lock(), vec![2, 3]);
    }
}
