//! In-process middleware pipeline for bus events.
//!
//! Handlers register with a direction and an `order`; lower orders run first. Each handler
//! returns exactly one [`Flow`] describing whether the event moves on, whether generic
//! delivery should still happen, and an optional error for upstream handling.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bus::{BusEvent, Direction};

/// Decision a middleware hands back to the dispatcher.
#[derive(Debug)]
pub struct Flow {
    /// Pass the event to the next handler.
    pub forward: bool,
    /// Error raised while handling; stops the pipeline.
    pub error: Option<anyhow::Error>,
    /// Allow the remaining handlers and generic delivery to act on the event.
    pub continue_default: bool,
}

impl Flow {
    /// Continue with the next handler, event untouched by this one.
    pub fn next() -> Self {
        Self {
            forward: true,
            error: None,
            continue_default: true,
        }
    }

    /// The event was fully handled; nothing after this handler should act on it.
    pub fn handled() -> Self {
        Self {
            forward: true,
            error: None,
            continue_default: false,
        }
    }

    /// Drop the event silently.
    pub fn swallow() -> Self {
        Self {
            forward: false,
            error: None,
            continue_default: false,
        }
    }

    pub fn fail(error: impl Into<anyhow::Error>) -> Self {
        Self {
            forward: true,
            error: Some(error.into()),
            continue_default: true,
        }
    }
}

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, event: &mut BusEvent) -> Flow;
}

#[derive(Clone)]
pub struct MiddlewareRegistration {
    pub name: String,
    pub description: String,
    pub direction: Direction,
    pub order: i32,
    pub handler: Arc<dyn Middleware>,
}

impl std::fmt::Debug for MiddlewareRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareRegistration")
            .field("name", &self.name)
            .field("direction", &self.direction)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum MiddlewareError {
    #[error("middleware '{0}' is already registered")]
    DuplicateName(String),
}

/// Result of running an event through the pipeline.
#[derive(Debug)]
pub enum Dispatch {
    /// Every handler passed the event on; generic delivery may proceed.
    Unhandled(BusEvent),
    /// A handler fully processed the event.
    Handled { handler: String },
    /// A handler dropped the event.
    Swallowed { handler: String },
}

#[derive(Default)]
pub struct MiddlewareChain {
    entries: RwLock<Vec<MiddlewareRegistration>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler. Entries stay sorted by ascending `order`; ties keep insertion order.
    pub fn register(&self, registration: MiddlewareRegistration) -> Result<(), MiddlewareError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.iter().any(|entry| entry.name == registration.name) {
            return Err(MiddlewareError::DuplicateName(registration.name));
        }
        info!(
            name = %registration.name,
            direction = registration.direction.as_str(),
            order = registration.order,
            "middleware registered"
        );
        entries.push(registration);
        entries.sort_by_key(|entry| entry.order);
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|entry| entry.name != name);
        entries.len() != before
    }

    pub fn highest_order(&self, direction: Direction) -> Option<i32> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .filter(|entry| entry.direction == direction)
            .map(|entry| entry.order)
            .max()
    }

    pub fn names(&self, direction: Direction) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .filter(|entry| entry.direction == direction)
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Runs `event` through the handlers registered for its direction.
    ///
    /// Stops at the first handler that reports an error (returned as-is), swallows the event,
    /// or clears `continue_default`.
    pub async fn dispatch(&self, mut event: BusEvent) -> anyhow::Result<Dispatch> {
        let handlers: Vec<(String, Arc<dyn Middleware>)> = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            entries
                .iter()
                .filter(|entry| entry.direction == event.direction)
                .map(|entry| (entry.name.clone(), Arc::clone(&entry.handler)))
                .collect()
        };

        debug!(
            direction = event.direction.as_str(),
            kind = %event.kind,
            count = handlers.len(),
            "dispatching bus event"
        );

        for (name, handler) in handlers {
            let flow = handler.handle(&mut event).await;
            if let Some(error) = flow.error {
                warn!(middleware = %name, error = %error, "middleware reported an error");
                return Err(error);
            }
            if !flow.forward {
                debug!(middleware = %name, "event swallowed");
                return Ok(Dispatch::Swallowed { handler: name });
            }
            if !flow.continue_default {
                debug!(middleware = %name, "event handled");
                return Ok(Dispatch::Handled { handler: name });
            }
        }

        Ok(Dispatch::Unhandled(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::Mutex;

    struct Recorder {
        label: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
        outcome: fn() -> Flow,
    }

    #[async_trait]
    impl Middleware for Recorder {
        async fn handle(&self, event: &mut BusEvent) -> Flow {
            self.seen.lock().await.push(self.label);
            event.preview = Some(self.label.to_string());
            (self.outcome)()
        }
    }

    fn registration(
        name: &'static str,
        order: i32,
        seen: &Arc<Mutex<Vec<&'static str>>>,
        outcome: fn() -> Flow,
    ) -> MiddlewareRegistration {
        MiddlewareRegistration {
            name: name.to_string(),
            description: format!("{name} test handler"),
            direction: Direction::Outgoing,
            order,
            handler: Arc::new(Recorder {
                label: name,
                seen: Arc::clone(seen),
                outcome,
            }),
        }
    }

    fn event() -> BusEvent {
        BusEvent::outgoing("bot-1", "teams", "thread", "text", json!({ "text": "hi" }))
    }

    #[tokio::test]
    async fn runs_in_ascending_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain = MiddlewareChain::new();
        chain.register(registration("late", 100, &seen, Flow::next)).unwrap();
        chain.register(registration("early", 10, &seen, Flow::next)).unwrap();

        let dispatch = chain.dispatch(event()).await.unwrap();
        assert_eq!(*seen.lock().await, vec!["early", "late"]);
        let Dispatch::Unhandled(event) = dispatch else {
            panic!("expected unhandled");
        };
        assert_eq!(event.preview.as_deref(), Some("late"));
        assert_eq!(chain.highest_order(Direction::Outgoing), Some(100));
        assert_eq!(chain.highest_order(Direction::Incoming), None);
    }

    #[tokio::test]
    async fn handled_stops_later_handlers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain = MiddlewareChain::new();
        chain.register(registration("sender", 10, &seen, Flow::handled)).unwrap();
        chain.register(registration("fallback", 20, &seen, Flow::next)).unwrap();

        let dispatch = chain.dispatch(event()).await.unwrap();
        assert!(matches!(dispatch, Dispatch::Handled { ref handler } if handler == "sender"));
        assert_eq!(*seen.lock().await, vec!["sender"]);
    }

    #[tokio::test]
    async fn swallow_drops_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain = MiddlewareChain::new();
        chain.register(registration("filter", 1, &seen, Flow::swallow)).unwrap();
        chain.register(registration("sender", 2, &seen, Flow::handled)).unwrap();

        let dispatch = chain.dispatch(event()).await.unwrap();
        assert!(matches!(dispatch, Dispatch::Swallowed { .. }));
        assert_eq!(*seen.lock().await, vec!["filter"]);
    }

    #[tokio::test]
    async fn error_is_returned_unchanged() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain = MiddlewareChain::new();
        chain
            .register(registration("broken", 1, &seen, || {
                Flow::fail(crate::ChannelError::UnsupportedMessageKind("image".into()))
            }))
            .unwrap();
        chain.register(registration("after", 2, &seen, Flow::next)).unwrap();

        let err = chain.dispatch(event()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::ChannelError>(),
            Some(crate::ChannelError::UnsupportedMessageKind(_))
        ));
        assert_eq!(*seen.lock().await, vec!["broken"]);
    }

    #[tokio::test]
    async fn direction_filters_handlers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain = MiddlewareChain::new();
        chain.register(registration("out", 1, &seen, Flow::handled)).unwrap();

        let mut incoming = event();
        incoming.direction = Direction::Incoming;
        let dispatch = chain.dispatch(incoming).await.unwrap();
        assert!(matches!(dispatch, Dispatch::Unhandled(_)));
        assert!(seen.lock().await.is_empty());
    }

    #[test]
    fn duplicate_names_rejected_and_unregister_works() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain = MiddlewareChain::new();
        chain.register(registration("one", 1, &seen, Flow::next)).unwrap();
        let err = chain
            .register(registration("one", 5, &seen, Flow::next))
            .unwrap_err();
        assert!(matches!(err, MiddlewareError::DuplicateName(ref n) if n == "one"));
        assert!(chain.unregister("one"));
        assert!(!chain.unregister("one"));
        assert!(chain.names(Direction::Outgoing).is_empty());
    }
}
