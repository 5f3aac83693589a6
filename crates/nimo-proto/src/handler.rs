//! The handler table (§4.C): built once at context construction, then
//! frozen and read-only for the process's lifetime so dispatch never
//! needs a lock.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use nimo_types::NimoError;
use nimo_value::Value;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Option<Value>, NimoError>> + Send>>;
pub type HandlerFn = Arc<dyn Fn(Vec<Value>) -> HandlerFuture + Send + Sync>;

/// Accumulates `requestKey -> handler` bindings before the command port
/// starts accepting connections.
#[derive(Default)]
pub struct HandlerTableBuilder {
    handlers: HashMap<String, HandlerFn>,
}

impl HandlerTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronous-looking handler: `f` runs to completion
    /// without awaiting; wrapped so it fits the same table as async
    /// handlers.
    pub fn on<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Option<Value>, NimoError> + Send + Sync + 'static,
    {
        let key = key.into();
        self.handlers
            .insert(key, Arc::new(move |args| Box::pin(std::future::ready(f(args)))));
        self
    }

    /// Register a handler that returns a future (for handlers that
    /// genuinely need to await I/O, e.g. a registry query).
    pub fn on_async<F, Fut>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Value>, NimoError>> + Send + 'static,
    {
        let key = key.into();
        self.handlers
            .insert(key, Arc::new(move |args| Box::pin(f(args))));
        self
    }

    /// Freeze the table. Once built, the table is immutable — matching
    /// "once the port is accepting connections the table is read-only
    /// for that process's lifetime" (§4.C).
    pub fn build(self) -> HandlerTable {
        HandlerTable {
            handlers: self.handlers,
        }
    }
}

pub struct HandlerTable {
    handlers: HashMap<String, HandlerFn>,
}

impl HandlerTable {
    pub fn get(&self, key: &str) -> Option<&HandlerFn> {
        self.handlers.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.handlers.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_and_dispatch() {
        let table = HandlerTableBuilder::new()
            .on("ping.", |_args| Ok(Some(Value::Logical(true))))
            .build();

        let handler = table.get("ping.").expect("handler registered");
        let result = handler(vec![]).await.unwrap();
        assert_eq!(result, Some(Value::Logical(true)));
        assert!(table.get("missing?").is_none());
    }
}
