//! Mock handlers for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::context::Parameters;
use crate::handlers::{HandlerDescriptor, HandlerResult, ParamType, ParameterSchema, StatefulInvoke};

/// Blocking handler named `echo` that returns its `text` parameter.
#[must_use]
pub fn echo_handler() -> HandlerDescriptor {
    HandlerDescriptor::blocking(
        "echo",
        ParameterSchema::new().required("text", ParamType::String),
        |parameters, _| Ok(parameters.get("text").cloned().unwrap_or(Value::Null)),
    )
    .with_description("Returns the text it was given")
}

/// A stateful handler that records every call and returns a fixed payload.
#[derive(Debug)]
pub struct RecordingHandler {
    payload: Mutex<Option<Value>>,
    calls: Mutex<Vec<Parameters>>,
}

impl RecordingHandler {
    /// Creates a handler that echoes its parameters back as an object.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            payload: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Creates a handler that always returns `payload`.
    #[must_use]
    pub fn returning(payload: Value) -> Arc<Self> {
        Arc::new(Self {
            payload: Mutex::new(Some(payload)),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Wraps this handler in a descriptor.
    #[must_use]
    pub fn descriptor(self: &Arc<Self>, name: &str, schema: ParameterSchema) -> HandlerDescriptor {
        HandlerDescriptor::stateful(name, schema, Arc::clone(self))
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the parameters of every call, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Parameters> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl StatefulInvoke for RecordingHandler {
    async fn call(&self, parameters: Parameters, _cancellation: CancellationToken) -> HandlerResult {
        self.calls.lock().push(parameters.clone());
        let payload = self.payload.lock().clone();
        Ok(payload.unwrap_or(Value::Object(parameters)))
    }
}

/// A handler that sleeps before answering.
///
/// A cooperative handler stops as soon as its token is cancelled; otherwise
/// it sleeps out the full delay regardless.
#[derive(Debug)]
pub struct SlowHandler {
    delay: Duration,
    cooperative: bool,
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl SlowHandler {
    /// Creates a handler that ignores cancellation.
    #[must_use]
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            cooperative: false,
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        })
    }

    /// Creates a handler that returns early when cancelled.
    #[must_use]
    pub fn cooperative(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            cooperative: true,
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        })
    }

    /// Wraps this handler in a descriptor with an empty schema.
    #[must_use]
    pub fn descriptor(self: &Arc<Self>, name: &str) -> HandlerDescriptor {
        HandlerDescriptor::stateful(name, ParameterSchema::new(), Arc::clone(self))
    }

    /// Returns how many calls started.
    #[must_use]
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Returns how many calls ran to the end of their delay.
    #[must_use]
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatefulInvoke for SlowHandler {
    async fn call(&self, _parameters: Parameters, cancellation: CancellationToken) -> HandlerResult {
        self.started.fetch_add(1, Ordering::SeqCst);
        if self.cooperative {
            tokio::select! {
                () = tokio::time::sleep(self.delay) => {}
                () = cancellation.cancelled() => {
                    anyhow::bail!("cancelled: {}", cancellation.reason().unwrap_or_default());
                }
            }
        } else {
            tokio::time::sleep(self.delay).await;
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(Value::String("finished".to_string()))
    }
}

/// A handler that always fails with the given message.
#[derive(Debug, Clone)]
pub struct FailingHandler {
    message: String,
    context: Option<String>,
}

impl FailingHandler {
    /// Creates a failing handler.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            message: message.into(),
            context: None,
        })
    }

    /// Creates a failing handler whose error wraps `message` in `context`.
    #[must_use]
    pub fn with_context(message: impl Into<String>, context: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            message: message.into(),
            context: Some(context.into()),
        })
    }

    /// Wraps this handler in a descriptor with an empty schema.
    #[must_use]
    pub fn descriptor(self: &Arc<Self>, name: &str) -> HandlerDescriptor {
        HandlerDescriptor::stateful(name, ParameterSchema::new(), Arc::clone(self))
    }
}

#[async_trait]
impl StatefulInvoke for FailingHandler {
    async fn call(&self, _parameters: Parameters, _cancellation: CancellationToken) -> HandlerResult {
        let error = anyhow::anyhow!("{}", self.message);
        match &self.context {
            Some(context) => Err(error.context(context.clone())),
            None => Err(error),
        }
    }
}
