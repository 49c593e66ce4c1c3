//! The dispatcher's view of an inbound action: typed accessors over the
//! client's JSON payload, and the `SetResult` convention a [`Model`]
//! uses to hand back the page's next data snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::value::Value;

/// A registered handler for one page's named actions
/// (`"<model>.<method>"`). Implementors hold whatever state their
/// actions need; rendering never touches them directly; instead an
/// action calls [`ActionContext::set_result`] to hand the dispatcher
/// the data the page should render next.
#[async_trait]
pub trait Model: Send + Sync {
    async fn call(&mut self, method: &str, ctx: &mut ActionContext) -> Result<(), EngineError>;
}

/// The argument bag and result slot passed to a [`Model::call`]
/// invocation.
pub struct ActionContext {
    data: serde_json::Value,
    result: Option<Value>,
    canceled: Arc<AtomicBool>,
}

impl ActionContext {
    pub(crate) fn new(data: serde_json::Value, canceled: Arc<AtomicBool>) -> Self {
        ActionContext {
            data,
            result: None,
            canceled,
        }
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        self.data.get(key)?.as_str()
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.data.get(key)?.as_i64()
    }

    pub fn float(&self, key: &str) -> Option<f64> {
        self.data.get(key)?.as_f64()
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.data.get(key)?.as_bool()
    }

    /// The value the page should render after this action completes. If
    /// an action never calls this, the page's data is left unchanged.
    pub fn set_result(&mut self, value: Value) {
        self.result = Some(value);
    }

    pub(crate) fn take_result(&mut self) -> Option<Value> {
        self.result.take()
    }

    /// Whether the client canceled this action (e.g. a newer action
    /// superseded it) while the handler was running. Checked by the
    /// dispatcher immediately before committing `set_result`; has no
    /// effect on whether `call` itself keeps running.
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// Builds a `ValidationError` with one message per invalid field.
    pub fn validation_error<I, K, V>(fields: I) -> EngineError
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        EngineError::Validation {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
