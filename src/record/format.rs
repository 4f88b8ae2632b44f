//! String formatting for validated leaf values
//!
//! Two layers run after a type function succeeds: the field's own casing,
//! then the schema-wide global format. A global format that produces a
//! falsy non-boolean value (`null`, `""`, `0`) is ignored with a warning
//! and the pre-hook value is kept.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::schema::{BoxFuture, Casing};

/// Function-style global format.
pub trait FormatHook: Send + Sync {
    fn format<'a>(&'a self, value: &'a Value) -> BoxFuture<'a, Value>;
}

struct SyncHook<F>(F);

impl<F> FormatHook for SyncHook<F>
where
    F: Fn(&Value) -> Value + Send + Sync,
{
    fn format<'a>(&'a self, value: &'a Value) -> BoxFuture<'a, Value> {
        Box::pin(std::future::ready((self.0)(value)))
    }
}

struct AsyncHook<F>(F);

impl<F, Fut> FormatHook for AsyncHook<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Value> + Send + 'static,
{
    fn format<'a>(&'a self, value: &'a Value) -> BoxFuture<'a, Value> {
        Box::pin((self.0)(value.clone()))
    }
}

/// Formatting applied to every validated leaf value of a schema.
#[derive(Clone)]
pub enum GlobalFormat {
    /// Static casing directive
    Casing(Casing),
    /// Replacement function
    Hook(Arc<dyn FormatHook>),
}

impl std::fmt::Debug for GlobalFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlobalFormat::Casing(casing) => f.debug_tuple("Casing").field(casing).finish(),
            GlobalFormat::Hook(_) => f.write_str("Hook"),
        }
    }
}

impl From<Casing> for GlobalFormat {
    fn from(casing: Casing) -> Self {
        GlobalFormat::Casing(casing)
    }
}

impl GlobalFormat {
    /// Synchronous replacement function
    pub fn hook<F>(func: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        GlobalFormat::Hook(Arc::new(SyncHook(func)))
    }

    /// Asynchronous replacement function
    pub fn async_hook<F, Fut>(func: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        GlobalFormat::Hook(Arc::new(AsyncHook(func)))
    }

    /// Apply the format to an already-cased value.
    pub async fn apply(&self, collection: &str, field: &str, value: Value) -> Value {
        let formatted = match self {
            GlobalFormat::Casing(casing) => casing.apply(value.clone()),
            GlobalFormat::Hook(hook) => hook.format(&value).await,
        };

        if is_falsy(&formatted) && !formatted.is_boolean() {
            warn!(
                collection,
                field,
                "global formatting produced an empty result; keeping the unformatted value"
            );
            return value;
        }

        formatted
    }
}

/// JSON truthiness: `null`, `false`, `0` and `""` are falsy.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}
