//! Type functions for leaf fields and meta fields
//!
//! A type function receives the raw value (absent when the record does not
//! carry the key) plus a [`FieldEnvelope`] and either returns the normalized
//! value or rejects it. Both synchronous closures and futures are accepted.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Boxed future returned by validators, meta functions and store lookups.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The caller on whose behalf a record is validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    /// Caller identity, `None` for anonymous callers
    #[serde(default)]
    pub id: Option<String>,
    /// Roles granted to the caller
    #[serde(default)]
    pub roles: Vec<String>,
    /// Free-form claims
    #[serde(default)]
    pub claims: Map<String, Value>,
}

impl Actor {
    /// Create an actor with the given identity
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Create an anonymous actor
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Grant a role
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Attach a claim
    pub fn with_claim(mut self, key: impl Into<String>, value: Value) -> Self {
        self.claims.insert(key.into(), value);
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Reason a type function or meta function refused a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct FieldRejection(pub String);

impl FieldRejection {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Result of a type function
pub type ValidatorResult = Result<Value, FieldRejection>;

/// Everything a type function may look at besides the raw value.
#[derive(Debug, Clone, Copy)]
pub struct FieldEnvelope<'a> {
    /// The raw value, same as the first argument
    pub value: Option<&'a Value>,
    /// The whole record being validated
    pub item: Option<&'a Value>,
    /// Fields validated so far, in schema order
    pub validated: &'a Map<String, Value>,
    /// The requesting actor
    pub actor: Option<&'a Actor>,
}

impl FieldEnvelope<'_> {
    /// Detach the envelope from the validation context.
    pub fn to_input(&self) -> FieldInput {
        FieldInput {
            value: self.value.cloned(),
            item: self.item.cloned(),
            validated: self.validated.clone(),
            actor: self.actor.cloned(),
        }
    }
}

/// Owned copy of a [`FieldEnvelope`], handed to async type functions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldInput {
    pub value: Option<Value>,
    pub item: Option<Value>,
    pub validated: Map<String, Value>,
    pub actor: Option<Actor>,
}

/// A validator applied to a leaf field.
pub trait TypeValidator: Send + Sync {
    /// Name used in schema documents and error messages
    fn name(&self) -> &str;

    /// Validate and normalize a raw value
    fn validate<'a>(
        &'a self,
        raw: Option<&'a Value>,
        envelope: FieldEnvelope<'a>,
    ) -> BoxFuture<'a, ValidatorResult>;
}

impl fmt::Debug for dyn TypeValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeValidator({})", self.name())
    }
}

/// Shared handle to a type function
pub type TypeRef = Arc<dyn TypeValidator>;

/// A function computing a meta field from the validated record.
pub trait MetaFunction: Send + Sync {
    fn compute<'a>(
        &'a self,
        record: &'a Map<String, Value>,
        actor: Option<&'a Actor>,
    ) -> BoxFuture<'a, ValidatorResult>;
}

impl fmt::Debug for dyn MetaFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MetaFunction")
    }
}

/// Shared handle to a meta function
pub type MetaFnRef = Arc<dyn MetaFunction>;

// =============================================================================
// Closure adapters
// =============================================================================

struct SyncType<F> {
    name: String,
    func: F,
}

impl<F> TypeValidator for SyncType<F>
where
    F: Fn(Option<&Value>, FieldEnvelope<'_>) -> ValidatorResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn validate<'a>(
        &'a self,
        raw: Option<&'a Value>,
        envelope: FieldEnvelope<'a>,
    ) -> BoxFuture<'a, ValidatorResult> {
        let result = (self.func)(raw, envelope);
        Box::pin(std::future::ready(result))
    }
}

struct AsyncType<F> {
    name: String,
    func: F,
}

impl<F, Fut> TypeValidator for AsyncType<F>
where
    F: Fn(FieldInput) -> Fut + Send + Sync,
    Fut: Future<Output = ValidatorResult> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn validate<'a>(
        &'a self,
        _raw: Option<&'a Value>,
        envelope: FieldEnvelope<'a>,
    ) -> BoxFuture<'a, ValidatorResult> {
        Box::pin((self.func)(envelope.to_input()))
    }
}

/// Wrap a synchronous closure as a type function.
pub fn sync_type<F>(name: impl Into<String>, func: F) -> TypeRef
where
    F: Fn(Option<&Value>, FieldEnvelope<'_>) -> ValidatorResult + Send + Sync + 'static,
{
    Arc::new(SyncType {
        name: name.into(),
        func,
    })
}

/// Wrap an async closure as a type function.
///
/// The closure receives an owned [`FieldInput`] so the returned future
/// does not borrow from the validation context.
pub fn async_type<F, Fut>(name: impl Into<String>, func: F) -> TypeRef
where
    F: Fn(FieldInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ValidatorResult> + Send + 'static,
{
    Arc::new(AsyncType {
        name: name.into(),
        func,
    })
}

struct SyncMeta<F>(F);

impl<F> MetaFunction for SyncMeta<F>
where
    F: Fn(&Map<String, Value>, Option<&Actor>) -> ValidatorResult + Send + Sync,
{
    fn compute<'a>(
        &'a self,
        record: &'a Map<String, Value>,
        actor: Option<&'a Actor>,
    ) -> BoxFuture<'a, ValidatorResult> {
        Box::pin(std::future::ready((self.0)(record, actor)))
    }
}

struct AsyncMeta<F>(F);

impl<F, Fut> MetaFunction for AsyncMeta<F>
where
    F: Fn(Map<String, Value>, Option<Actor>) -> Fut + Send + Sync,
    Fut: Future<Output = ValidatorResult> + Send + 'static,
{
    fn compute<'a>(
        &'a self,
        record: &'a Map<String, Value>,
        actor: Option<&'a Actor>,
    ) -> BoxFuture<'a, ValidatorResult> {
        Box::pin((self.0)(record.clone(), actor.cloned()))
    }
}

/// Wrap a synchronous closure as a meta function.
pub fn meta_fn<F>(func: F) -> MetaFnRef
where
    F: Fn(&Map<String, Value>, Option<&Actor>) -> ValidatorResult + Send + Sync + 'static,
{
    Arc::new(SyncMeta(func))
}

/// Wrap an async closure as a meta function.
pub fn async_meta_fn<F, Fut>(func: F) -> MetaFnRef
where
    F: Fn(Map<String, Value>, Option<Actor>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ValidatorResult> + Send + 'static,
{
    Arc::new(AsyncMeta(func))
}

// =============================================================================
// Built-in scalar types
// =============================================================================

/// Scalar types every registry knows about.
///
/// Absent and `null` inputs map to `null` for every built-in, so optional
/// fields without a default still validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    /// UTF-8 text; numbers and booleans are rendered
    String,
    /// Any JSON number; numeric strings are parsed
    Number,
    /// Integral number
    Integer,
    /// Boolean; `"true"` / `"false"` are parsed
    Boolean,
    /// RFC 3339 timestamp, normalized to UTC
    Date,
    /// Anything, unchanged
    Any,
}

impl BuiltinType {
    pub const ALL: [BuiltinType; 6] = [
        BuiltinType::String,
        BuiltinType::Number,
        BuiltinType::Integer,
        BuiltinType::Boolean,
        BuiltinType::Date,
        BuiltinType::Any,
    ];

    pub fn type_name(&self) -> &'static str {
        match self {
            BuiltinType::String => "string",
            BuiltinType::Number => "number",
            BuiltinType::Integer => "integer",
            BuiltinType::Boolean => "boolean",
            BuiltinType::Date => "date",
            BuiltinType::Any => "any",
        }
    }

    /// Shared handle for use in schema descriptors
    pub fn handle(self) -> TypeRef {
        Arc::new(self)
    }

    /// Apply the type to a raw value.
    pub fn coerce(&self, raw: Option<&Value>) -> ValidatorResult {
        let value = match raw {
            None | Some(Value::Null) => return Ok(Value::Null),
            Some(value) => value,
        };

        match self {
            BuiltinType::String => match value {
                Value::String(_) => Ok(value.clone()),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                _ => Err(expected("string", value)),
            },
            BuiltinType::Number => match value {
                Value::Number(_) => Ok(value.clone()),
                Value::String(s) => parse_number(s).ok_or_else(|| expected("number", value)),
                _ => Err(expected("number", value)),
            },
            BuiltinType::Integer => {
                let number = match value {
                    Value::Number(_) => value.clone(),
                    Value::String(s) => {
                        parse_number(s).ok_or_else(|| expected("integer", value))?
                    }
                    _ => return Err(expected("integer", value)),
                };
                as_integer(&number).ok_or_else(|| expected("integer", value))
            }
            BuiltinType::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::String(s) if s == "true" => Ok(Value::Bool(true)),
                Value::String(s) if s == "false" => Ok(Value::Bool(false)),
                _ => Err(expected("boolean", value)),
            },
            BuiltinType::Date => {
                let text = value.as_str().ok_or_else(|| expected("date", value))?;
                let parsed = DateTime::parse_from_rfc3339(text)
                    .map_err(|e| FieldRejection::new(format!("invalid date '{}': {}", text, e)))?;
                Ok(Value::String(
                    parsed
                        .with_timezone(&Utc)
                        .to_rfc3339_opts(SecondsFormat::AutoSi, true),
                ))
            }
            BuiltinType::Any => Ok(value.clone()),
        }
    }
}

impl TypeValidator for BuiltinType {
    fn name(&self) -> &str {
        self.type_name()
    }

    fn validate<'a>(
        &'a self,
        raw: Option<&'a Value>,
        _envelope: FieldEnvelope<'a>,
    ) -> BoxFuture<'a, ValidatorResult> {
        Box::pin(std::future::ready(self.coerce(raw)))
    }
}

fn parse_number(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Value::Number(i.into()));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn as_integer(value: &Value) -> Option<Value> {
    let Value::Number(n) = value else {
        return None;
    };
    if n.is_i64() || n.is_u64() {
        return Some(value.clone());
    }
    let f = n.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(Value::Number((f as i64).into()))
    } else {
        None
    }
}

fn expected(kind: &str, actual: &Value) -> FieldRejection {
    FieldRejection::new(format!("expected {}, got {}", kind, json_type_name(actual)))
}

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "int"
            } else {
                "float"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(validated: &Map<String, Value>) -> FieldEnvelope<'_> {
        FieldEnvelope {
            value: None,
            item: None,
            validated,
            actor: None,
        }
    }

    #[test]
    fn test_string_renders_scalars() {
        assert_eq!(BuiltinType::String.coerce(Some(&json!(42))).unwrap(), json!("42"));
        assert_eq!(BuiltinType::String.coerce(Some(&json!(true))).unwrap(), json!("true"));
        assert!(BuiltinType::String.coerce(Some(&json!({"a": 1}))).is_err());
    }

    #[test]
    fn test_absent_maps_to_null() {
        for builtin in BuiltinType::ALL {
            assert_eq!(builtin.coerce(None).unwrap(), Value::Null);
            assert_eq!(builtin.coerce(Some(&Value::Null)).unwrap(), Value::Null);
        }
    }

    #[test]
    fn test_number_parses_strings() {
        assert_eq!(BuiltinType::Number.coerce(Some(&json!("12"))).unwrap(), json!(12));
        assert_eq!(BuiltinType::Number.coerce(Some(&json!("1.5"))).unwrap(), json!(1.5));
        let err = BuiltinType::Number.coerce(Some(&json!("abc"))).unwrap_err();
        assert!(err.message().contains("number"));
    }

    #[test]
    fn test_integer_rejects_fractions() {
        assert_eq!(BuiltinType::Integer.coerce(Some(&json!(3.0))).unwrap(), json!(3));
        assert!(BuiltinType::Integer.coerce(Some(&json!(3.5))).is_err());
    }

    #[test]
    fn test_boolean_parses_literals() {
        assert_eq!(BuiltinType::Boolean.coerce(Some(&json!("false"))).unwrap(), json!(false));
        assert!(BuiltinType::Boolean.coerce(Some(&json!("yes"))).is_err());
    }

    #[test]
    fn test_date_normalizes_to_utc() {
        let out = BuiltinType::Date
            .coerce(Some(&json!("2024-03-01T12:00:00+02:00")))
            .unwrap();
        assert_eq!(out, json!("2024-03-01T10:00:00Z"));
        assert!(BuiltinType::Date.coerce(Some(&json!("yesterday"))).is_err());
    }

    #[tokio::test]
    async fn test_sync_type_sees_envelope() {
        let mut validated = Map::new();
        validated.insert("prefix".into(), json!("id-"));

        let prefixed = sync_type("prefixed", |raw, env| {
            let prefix = env.validated.get("prefix").and_then(Value::as_str).unwrap_or("");
            match raw.and_then(Value::as_str) {
                Some(s) => Ok(json!(format!("{}{}", prefix, s))),
                None => Err(FieldRejection::new("missing")),
            }
        });

        let raw = json!("7");
        let out = prefixed.validate(Some(&raw), envelope(&validated)).await.unwrap();
        assert_eq!(out, json!("id-7"));
        assert_eq!(prefixed.name(), "prefixed");
    }

    #[tokio::test]
    async fn test_async_type_gets_owned_input() {
        let upper = async_type("upper", |input: FieldInput| async move {
            match input.value {
                Some(Value::String(s)) => Ok(Value::String(s.to_uppercase())),
                _ => Err(FieldRejection::new("not a string")),
            }
        });

        let validated = Map::new();
        let raw = json!("abc");
        let mut env = envelope(&validated);
        env.value = Some(&raw);
        assert_eq!(upper.validate(Some(&raw), env).await.unwrap(), json!("ABC"));
    }

    #[tokio::test]
    async fn test_meta_fn_adapters() {
        let mut record = Map::new();
        record.insert("a".into(), json!(2));

        let doubled = meta_fn(|record, _| {
            let a = record.get("a").and_then(Value::as_i64).unwrap_or(0);
            Ok(json!(a * 2))
        });
        assert_eq!(doubled.compute(&record, None).await.unwrap(), json!(4));

        let actor = Actor::new("u1");
        let who = async_meta_fn(|_, actor: Option<Actor>| async move {
            actor
                .and_then(|a| a.id)
                .map(Value::String)
                .ok_or_else(|| FieldRejection::new("anonymous"))
        });
        assert_eq!(who.compute(&record, Some(&actor)).await.unwrap(), json!("u1"));
        assert!(who.compute(&record, None).await.is_err());
    }

    #[test]
    fn test_actor_roles() {
        let actor = Actor::new("u1").with_role("admin");
        assert!(actor.has_role("admin"));
        assert!(!Actor::anonymous().has_role("admin"));
    }
}
