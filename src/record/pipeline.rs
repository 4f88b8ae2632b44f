//! Field Validation Pipeline
//!
//! Walks the schema in declaration order. For each key:
//! 1. Meta fields are bookmarked for the metadata pass
//! 2. Unique fields need a value and must not collide in the store
//! 3. Wildcards are copied through
//! 4. Absent keys fail when required, or take their default
//! 5. Arrays recurse once per element (or once per declared slot when the
//!    input omits the array)
//! 6. Objects recurse once
//! 7. Leaves run their type function, casing, then the global format
//!
//! Fields run strictly one after another. Elements of a single array are
//! validated concurrently and joined before the next key starts. The first
//! error aborts the whole call.

use futures_util::future::try_join_all;
use serde_json::Value;
use tracing::debug;

use crate::schema::{
    BoxFuture, FieldDescriptor, FieldEnvelope, FieldRejection, FieldType, Schema, SchemaEntry,
    TypeRef,
};

use super::context::{Validation, ValidationContext};
use super::duplicate;
use super::errors::{RecordError, RecordResult};
use super::format::is_falsy;
use super::metadata;

static EMPTY_SCHEMA: Schema = Schema::Fields(Vec::new());

/// Validate the context's body against its schema, then resolve metadata.
pub fn run<'a>(mut ctx: ValidationContext<'a>) -> BoxFuture<'a, RecordResult<Validation>> {
    Box::pin(async move {
        let entries = match ctx.schema {
            Schema::Single(validator) => return validate_single_item(&ctx, validator).await,
            Schema::Fields(entries) => entries,
        };

        for (key, entry) in entries {
            match entry {
                SchemaEntry::Meta(meta) => ctx.bookmark_meta(key, meta),
                SchemaEntry::Field(field) => validate_field(&mut ctx, key, field).await?,
            }
        }

        metadata::resolve(&mut ctx).await;
        Ok(ctx.into_validation())
    })
}

async fn validate_field<'a>(
    ctx: &mut ValidationContext<'a>,
    key: &'a str,
    field: &'a FieldDescriptor,
) -> RecordResult<()> {
    if field.is_unique() {
        let value = ctx.body_value(key);
        if value.map_or(true, is_falsy) {
            return Err(RecordError::missing_unique(ctx.field_path(key)));
        }
        if duplicate::is_duplicate(ctx, key).await? {
            return Err(RecordError::duplicate(ctx.field_path(key), value));
        }
    }

    if let FieldType::Wildcard = field.field_type {
        if let Some(value) = ctx.body_value(key) {
            ctx.validated.insert(key.to_string(), value.clone());
        }
        return Ok(());
    }

    if !ctx.body_has(key) {
        if field.required {
            return Err(RecordError::missing_required(ctx.field_path(key)));
        }
        if let Some(default) = &field.default {
            ctx.validated.insert(key.to_string(), default.clone());
            return Ok(());
        }
    }

    debug!(
        collection = ctx.collection,
        field = key,
        kind = field.field_type.type_name(),
        "validating field"
    );

    match &field.field_type {
        FieldType::Array(slots) => validate_items_in_array(ctx, key, slots).await,
        FieldType::Object(schema) => validate_sub_object(ctx, key, schema).await,
        FieldType::Scalar(validator) => validate_leaf(ctx, key, field, validator).await,
        FieldType::Wildcard => Ok(()),
    }
}

async fn validate_items_in_array<'a>(
    ctx: &mut ValidationContext<'a>,
    key: &'a str,
    slots: &'a [Schema],
) -> RecordResult<()> {
    let nested = slots.first().unwrap_or(&EMPTY_SCHEMA);
    let path = ctx.field_path(key);

    let items: Vec<Option<&'a Value>> = match ctx.body_value(key) {
        Some(Value::Array(values)) => values.iter().map(Some).collect(),
        None | Some(Value::Null) => slots.iter().map(|_| None).collect(),
        Some(other) => {
            return Err(RecordError::invalid_field(
                path,
                Some(other),
                FieldRejection::new("expected an array"),
            ))
        }
    };

    let elements = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| run(ctx.nested(nested, item, &format!("{}[{}]", path, i))));
    let results = try_join_all(elements).await?;

    ctx.validated.insert(
        key.to_string(),
        Value::Array(results.into_iter().map(|r| r.validated).collect()),
    );
    Ok(())
}

async fn validate_sub_object<'a>(
    ctx: &mut ValidationContext<'a>,
    key: &'a str,
    schema: &'a Schema,
) -> RecordResult<()> {
    let nested = ctx.nested(schema, ctx.body_value(key), &ctx.field_path(key));
    let result = run(nested).await?;
    ctx.validated.insert(key.to_string(), result.validated);
    Ok(())
}

async fn validate_leaf<'a>(
    ctx: &mut ValidationContext<'a>,
    key: &'a str,
    field: &'a FieldDescriptor,
    validator: &'a TypeRef,
) -> RecordResult<()> {
    let raw = ctx.body_value(key);
    let envelope = FieldEnvelope {
        value: raw,
        item: ctx.body,
        validated: &ctx.validated,
        actor: ctx.actor,
    };

    let value = validator
        .validate(raw, envelope)
        .await
        .map_err(|cause| RecordError::invalid_field(ctx.field_path(key), raw, cause))?;

    let value = field.casing.apply(value);
    let value = match ctx.formatting {
        Some(format) => format.apply(ctx.collection, key, value).await,
        None => value,
    };

    ctx.validated.insert(key.to_string(), value);
    Ok(())
}

/// Single-value schemas apply the type function to the whole body. Falsy
/// and absent bodies pass through untouched.
async fn validate_single_item(
    ctx: &ValidationContext<'_>,
    validator: &TypeRef,
) -> RecordResult<Validation> {
    let validated = match ctx.body {
        Some(body) if !is_falsy(body) => {
            let envelope = FieldEnvelope {
                value: Some(body),
                item: Some(body),
                validated: &ctx.validated,
                actor: ctx.actor,
            };
            validator
                .validate(Some(body), envelope)
                .await
                .map_err(|cause| RecordError::invalid_field(ctx.own_path(), Some(body), cause))?
        }
        other => other.cloned().unwrap_or(Value::Null),
    };

    Ok(Validation {
        validated,
        metadata: Default::default(),
    })
}
