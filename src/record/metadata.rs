//! Metadata Resolution Pass
//!
//! Runs after every data field of a record has been validated. Each
//! bookmarked meta entry becomes one label of the form
//! `<collection>:<readable>_<value>`.

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::schema::{MetaDescriptor, MetaSource};

use super::context::ValidationContext;

/// Resolve the context's bookmarked meta fields into `ctx.metadata`.
///
/// A failing meta function is logged and leaves its key unset; it never
/// fails the validation call.
pub(crate) async fn resolve(ctx: &mut ValidationContext<'_>) {
    let pending = std::mem::take(&mut ctx.pending_meta);

    for (key, meta) in pending {
        let Some(readable) = meta.readable() else {
            debug!(collection = ctx.collection, key, "meta field has no readable label, skipping");
            continue;
        };

        let Some(resolved) = resolve_value(ctx, key, readable, meta).await else {
            continue;
        };

        let label = compose_label(ctx.collection, readable, &resolved);
        ctx.metadata.insert(key.to_string(), label);
    }
}

async fn resolve_value(
    ctx: &ValidationContext<'_>,
    key: &str,
    readable: &str,
    meta: &MetaDescriptor,
) -> Option<String> {
    match &meta.source {
        MetaSource::Reference(fallback) => Some(reference(&ctx.validated, readable, fallback)),
        MetaSource::Static(Value::String(fallback)) => {
            Some(reference(&ctx.validated, readable, fallback))
        }
        MetaSource::Concat(fields) => Some(
            fields
                .iter()
                .map(|field| render_value(ctx.validated.get(field)))
                .collect(),
        ),
        MetaSource::Static(value) => Some(render_value(Some(value))),
        MetaSource::Computed(func) => match func.compute(&ctx.validated, ctx.actor).await {
            Ok(value) => Some(render_value(Some(&value))),
            Err(e) => {
                error!(
                    collection = ctx.collection,
                    key,
                    error = %e,
                    "meta function failed; leaving metadata unset"
                );
                None
            }
        },
    }
}

/// The validated value named `readable`, or the declared literal.
fn reference(validated: &Map<String, Value>, readable: &str, fallback: &str) -> String {
    match validated.get(readable) {
        Some(value) => render_value(Some(value)),
        None => fallback.to_string(),
    }
}

/// Compose a metadata label
pub fn compose_label(collection: &str, readable: &str, resolved: &str) -> String {
    format!("{}:{}_{}", collection, readable, resolved)
}

/// Render a value for a label. Strings are used raw; absent and `null`
/// render as the empty string.
pub fn render_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
