//! Record validation for aerorecord
//!
//! Turns an untyped input record into a validated, normalized record plus
//! derived metadata labels.
//!
//! Control flow per call:
//! 1. [`RecordBuilder`] creates a [`ValidationContext`]
//! 2. The pipeline validates data fields in declaration order, recursing
//!    into nested objects and arrays with fresh contexts
//! 3. Unique fields are checked against a [`RecordStore`]
//! 4. Meta fields are resolved once all data fields are done
//!
//! Every validation error is fatal. Meta function failures and empty
//! global-format results are logged and skipped.

mod builder;
mod context;
mod duplicate;
mod errors;
mod format;
mod metadata;
mod pipeline;

pub use builder::{IdGenerator, RecordBuilder, SavedRecord, UuidGenerator};
pub use context::{Validation, ValidationContext};
pub use duplicate::{is_duplicate, MemoryRecordStore, RecordStore, StoredMatch, StoredRecord, ID_FIELD};
pub use errors::{RecordError, RecordResult, StoreError, StoreResult};
pub use format::{is_falsy, FormatHook, GlobalFormat};
pub use metadata::{compose_label, render_value};
pub use pipeline::run as validate;
