//! Canonical schema constants for structured logging
//!
//! These keep field names identical across the worker, the rule store and the
//! review bridge so log consumers can filter on them.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_RUN_ID: &str = "run_id";

// Entity identifiers
pub const FIELD_PAGE: &str = "page";
pub const FIELD_TEMPLATE: &str = "template";
pub const FIELD_PROJECT: &str = "project";

// Retry bookkeeping
pub const FIELD_ATTEMPT: &str = "attempt";
pub const FIELD_PAUSE_MS: &str = "pause_ms";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
pub const EVENT_RETRY: &str = "retry";
