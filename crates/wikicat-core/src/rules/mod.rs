//! Template rule learning and matching
//!
//! A bucket holds everything learned about one template on one project: the
//! concrete substitutions a reviewer confirmed and the bucket-level
//! disposition (`approve`, `skip` or `none`). [`RuleBook`] owns all buckets in
//! memory; persistence lives in the store crate.

pub mod book;
pub mod matcher;
pub mod model;

pub use book::{ParamRef, Resolution, RuleBook};
pub use matcher::{apply_bucket, apply_rule, dedupe_positional, duplicate_slots};
pub use model::{AutoState, BucketKey, DedupePolicy, Rule, RuleBucket, RuleKind, SequenceStep};
