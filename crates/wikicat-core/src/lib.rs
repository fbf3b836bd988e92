//! wikicat core: the category-migration kernel
//!
//! This crate holds everything that does not touch a disk, a network or a
//! thread:
//! - Structured error and logging facilities
//! - Template invocation parsing, span scanning and diffing
//! - The rule model and the in-memory [`RuleBook`] that learns and applies substitutions
//! - Direct link rewriting and template-parameter candidate detection
//! - Collaborator traits for page storage, membership listing, namespace
//!   resolution and human review

pub mod candidates;
pub mod errors;
pub mod invocation;
pub mod links;
pub mod logging_facility;
pub mod namespace;
pub mod pages;
pub mod review;
pub mod rules;
pub mod summary;
pub mod text;

pub use errors::{ExError, ExErrorKind, Result, WikicatError};
pub use invocation::Invocation;
pub use namespace::{NamespaceId, NamespacePrefixResolver, ProjectRef, StaticNamespaceResolver};
pub use pages::{MemberBatch, MembershipLister, PageStore};
pub use review::{
    ConfirmationRequest, ConfirmationResponse, ReviewAction, ReviewSurface, SkipAllReviewSurface,
};
pub use rules::{AutoState, DedupePolicy, Rule, RuleBook, RuleBucket};
