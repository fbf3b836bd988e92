//! On-disk rule file
//!
//! Current layout:
//!
//! ```json
//! {
//!   "en:wikipedia": {
//!     "templates": {
//!       "Infobox settlement": {
//!         "auto": "none",
//!         "rules": [
//!           {"type": "named", "param": "location", "from": "Old", "to": "New", "auto": "approve"}
//!         ]
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Older files are accepted through [`upgrade::upgrade`] and rewritten once
//! in the current layout.

pub mod format;
pub mod upgrade;

pub use format::{ProjectRules, RulesDocument};
pub use upgrade::{upgrade, Upgraded};
