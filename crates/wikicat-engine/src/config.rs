//! TOML configuration
//!
//! ```toml
//! [migration]
//! family = "wikipedia"
//! lang = "en"
//! namespace = "auto"        # or a namespace id such as 14
//! move_category = true
//! phase2 = true
//! title_filter = "^List of"
//!
//! [throttle]
//! base_interval_secs = 0.25
//!
//! [review]
//! poll_interval_ms = 100
//!
//! [[namespaces]]
//! id = 14
//! primary = "Категория"
//! aliases = ["К"]
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.

use crate::confirmation::POLL_INTERVAL;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use wikicat_core::errors::{ExError, Result, WikicatError};
use wikicat_core::namespace::{LocalNamespace, NamespaceId, ProjectRef, StaticNamespaceResolver};

fn invalid(reason: impl Into<String>) -> ExError {
    ExError::from(WikicatError::InvalidConfig {
        reason: reason.into(),
    })
}

/// How row titles are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "RawSelection")]
pub enum NamespaceSelection {
    /// Titles are used as given; a row is a category when its old title has a category prefix
    #[default]
    Auto,
    /// Bare titles get this namespace's prefix
    Id(NamespaceId),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSelection {
    Id(i32),
    Text(String),
}

impl TryFrom<RawSelection> for NamespaceSelection {
    type Error = String;

    fn try_from(raw: RawSelection) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawSelection::Id(id) => Ok(NamespaceSelection::Id(NamespaceId(id))),
            RawSelection::Text(text) => text.parse(),
        }
    }
}

impl FromStr for NamespaceSelection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(NamespaceSelection::Auto);
        }
        s.parse::<i32>()
            .map(|id| NamespaceSelection::Id(NamespaceId(id)))
            .map_err(|_| format!("namespace must be 'auto' or a number, got '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MigrationOptions {
    pub family: String,
    pub lang: String,
    pub namespace: NamespaceSelection,
    pub leave_category_redirect: bool,
    pub leave_other_redirect: bool,
    pub move_category: bool,
    pub move_members: bool,
    pub phase1: bool,
    pub phase2: bool,
    pub minor_edits: bool,
    /// Replaces every row comment in summaries when set
    pub override_comment: Option<String>,
    /// Regex a member title must match to be processed
    pub title_filter: Option<String>,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            family: "wikipedia".to_string(),
            lang: "en".to_string(),
            namespace: NamespaceSelection::Auto,
            leave_category_redirect: false,
            leave_other_redirect: true,
            move_category: true,
            move_members: true,
            phase1: true,
            phase2: true,
            minor_edits: true,
            override_comment: None,
            title_filter: None,
        }
    }
}

impl MigrationOptions {
    pub fn project(&self) -> ProjectRef {
        ProjectRef::new(&self.family, &self.lang)
    }
}

/// Adaptive write pacing; attempts count the first try
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThrottleSettings {
    pub base_interval_secs: f64,
    pub floor_secs: f64,
    pub ceiling_secs: f64,
    pub growth: f64,
    pub decay: f64,
    pub save_attempts: u32,
    pub move_attempts: u32,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            base_interval_secs: 0.25,
            floor_secs: 0.2,
            ceiling_secs: 2.5,
            growth: 1.5,
            decay: 0.9,
            save_attempts: 6,
            move_attempts: 3,
        }
    }
}

impl ThrottleSettings {
    /// Settings without any pause, for offline stores and tests
    pub fn unthrottled() -> Self {
        Self {
            base_interval_secs: 0.0,
            floor_secs: 0.0,
            ceiling_secs: 0.0,
            ..Self::default()
        }
    }

    /// # Errors
    ///
    /// Rejects negative or non-finite intervals, a floor above the ceiling,
    /// growth below 1, decay outside `(0, 1]` and zero attempt counts.
    pub fn validate(&self) -> Result<()> {
        let intervals = [self.base_interval_secs, self.floor_secs, self.ceiling_secs];
        if intervals.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(invalid("throttle intervals must be finite and non-negative"));
        }
        if self.floor_secs > self.ceiling_secs {
            return Err(invalid("throttle floor exceeds ceiling"));
        }
        let growth_ok = self.growth.is_finite() && self.growth >= 1.0;
        let decay_ok = self.decay.is_finite() && self.decay > 0.0 && self.decay <= 1.0;
        if !growth_ok || !decay_ok {
            return Err(invalid("throttle growth must be >= 1 and decay in (0, 1]"));
        }
        if self.save_attempts == 0 || self.move_attempts == 0 {
            return Err(invalid("attempt counts must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReviewSettings {
    pub poll_interval_ms: u64,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl ReviewSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WikicatConfig {
    pub migration: MigrationOptions,
    pub throttle: ThrottleSettings,
    pub review: ReviewSettings,
    pub namespaces: Vec<LocalNamespace>,
}

impl WikicatConfig {
    /// # Errors
    ///
    /// Returns `ERR_INVALID_INPUT` when the text is not valid TOML for this
    /// shape or the throttle settings are inconsistent.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: WikicatConfig = toml::from_str(text).map_err(|e| invalid(e.to_string()))?;
        config.throttle.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Fails when the file cannot be read or does not parse.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| invalid(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Namespace resolver seeded with the configured local tables
    pub fn resolver(&self) -> StaticNamespaceResolver {
        let project = self.migration.project();
        self.namespaces
            .iter()
            .cloned()
            .fold(StaticNamespaceResolver::new(), |resolver, entry| {
                resolver.with_local(&project, entry)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wikicat_core::namespace::NamespacePrefixResolver;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = WikicatConfig::from_toml_str("").unwrap();
        assert_eq!(config, WikicatConfig::default());
        assert_eq!(config.throttle.save_attempts, 6);
        assert_eq!(config.review.poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_full_file() {
        let config = WikicatConfig::from_toml_str(
            r#"
            [migration]
            family = "wikipedia"
            lang = "ru"
            namespace = 14
            phase1 = false
            override_comment = "по обсуждению"
            title_filter = "^Список"

            [throttle]
            base_interval_secs = 0.5

            [review]
            poll_interval_ms = 20

            [[namespaces]]
            id = 14
            primary = "Категория"
            aliases = ["К"]
            "#,
        )
        .unwrap();

        assert_eq!(config.migration.namespace, NamespaceSelection::Id(NamespaceId::CATEGORY));
        assert!(!config.migration.phase1);
        assert!(config.migration.phase2);
        assert_eq!(config.throttle.base_interval_secs, 0.5);
        assert_eq!(config.throttle.ceiling_secs, 2.5);

        let project = config.migration.project();
        assert_eq!(
            config.resolver().policy_prefix(&project, NamespaceId::CATEGORY),
            "Категория:"
        );
    }

    #[test]
    fn test_namespace_keyword() {
        let config = WikicatConfig::from_toml_str("[migration]\nnamespace = \"AUTO\"\n").unwrap();
        assert_eq!(config.migration.namespace, NamespaceSelection::Auto);
        assert!(WikicatConfig::from_toml_str("[migration]\nnamespace = \"main\"\n").is_err());
        assert_eq!("10".parse::<NamespaceSelection>(), Ok(NamespaceSelection::Id(NamespaceId::TEMPLATE)));
    }

    #[test]
    fn test_inconsistent_throttle_rejected() {
        let err = WikicatConfig::from_toml_str("[throttle]\nfloor_secs = 3.0\n").unwrap_err();
        assert_eq!(err.kind(), wikicat_core::ExErrorKind::InvalidInput);
    }
}
