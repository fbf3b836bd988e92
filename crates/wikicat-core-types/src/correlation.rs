//! Correlation identifiers
//!
//! A `RequestId` pairs one confirmation request with exactly one response; a
//! `RunId` tags every log line emitted by a single migration run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation id of a single confirmation round-trip
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh, time-ordered id (UUIDv7)
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap an id received from the review surface
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one migration run (all rows of one input batch)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_request_id_round_trips_through_string() {
        let id = RequestId::new();
        let copy = RequestId::from_string(id.as_str().to_string());
        assert_eq!(id, copy);
        assert_eq!(id.to_string(), copy.as_str());
    }

    #[test]
    fn test_request_id_serializes_as_plain_string() {
        let id = RequestId::from_string("req-1".to_string());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"req-1\"");
    }

    #[test]
    fn test_run_id_display_matches_as_str() {
        let id = RunId::new();
        assert_eq!(format!("{}", id), id.as_str());
    }
}
