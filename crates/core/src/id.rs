//! Unique identifiers for runtime entities.
//!
//! Strongly-typed UUID identifiers built on
//! [`domain-key`](https://crates.io/crates/domain-key) `Uuid<D>` wrappers.
//! Each identifier type is parameterized by its own domain marker, so a
//! [`WorkItemId`] can never be passed where a [`NodeInstanceId`] is expected.
//!
//! All ID types are `Copy` and support:
//! - `v4()` for random UUID generation
//! - `nil()` for zero-valued default
//! - `parse(&str)` for string parsing
//! - Full serde support (serializes as UUID string)
//! - `Display`, `FromStr`, `Eq`, `Ord`, `Hash`

use domain_key::define_uuid;

// Re-export for downstream parse error handling
pub use domain_key::UuidParseError;

define_uuid!(ProcessInstanceIdDomain => ProcessInstanceId);
define_uuid!(NodeInstanceIdDomain => NodeInstanceId);
define_uuid!(WorkItemIdDomain => WorkItemId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_creates_non_nil_ids() {
        assert!(!ProcessInstanceId::v4().is_nil());
        assert!(!NodeInstanceId::v4().is_nil());
        assert!(!WorkItemId::v4().is_nil());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(WorkItemId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn display_matches_parsed_input() {
        let id = ProcessInstanceId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(id.to_string(), "550e8400-e29b-41d4-a716-446655440000");
    }

    #[test]
    fn serializes_as_uuid_string() {
        let id = WorkItemId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"550e8400-e29b-41d4-a716-446655440000\"");
        let back: WorkItemId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn ids_are_hashable() {
        use std::collections::HashSet;
        let id = NodeInstanceId::v4();
        let mut set = HashSet::new();
        set.insert(id);
        assert!(set.contains(&id));
    }
}
