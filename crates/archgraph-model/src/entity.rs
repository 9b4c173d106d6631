//! Committed graph entities and attribute bookkeeping

use crate::ids::{EdgeId, NodeId};
use crate::kind::{EdgeKind, NodeKind};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Semantic attribute map (key → JSON value)
pub type Attributes = BTreeMap<String, Value>;

/// Creation timestamp (engine-managed)
pub const CREATED_AT: &str = "createdAt";
/// Creating actor (engine-managed)
pub const CREATED_BY: &str = "createdBy";
/// Last modification timestamp (engine-managed)
pub const LAST_MODIFIED_AT: &str = "lastModifiedAt";
/// Last modifying actor (engine-managed)
pub const LAST_MODIFIED_BY: &str = "lastModifiedBy";

/// Attributes owned by the engine, never by callers
pub const BOOKKEEPING_KEYS: [&str; 4] = [CREATED_AT, CREATED_BY, LAST_MODIFIED_AT, LAST_MODIFIED_BY];

/// Who performed a mutation and when
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    /// Acting user
    pub actor: String,
    /// Mutation time
    pub at: DateTime<Utc>,
}

impl Stamp {
    /// Stamp for `actor` at the current wall-clock time
    #[inline]
    #[must_use]
    pub fn now(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            at: Utc::now(),
        }
    }

    /// Stamp for `actor` at a fixed time
    #[inline]
    #[must_use]
    pub fn at(actor: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            actor: actor.into(),
            at,
        }
    }

    fn timestamp(&self) -> Value {
        Value::String(self.at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Write creation and modification bookkeeping
    pub fn mark_created(&self, attributes: &mut Attributes) {
        attributes.insert(CREATED_AT.to_string(), self.timestamp());
        attributes.insert(CREATED_BY.to_string(), Value::String(self.actor.clone()));
        self.mark_modified(attributes);
    }

    /// Write modification bookkeeping
    pub fn mark_modified(&self, attributes: &mut Attributes) {
        attributes.insert(LAST_MODIFIED_AT.to_string(), self.timestamp());
        attributes.insert(LAST_MODIFIED_BY.to_string(), Value::String(self.actor.clone()));
    }
}

/// Copy of `attributes` without engine-managed fields
#[must_use]
pub fn strip_bookkeeping(attributes: &Attributes) -> Attributes {
    attributes
        .iter()
        .filter(|(key, _)| !BOOKKEEPING_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// How an attribute patch combines with existing attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchMode {
    /// Semantic attributes become exactly the patch
    Replace,
    /// Patch keys overwrite; `null` removes a key
    #[default]
    Merge,
}

/// Apply `patch` to `target`
///
/// Bookkeeping keys in the patch are ignored and bookkeeping already on the
/// target survives either mode.
pub fn apply_patch(target: &mut Attributes, patch: &Attributes, mode: PatchMode) {
    if mode == PatchMode::Replace {
        target.retain(|key, _| BOOKKEEPING_KEYS.contains(&key.as_str()));
    }
    for (key, value) in patch {
        if BOOKKEEPING_KEYS.contains(&key.as_str()) {
            continue;
        }
        if value.is_null() {
            target.remove(key);
        } else {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Committed architecture element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Immutable identifier
    pub id: NodeId,
    /// Element kind
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Semantic and bookkeeping attributes
    #[serde(default)]
    pub attributes: Attributes,
}

impl Node {
    /// Display name, if the element has one
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.attributes.get("name").and_then(Value::as_str)
    }
}

/// Committed directed relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Immutable identifier
    pub id: EdgeId,
    /// Relationship kind
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    /// Source node
    pub from_id: NodeId,
    /// Target node
    pub to_id: NodeId,
    /// Semantic and bookkeeping attributes
    #[serde(default)]
    pub attributes: Attributes,
}

impl Edge {
    /// Whether `node` is either endpoint
    #[inline]
    #[must_use]
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.from_id == node || &self.to_id == node
    }
}

/// Request to create a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Caller-chosen id; generated when absent
    #[serde(default)]
    pub id: Option<NodeId>,
    /// Element kind
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Semantic attributes
    #[serde(default)]
    pub attributes: Attributes,
}

impl NodeSpec {
    /// Spec with a generated id
    #[inline]
    #[must_use]
    pub fn new(kind: NodeKind, attributes: Attributes) -> Self {
        Self {
            id: None,
            kind,
            attributes,
        }
    }

    /// Use an explicit id
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Request to create an edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSpec {
    /// Caller-chosen id; generated when absent
    #[serde(default)]
    pub id: Option<EdgeId>,
    /// Relationship kind
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    /// Source node
    pub from_id: NodeId,
    /// Target node
    pub to_id: NodeId,
    /// Semantic attributes
    #[serde(default)]
    pub attributes: Attributes,
}

impl EdgeSpec {
    /// Spec with a generated id and no attributes
    #[inline]
    #[must_use]
    pub fn new(kind: EdgeKind, from_id: impl Into<NodeId>, to_id: impl Into<NodeId>) -> Self {
        Self {
            id: None,
            kind,
            from_id: from_id.into(),
            to_id: to_id.into(),
            attributes: Attributes::new(),
        }
    }

    /// Use an explicit id
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<EdgeId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach attributes
    #[inline]
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(pairs: &[(&str, Value)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn merge_overwrites_and_null_removes() {
        let mut target = attrs(&[("name", json!("Payments")), ("tier", json!(1))]);
        let patch = attrs(&[("tier", json!(2)), ("name", Value::Null), ("owner", json!("ops"))]);

        apply_patch(&mut target, &patch, PatchMode::Merge);

        assert_eq!(target, attrs(&[("tier", json!(2)), ("owner", json!("ops"))]));
    }

    #[test]
    fn replace_keeps_bookkeeping_only() {
        let mut target = attrs(&[("name", json!("Payments")), (CREATED_BY, json!("alice"))]);
        let patch = attrs(&[("label", json!("P")), (CREATED_BY, json!("mallory"))]);

        apply_patch(&mut target, &patch, PatchMode::Replace);

        assert_eq!(
            target,
            attrs(&[("label", json!("P")), (CREATED_BY, json!("alice"))])
        );
    }

    #[test]
    fn stamps_write_all_bookkeeping_fields() {
        let mut target = Attributes::new();
        Stamp::now("alice").mark_created(&mut target);
        for key in BOOKKEEPING_KEYS {
            assert!(target.contains_key(key), "missing {key}");
        }
        assert!(strip_bookkeeping(&target).is_empty());
    }

    #[test]
    fn edge_serializes_with_camel_case_endpoints() {
        let edge = Edge {
            id: EdgeId::new("e1"),
            kind: EdgeKind::Owns,
            from_id: NodeId::new("ent"),
            to_id: NodeId::new("cap"),
            attributes: Attributes::new(),
        };
        let value = serde_json::to_value(&edge).unwrap();
        assert_eq!(value["fromId"], json!("ent"));
        assert_eq!(value["type"], json!("OWNS"));
    }
}
