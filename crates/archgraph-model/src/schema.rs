//! Per-kind schema table
//!
//! Required attributes, permitted endpoint kinds and structural cardinality
//! rules are data, looked up by kind. Nothing in the engine branches on a
//! specific kind outside this table.

use crate::kind::{EdgeKind, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Schema entry for a node kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSchema {
    /// Kind this entry describes
    pub kind: NodeKind,
    /// Attributes every element of this kind must carry
    pub required: Vec<String>,
}

/// Schema entry for an edge kind
///
/// When `pairs` is non-empty it is authoritative; otherwise the endpoint
/// kinds are checked independently against `from_kinds` and `to_kinds`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSchema {
    /// Kind this entry describes
    pub kind: EdgeKind,
    /// Explicit `(from, to)` kind pairs
    pub pairs: Vec<(NodeKind, NodeKind)>,
    /// Fallback source kinds
    pub from_kinds: Vec<NodeKind>,
    /// Fallback target kinds
    pub to_kinds: Vec<NodeKind>,
    /// Attributes every relationship of this kind must carry
    pub required: Vec<String>,
}

impl EdgeSchema {
    fn with_pairs(kind: EdgeKind, pairs: &[(NodeKind, NodeKind)]) -> Self {
        Self {
            kind,
            pairs: pairs.to_vec(),
            from_kinds: Vec::new(),
            to_kinds: Vec::new(),
            required: Vec::new(),
        }
    }

    fn with_sets(kind: EdgeKind, from: &[NodeKind], to: &[NodeKind]) -> Self {
        Self {
            kind,
            pairs: Vec::new(),
            from_kinds: from.to_vec(),
            to_kinds: to.to_vec(),
            required: Vec::new(),
        }
    }

    /// Whether `from → to` is a legal endpoint combination
    #[must_use]
    pub fn permits(&self, from: NodeKind, to: NodeKind) -> bool {
        if self.pairs.is_empty() {
            self.from_kinds.contains(&from) && self.to_kinds.contains(&to)
        } else {
            self.pairs.contains(&(from, to))
        }
    }
}

/// Edge direction relative to the constrained node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Edges pointing at the node
    Incoming,
    /// Edges leaving the node
    Outgoing,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Incoming => f.write_str("incoming"),
            Direction::Outgoing => f.write_str("outgoing"),
        }
    }
}

/// When a cardinality rule is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleActivation {
    /// On every commit
    Always,
    /// Only once a staged element reaches a review-ready lifecycle state
    ReviewReady,
}

/// Structural constraint on the count of typed edges incident to a typed node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardinalityRule {
    /// Stable check identifier reported in findings
    pub check_id: String,
    /// Constrained node kind
    pub node_kind: NodeKind,
    /// Counted edge kind
    pub edge_kind: EdgeKind,
    /// Which incident edges are counted
    pub direction: Direction,
    /// Kind of the node at the other end of counted edges
    pub peer_kind: NodeKind,
    /// Minimum number of matching edges
    pub min: usize,
    /// Maximum number of matching edges (`None` = unbounded)
    pub max: Option<usize>,
    /// Evaluation gate
    pub activation: RuleActivation,
}

impl CardinalityRule {
    /// Whether `count` matching edges satisfies the rule
    #[inline]
    #[must_use]
    pub fn admits(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }

    /// Human-readable bound, e.g. `exactly 1` or `at least 1`
    #[must_use]
    pub fn bound(&self) -> String {
        match self.max {
            Some(max) if max == self.min => format!("exactly {max}"),
            Some(max) => format!("between {} and {max}", self.min),
            None => format!("at least {}", self.min),
        }
    }
}

/// Lookup table of node schemas, edge schemas and cardinality rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRegistry {
    nodes: BTreeMap<NodeKind, NodeSchema>,
    edges: BTreeMap<EdgeKind, EdgeSchema>,
    rules: Vec<CardinalityRule>,
}

impl SchemaRegistry {
    /// The built-in enterprise architecture metamodel
    #[must_use]
    pub fn standard() -> Self {
        use NodeKind::{
            Application, ApplicationService, BusinessProcess, Capability, DataEntity, Department,
            Enterprise, Principle, Project, Technology,
        };

        let nodes = NodeKind::ALL
            .into_iter()
            .map(|kind| {
                let required: &[&str] = match kind {
                    DataEntity => &["name", "classification"],
                    Project => &["name", "startDate"],
                    _ => &["name"],
                };
                (
                    kind,
                    NodeSchema {
                        kind,
                        required: required.iter().map(|s| (*s).to_string()).collect(),
                    },
                )
            })
            .collect();

        let tech_layer = [Application, ApplicationService, Technology];
        let edges = [
            EdgeSchema::with_pairs(
                EdgeKind::Owns,
                &[
                    (Enterprise, Department),
                    (Enterprise, Capability),
                    (Enterprise, Principle),
                    (Department, Application),
                    (Department, Technology),
                    (Application, DataEntity),
                ],
            ),
            EdgeSchema::with_sets(
                EdgeKind::Supports,
                &[Application, Technology],
                &[Capability, BusinessProcess],
            ),
            EdgeSchema::with_pairs(EdgeKind::Realizes, &[(Application, ApplicationService)]),
            EdgeSchema::with_sets(
                EdgeKind::Serves,
                &[ApplicationService],
                &[BusinessProcess, Capability, Application],
            ),
            EdgeSchema::with_sets(EdgeKind::DependsOn, &tech_layer, &tech_layer),
            EdgeSchema::with_sets(
                EdgeKind::Uses,
                &[BusinessProcess, Application],
                &[Application, ApplicationService, DataEntity],
            ),
            EdgeSchema::with_pairs(
                EdgeKind::Stores,
                &[(Application, DataEntity), (Technology, DataEntity)],
            ),
            EdgeSchema::with_pairs(
                EdgeKind::Composes,
                &[
                    (Capability, Capability),
                    (BusinessProcess, BusinessProcess),
                    (Department, Department),
                    (Application, Application),
                ],
            ),
            EdgeSchema::with_sets(EdgeKind::Impacts, &[Project], &NodeKind::ALL),
            EdgeSchema::with_sets(EdgeKind::Governs, &[Principle], &NodeKind::ALL),
        ]
        .into_iter()
        .map(|schema| (schema.kind, schema))
        .collect();

        let rules = vec![
            CardinalityRule {
                check_id: "cardinality.capability-owner".to_string(),
                node_kind: Capability,
                edge_kind: EdgeKind::Owns,
                direction: Direction::Incoming,
                peer_kind: Enterprise,
                min: 1,
                max: Some(1),
                activation: RuleActivation::Always,
            },
            CardinalityRule {
                check_id: "cardinality.application-supports-capability".to_string(),
                node_kind: Application,
                edge_kind: EdgeKind::Supports,
                direction: Direction::Outgoing,
                peer_kind: Capability,
                min: 1,
                max: None,
                activation: RuleActivation::ReviewReady,
            },
            CardinalityRule {
                check_id: "cardinality.service-realized-by-application".to_string(),
                node_kind: ApplicationService,
                edge_kind: EdgeKind::Realizes,
                direction: Direction::Incoming,
                peer_kind: Application,
                min: 1,
                max: Some(1),
                activation: RuleActivation::ReviewReady,
            },
        ];

        Self {
            nodes,
            edges,
            rules,
        }
    }

    /// Schema entry for a node kind
    #[inline]
    #[must_use]
    pub fn node(&self, kind: NodeKind) -> Option<&NodeSchema> {
        self.nodes.get(&kind)
    }

    /// Schema entry for an edge kind
    #[inline]
    #[must_use]
    pub fn edge(&self, kind: EdgeKind) -> Option<&EdgeSchema> {
        self.edges.get(&kind)
    }

    /// Required attributes for a node kind (empty when unconfigured)
    #[must_use]
    pub fn required_node_attributes(&self, kind: NodeKind) -> &[String] {
        self.node(kind).map_or(&[], |schema| schema.required.as_slice())
    }

    /// Required attributes for an edge kind (empty when unconfigured)
    #[must_use]
    pub fn required_edge_attributes(&self, kind: EdgeKind) -> &[String] {
        self.edge(kind).map_or(&[], |schema| schema.required.as_slice())
    }

    /// Whether an edge of `kind` may connect `from → to`
    ///
    /// Edge kinds without a schema entry accept no endpoints.
    #[must_use]
    pub fn permits(&self, kind: EdgeKind, from: NodeKind, to: NodeKind) -> bool {
        self.edge(kind).is_some_and(|schema| schema.permits(from, to))
    }

    /// All cardinality rules, in registration order
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &[CardinalityRule] {
        &self.rules
    }

    /// Cardinality rules constraining `kind`
    pub fn rules_for(&self, kind: NodeKind) -> impl Iterator<Item = &CardinalityRule> {
        self.rules.iter().filter(move |rule| rule.node_kind == kind)
    }

    /// Registry with an additional cardinality rule
    #[must_use]
    pub fn with_rule(mut self, rule: CardinalityRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Registry with the required attributes of `kind` replaced
    #[must_use]
    pub fn with_required_node_attributes(mut self, kind: NodeKind, required: &[&str]) -> Self {
        let required = required.iter().map(|s| (*s).to_string()).collect();
        self.nodes.insert(kind, NodeSchema { kind, required });
        self
    }

    /// Registry with the edge schema of `schema.kind` replaced
    #[must_use]
    pub fn with_edge_schema(mut self, schema: EdgeSchema) -> Self {
        self.edges.insert(schema.kind, schema);
        self
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_pairs_are_authoritative() {
        let schema = SchemaRegistry::standard();
        assert!(schema.permits(EdgeKind::Owns, NodeKind::Enterprise, NodeKind::Capability));
        // Department may own applications, but not capabilities
        assert!(schema.permits(EdgeKind::Owns, NodeKind::Department, NodeKind::Application));
        assert!(!schema.permits(EdgeKind::Owns, NodeKind::Department, NodeKind::Capability));
    }

    #[test]
    fn fallback_sets_apply_without_pairs() {
        let schema = SchemaRegistry::standard();
        assert!(schema.permits(EdgeKind::Supports, NodeKind::Technology, NodeKind::BusinessProcess));
        assert!(!schema.permits(EdgeKind::Supports, NodeKind::Capability, NodeKind::Application));
        assert!(schema.permits(EdgeKind::Governs, NodeKind::Principle, NodeKind::Project));
    }

    #[test]
    fn every_kind_requires_a_name() {
        let schema = SchemaRegistry::standard();
        for kind in NodeKind::ALL {
            assert!(schema
                .required_node_attributes(kind)
                .iter()
                .any(|attr| attr == "name"));
        }
    }

    #[test]
    fn cardinality_bounds() {
        let schema = SchemaRegistry::standard();
        let owner = schema.rules_for(NodeKind::Capability).next().unwrap();
        assert!(!owner.admits(0));
        assert!(owner.admits(1));
        assert!(!owner.admits(2));
        assert_eq!(owner.bound(), "exactly 1");

        let supports = schema.rules_for(NodeKind::Application).next().unwrap();
        assert!(supports.admits(5));
        assert_eq!(supports.bound(), "at least 1");
    }

    #[test]
    fn edge_schema_override_switches_to_sets() {
        let schema = SchemaRegistry::standard().with_edge_schema(EdgeSchema {
            kind: EdgeKind::Realizes,
            pairs: Vec::new(),
            from_kinds: vec![NodeKind::Technology],
            to_kinds: vec![NodeKind::ApplicationService],
            required: Vec::new(),
        });
        assert!(schema.permits(EdgeKind::Realizes, NodeKind::Technology, NodeKind::ApplicationService));
        assert!(!schema.permits(EdgeKind::Realizes, NodeKind::Application, NodeKind::ApplicationService));
    }
}
