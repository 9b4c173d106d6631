//! Commit-time validation
//!
//! [`ValidationPipeline`] runs two passes over the [`ProposedGraph`]:
//!
//! 1. Mandatory fields: required attributes of every live node draft,
//!    endpoint resolution and endpoint types of every live edge draft.
//! 2. Structural cardinality over every touched node.
//!
//! Findings come back in a stable order (pass 1 before pass 2, drafts in
//! staging order). The pipeline never fails; blocking is decided from the
//! severities alone.

use crate::proposed::ProposedGraph;
use crate::workspace::Workspace;
use archgraph_model::{
    Attributes, CardinalityRule, Direction, ErrorCode, LifecycleState, NodeId, RuleActivation,
    SchemaRegistry,
};
use archgraph_repository::GraphRepository;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Check id for required attributes
pub const CHECK_REQUIRED_ATTRIBUTE: &str = "mandatory.required-attribute";
/// Check id for edge endpoint resolution
pub const CHECK_ENDPOINT_RESOLVED: &str = "mandatory.endpoint-resolved";
/// Check id for edge endpoint kinds
pub const CHECK_ENDPOINT_TYPES: &str = "mandatory.endpoint-types";

/// Finding severity, least severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// Guidance; never blocks
    Warning,
    /// Blocks under blocking validation
    Error,
    /// Structural breakage; blocks under blocking validation
    Blocker,
}

impl Severity {
    /// Whether this severity refuses a commit
    #[inline]
    #[must_use]
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Error | Self::Blocker)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Blocker => "blocker",
        })
    }
}

/// What a finding is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCategory {
    /// Required attribute missing, null or blank
    MissingRequiredAttribute,
    /// Edge endpoint absent from the proposed graph
    DanglingEndpoint,
    /// Endpoint kinds not permitted for the edge kind
    InvalidEndpointTypes,
    /// Edge count outside a rule's bounds
    CardinalityViolation,
    /// Review-gated rule not yet active
    DeferredCheck,
}

impl FindingCategory {
    /// Taxonomy code, when one applies
    #[must_use]
    pub fn code(self) -> Option<ErrorCode> {
        match self {
            Self::MissingRequiredAttribute => Some(ErrorCode::MissingRequiredAttribute),
            Self::DanglingEndpoint => Some(ErrorCode::DanglingEndpoint),
            Self::InvalidEndpointTypes => Some(ErrorCode::InvalidEndpointTypes),
            Self::CardinalityViolation => Some(ErrorCode::CardinalityViolation),
            Self::DeferredCheck => None,
        }
    }
}

/// One validation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Severity after mode adjustment
    pub severity: Severity,
    /// Category
    pub category: FindingCategory,
    /// Node or edge id
    pub subject_id: String,
    /// Stable id of the check
    pub check_id: String,
    /// Human-readable description
    pub message: String,
}

impl Finding {
    /// Whether this finding refuses a commit
    #[inline]
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.severity.is_blocking()
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {}",
            self.severity, self.check_id, self.subject_id, self.message
        )
    }
}

/// Validation strictness
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Keep base severities
    Blocking,
    /// Downgrade blocker and error findings to warnings
    #[default]
    NonBlocking,
}

/// Ordered findings of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Effective mode
    pub mode: ValidationMode,
    /// Findings in pass and staging order
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.findings.iter().any(Finding::is_blocking)
    }

    pub fn blocking(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_blocking())
    }

    /// Findings of one category
    pub fn of_category(&self, category: FindingCategory) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.category == category)
    }

    /// Number of findings at `severity`
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }
}

/// Two-pass validator
#[derive(Debug, Clone)]
pub struct ValidationPipeline {
    schema: Arc<SchemaRegistry>,
}

impl ValidationPipeline {
    /// Pipeline over `schema`
    #[must_use]
    pub fn new(schema: Arc<SchemaRegistry>) -> Self {
        Self { schema }
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<SchemaRegistry> {
        &self.schema
    }

    /// Validate `workspace` against `repo`
    ///
    /// Iterative workspaces always validate non-blocking.
    #[must_use]
    pub fn validate(
        &self,
        workspace: &Workspace,
        repo: &GraphRepository,
        mode: ValidationMode,
    ) -> ValidationReport {
        let mode = if workspace.is_iterative() {
            ValidationMode::NonBlocking
        } else {
            mode
        };
        let view = ProposedGraph::build(repo, workspace);
        let mut run = Run {
            mode,
            findings: Vec::new(),
        };

        self.mandatory_fields(workspace, &view, &mut run);
        self.cardinality(workspace, &view, &mut run);

        tracing::debug!(
            workspace = workspace.id(),
            findings = run.findings.len(),
            blocking = run.findings.iter().filter(|f| f.is_blocking()).count(),
            "validation finished"
        );
        ValidationReport {
            mode,
            findings: run.findings,
        }
    }

    fn mandatory_fields(&self, workspace: &Workspace, view: &ProposedGraph<'_>, run: &mut Run) {
        for draft in workspace.node_drafts().filter(|d| !d.tombstone) {
            let required = self.schema.required_node_attributes(draft.kind);
            for attribute in missing(required, &draft.attributes) {
                run.push(
                    Severity::Error,
                    FindingCategory::MissingRequiredAttribute,
                    draft.id.as_str(),
                    CHECK_REQUIRED_ATTRIBUTE,
                    format!("{} requires attribute '{attribute}'", draft.kind),
                );
            }
        }

        for draft in workspace.edge_drafts().filter(|d| !d.tombstone) {
            let from = view.node(&draft.from_id);
            let to = view.node(&draft.to_id);
            for (endpoint, resolved) in [(&draft.from_id, from), (&draft.to_id, to)] {
                if resolved.is_none() {
                    run.push(
                        Severity::Blocker,
                        FindingCategory::DanglingEndpoint,
                        draft.id.as_str(),
                        CHECK_ENDPOINT_RESOLVED,
                        format!("{} edge references missing node {endpoint}", draft.kind),
                    );
                }
            }
            if let (Some(from), Some(to)) = (from, to) {
                if !self.schema.permits(draft.kind, from.kind, to.kind) {
                    run.push(
                        Severity::Blocker,
                        FindingCategory::InvalidEndpointTypes,
                        draft.id.as_str(),
                        CHECK_ENDPOINT_TYPES,
                        format!("{} may not connect {} -> {}", draft.kind, from.kind, to.kind),
                    );
                }
            }
            let required = self.schema.required_edge_attributes(draft.kind);
            for attribute in missing(required, &draft.attributes) {
                run.push(
                    Severity::Error,
                    FindingCategory::MissingRequiredAttribute,
                    draft.id.as_str(),
                    CHECK_REQUIRED_ATTRIBUTE,
                    format!("{} requires attribute '{attribute}'", draft.kind),
                );
            }
        }

        for edge in view.invalidated_edges() {
            let kind_of = |id| view.node(id).map(|n| n.kind.to_string()).unwrap_or_default();
            run.push(
                Severity::Blocker,
                FindingCategory::InvalidEndpointTypes,
                edge.id.as_str(),
                CHECK_ENDPOINT_TYPES,
                format!(
                    "{} may not connect {} -> {} after the staged kind change",
                    edge.kind,
                    kind_of(&edge.from_id),
                    kind_of(&edge.to_id)
                ),
            );
        }
    }

    fn cardinality(&self, workspace: &Workspace, view: &ProposedGraph<'_>, run: &mut Run) {
        let review_ready = workspace
            .node_drafts()
            .filter(|d| !d.tombstone)
            .any(|d| LifecycleState::from_attributes(&d.attributes).is_some_and(LifecycleState::is_review_ready));

        for id in touched_nodes(workspace, view) {
            let Some(node) = view.node(&id) else {
                continue;
            };
            let incident = view.incident_edges(&id);
            for rule in self.schema.rules_for(node.kind) {
                if rule.activation == RuleActivation::ReviewReady && !review_ready {
                    run.push(
                        Severity::Info,
                        FindingCategory::DeferredCheck,
                        id.as_str(),
                        &rule.check_id,
                        format!(
                            "{} check deferred until an element is in review",
                            rule.check_id
                        ),
                    );
                    continue;
                }
                let count = incident
                    .iter()
                    .filter(|edge| counts_toward(rule, &id, edge, view))
                    .count();
                if !rule.admits(count) {
                    run.push(
                        Severity::Error,
                        FindingCategory::CardinalityViolation,
                        id.as_str(),
                        &rule.check_id,
                        format!(
                            "{} requires {} {} {} edge(s) {} {}, found {count}",
                            node.kind,
                            rule.bound(),
                            rule.direction,
                            rule.edge_kind,
                            match rule.direction {
                                Direction::Incoming => "from",
                                Direction::Outgoing => "to",
                            },
                            rule.peer_kind,
                        ),
                    );
                }
            }
        }
    }
}

struct Run {
    mode: ValidationMode,
    findings: Vec<Finding>,
}

impl Run {
    fn push(
        &mut self,
        base: Severity,
        category: FindingCategory,
        subject: &str,
        check_id: &str,
        message: String,
    ) {
        let severity = match (self.mode, base) {
            (ValidationMode::NonBlocking, Severity::Blocker | Severity::Error) => Severity::Warning,
            (_, severity) => severity,
        };
        self.findings.push(Finding {
            severity,
            category,
            subject_id: subject.to_string(),
            check_id: check_id.to_string(),
            message,
        });
    }
}

/// Required attributes that are absent, null or blank
fn missing<'r>(required: &'r [String], attributes: &Attributes) -> impl Iterator<Item = &'r str> + 'r {
    let present: BTreeSet<&'r str> = required
        .iter()
        .filter(|key| match attributes.get(key.as_str()) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        })
        .map(String::as_str)
        .collect();
    required
        .iter()
        .map(String::as_str)
        .filter(move |key| !present.contains(key))
}

/// Staged nodes, then endpoints of staged and removed edges, first-seen order
fn touched_nodes(workspace: &Workspace, view: &ProposedGraph<'_>) -> Vec<NodeId> {
    let mut seen = BTreeSet::new();
    let mut order = Vec::new();
    let mut visit = |id: &NodeId| {
        if seen.insert(id.clone()) {
            order.push(id.clone());
        }
    };

    for draft in workspace.node_drafts().filter(|d| !d.tombstone) {
        visit(&draft.id);
    }
    for draft in workspace.edge_drafts() {
        visit(&draft.from_id);
        visit(&draft.to_id);
        if let Some(committed) = view.base().edge(&draft.id) {
            visit(&committed.from_id);
            visit(&committed.to_id);
        }
    }
    for edge in view.cascaded_edges().iter().chain(view.invalidated_edges()) {
        visit(&edge.from_id);
        visit(&edge.to_id);
    }
    order
}

fn counts_toward(
    rule: &CardinalityRule,
    node: &NodeId,
    edge: &archgraph_model::Edge,
    view: &ProposedGraph<'_>,
) -> bool {
    if edge.kind != rule.edge_kind {
        return false;
    }
    let peer = match rule.direction {
        Direction::Incoming if &edge.to_id == node => &edge.from_id,
        Direction::Outgoing if &edge.from_id == node => &edge.to_id,
        _ => return false,
    };
    view.node(peer).is_some_and(|peer| peer.kind == rule.peer_kind)
}
