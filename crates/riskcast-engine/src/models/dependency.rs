//! Dependency model: a directed, typed edge between two entities, used as a
//! propagation path during cascade analysis.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A directed dependency from one entity to another.
///
/// The upstream store forbids self-loops, but the engine does not rely on
/// that: snapshot construction skips any edge whose source equals its
/// target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    /// Unique identifier for this dependency.
    pub id: Uuid,
    /// Tenant that owns this dependency.
    pub tenant_id: Uuid,
    /// Entity the dependency originates from.
    pub source_entity_id: Uuid,
    /// Entity the dependency points at.
    pub target_entity_id: Uuid,
    /// Layer the dependency belongs to, used for delay and decay weighting.
    pub layer: DependencyLayer,
    /// Free-form relationship label (e.g. "supplier", "subsidiary").
    pub relationship_type: String,
    /// Strength of the dependency on a 1.0 - 5.0 scale.
    pub criticality: f64,
    /// Whether the dependency is active. Inactive edges are excluded from
    /// snapshots.
    pub is_active: bool,
}

impl Dependency {
    /// Creates a new active dependency.
    pub fn new(
        tenant_id: Uuid,
        source_entity_id: Uuid,
        target_entity_id: Uuid,
        layer: DependencyLayer,
        relationship_type: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            source_entity_id,
            target_entity_id,
            layer,
            relationship_type: relationship_type.into(),
            criticality: 3.0,
            is_active: true,
        }
    }

    /// Sets the criticality (clamped to the 1.0 - 5.0 scale).
    pub fn with_criticality(mut self, criticality: f64) -> Self {
        self.criticality = criticality.clamp(1.0, 5.0);
        self
    }

    /// Marks the dependency inactive.
    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Returns true if source and target are the same entity.
    pub fn is_self_loop(&self) -> bool {
        self.source_entity_id == self.target_entity_id
    }
}

/// Layer of a dependency, used to weight propagation delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyLayer {
    /// Contracts, ownership, regulatory obligations.
    Legal,
    /// Funding, payment, and credit relationships.
    Financial,
    /// Supply chains and day-to-day operations.
    Operational,
    /// Research and institutional affiliations.
    Academic,
    /// Personnel and key-person relationships.
    Human,
    /// IT systems and technical integrations.
    Technical,
}

impl DependencyLayer {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyLayer::Legal => "legal",
            DependencyLayer::Financial => "financial",
            DependencyLayer::Operational => "operational",
            DependencyLayer::Academic => "academic",
            DependencyLayer::Human => "human",
            DependencyLayer::Technical => "technical",
        }
    }
}

impl std::fmt::Display for DependencyLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
