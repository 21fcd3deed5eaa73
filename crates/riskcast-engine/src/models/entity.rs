//! Entity model: a tracked organization, individual, asset, or system with
//! a baseline risk score.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tracked entity with a baseline risk score.
///
/// Entities are read-only from the engine's perspective: they are loaded
/// into a snapshot at the start of a simulation run and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier for this entity.
    pub id: Uuid,
    /// Tenant that owns this entity.
    pub tenant_id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// Category of the entity.
    pub category: EntityCategory,
    /// ISO 3166-1 alpha-2 country code, if known.
    pub country_code: Option<String>,
    /// Baseline risk score (0.0 - 100.0).
    pub baseline_risk_score: f64,
    /// Criticality of the entity (1 = lowest, 5 = highest).
    pub criticality: u8,
    /// Whether the entity is active. Inactive entities are excluded from
    /// snapshots.
    pub is_active: bool,
}

impl Entity {
    /// Creates a new active entity with the given baseline risk score.
    pub fn new(
        tenant_id: Uuid,
        name: impl Into<String>,
        category: EntityCategory,
        baseline_risk_score: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            category,
            country_code: None,
            baseline_risk_score: baseline_risk_score.clamp(0.0, 100.0),
            criticality: 3,
            is_active: true,
        }
    }

    /// Sets the country code.
    pub fn with_country_code(mut self, code: impl Into<String>) -> Self {
        self.country_code = Some(code.into());
        self
    }

    /// Sets the criticality (clamped to 1..=5).
    pub fn with_criticality(mut self, criticality: u8) -> Self {
        self.criticality = criticality.clamp(1, 5);
        self
    }

    /// Marks the entity inactive.
    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Returns the risk band for this entity's baseline score.
    pub fn risk_band(&self) -> RiskBand {
        RiskBand::from_score(self.baseline_risk_score)
    }
}

/// Category of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    /// A company or institution.
    Organization,
    /// A natural person.
    Individual,
    /// A ship or other vessel.
    Vessel,
    /// A financial instrument or account.
    Financial,
    /// An IT system or platform.
    System,
    /// Anything that does not fit the above.
    Other,
}

impl EntityCategory {
    /// Returns the string representation used in multiplier tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityCategory::Organization => "organization",
            EntityCategory::Individual => "individual",
            EntityCategory::Vessel => "vessel",
            EntityCategory::Financial => "financial",
            EntityCategory::System => "system",
            EntityCategory::Other => "other",
        }
    }
}

impl std::fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Risk band for a score on the 0-100 scale.
///
/// Bands are disjoint and exhaustive: high is >= 75, medium is 50 - 74.99,
/// low is < 50. Both the what-if evaluator and the Monte Carlo portfolio
/// buckets use this single definition so counts always sum to the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    /// Score >= 75.
    High,
    /// Score in [50, 75).
    Medium,
    /// Score < 50.
    Low,
}

impl RiskBand {
    /// Classifies a score into its band.
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            RiskBand::High
        } else if score >= 50.0 {
            RiskBand::Medium
        } else {
            RiskBand::Low
        }
    }
}

impl std::fmt::Display for RiskBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskBand::High => write!(f, "high"),
            RiskBand::Medium => write!(f, "medium"),
            RiskBand::Low => write!(f, "low"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_creation() {
        let tenant_id = Uuid::new_v4();
        let entity = Entity::new(tenant_id, "Acme Corp", EntityCategory::Organization, 42.0);

        assert!(!entity.id.is_nil());
        assert_eq!(entity.tenant_id, tenant_id);
        assert_eq!(entity.name, "Acme Corp");
        assert_eq!(entity.category, EntityCategory::Organization);
        assert_eq!(entity.baseline_risk_score, 42.0);
        assert_eq!(entity.criticality, 3);
        assert!(entity.is_active);
    }

    #[test]
    fn test_entity_score_clamped() {
        let entity = Entity::new(
            Uuid::new_v4(),
            "over",
            EntityCategory::System,
            150.0,
        );
        assert_eq!(entity.baseline_risk_score, 100.0);

        let entity = Entity::new(Uuid::new_v4(), "under", EntityCategory::System, -5.0);
        assert_eq!(entity.baseline_risk_score, 0.0);
    }

    #[test]
    fn test_entity_builders() {
        let entity = Entity::new(Uuid::new_v4(), "MV Aurora", EntityCategory::Vessel, 60.0)
            .with_country_code("PA")
            .with_criticality(9);

        assert_eq!(entity.country_code.as_deref(), Some("PA"));
        // Criticality is clamped to the 1-5 scale.
        assert_eq!(entity.criticality, 5);
    }

    #[test]
    fn test_risk_band_boundaries() {
        assert_eq!(RiskBand::from_score(0.0), RiskBand::Low);
        assert_eq!(RiskBand::from_score(49.99), RiskBand::Low);
        assert_eq!(RiskBand::from_score(50.0), RiskBand::Medium);
        assert_eq!(RiskBand::from_score(74.99), RiskBand::Medium);
        assert_eq!(RiskBand::from_score(75.0), RiskBand::High);
        assert_eq!(RiskBand::from_score(100.0), RiskBand::High);
    }

    #[test]
    fn test_category_display() {
        assert_eq!(EntityCategory::Organization.to_string(), "organization");
        assert_eq!(EntityCategory::Vessel.to_string(), "vessel");
    }

    #[test]
    fn test_entity_serialization() {
        let entity = Entity::new(Uuid::new_v4(), "Acme", EntityCategory::Financial, 80.0);
        let json = serde_json::to_string(&entity).unwrap();
        assert!(json.contains("\"financial\""));

        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, entity.id);
        assert_eq!(back.baseline_risk_score, 80.0);
    }
}
