//! Graph snapshot loading.
//!
//! A simulation run never queries the store directly: it works on a
//! `GraphSnapshot`, a point-in-time, immutable adjacency structure built
//! once at the start of the run. Snapshots are tenant-scoped and
//! time-scoped at load time and must not be shared across runs.

use crate::error::{EngineError, EngineResult};
use crate::models::{Dependency, Entity};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Read-only access to the external entity/dependency store.
///
/// Implementations return active records only.
#[async_trait]
pub trait RiskStore: Send + Sync {
    /// Loads active entities for a tenant. When `entity_ids` is given,
    /// the result is restricted to those ids (missing ids are simply
    /// absent from the result, not an error at this layer).
    async fn load_entities(
        &self,
        tenant_id: Uuid,
        entity_ids: Option<&[Uuid]>,
    ) -> EngineResult<Vec<Entity>>;

    /// Loads active dependencies for a tenant.
    async fn load_dependencies(&self, tenant_id: Uuid) -> EngineResult<Vec<Dependency>>;
}

/// A point-in-time, immutable view of a tenant's risk graph.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    /// Entities by id.
    entities: HashMap<Uuid, Entity>,
    /// Outgoing edges by source entity id.
    adjacency: HashMap<Uuid, Vec<Dependency>>,
}

impl GraphSnapshot {
    /// Assembles a snapshot from raw store rows.
    ///
    /// Inactive entities, inactive edges, self-loops, and edges whose
    /// endpoints are not present in the entity set are all dropped here,
    /// so the traversal code never has to re-check them.
    pub fn build(entities: Vec<Entity>, dependencies: Vec<Dependency>) -> Self {
        let entities: HashMap<Uuid, Entity> = entities
            .into_iter()
            .filter(|e| e.is_active)
            .map(|e| (e.id, e))
            .collect();

        let mut adjacency: HashMap<Uuid, Vec<Dependency>> = HashMap::new();
        for dep in dependencies {
            if !dep.is_active {
                continue;
            }
            if dep.is_self_loop() {
                debug!(dependency_id = %dep.id, "Skipping self-loop dependency");
                continue;
            }
            if !entities.contains_key(&dep.source_entity_id)
                || !entities.contains_key(&dep.target_entity_id)
            {
                debug!(dependency_id = %dep.id, "Skipping dangling dependency");
                continue;
            }
            adjacency.entry(dep.source_entity_id).or_default().push(dep);
        }

        Self {
            entities,
            adjacency,
        }
    }

    /// Looks up an entity by id.
    pub fn entity(&self, id: &Uuid) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Returns the outgoing edges of an entity (empty slice if none).
    pub fn outgoing(&self, id: &Uuid) -> &[Dependency] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates over all entities in the snapshot.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Number of entities in the snapshot.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Total number of edges in the snapshot.
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    /// Returns true if the snapshot holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Loads tenant-scoped snapshots from a [`RiskStore`].
#[derive(Clone)]
pub struct SnapshotLoader {
    store: Arc<dyn RiskStore>,
}

impl SnapshotLoader {
    /// Creates a loader backed by the given store.
    pub fn new(store: Arc<dyn RiskStore>) -> Self {
        Self { store }
    }

    /// Loads a snapshot for a tenant, optionally restricted to a set of
    /// entity ids. One blocking round-trip to the store per run; an empty
    /// result is valid.
    pub async fn load(
        &self,
        tenant_id: Uuid,
        entity_ids: Option<&[Uuid]>,
    ) -> EngineResult<GraphSnapshot> {
        let entities = self.store.load_entities(tenant_id, entity_ids).await?;
        let dependencies = self.store.load_dependencies(tenant_id).await?;
        debug!(
            %tenant_id,
            entities = entities.len(),
            dependencies = dependencies.len(),
            "Loaded graph snapshot"
        );
        Ok(GraphSnapshot::build(entities, dependencies))
    }

    /// Loads a snapshot and verifies that a required trigger entity is
    /// present, failing with `NotFound` otherwise.
    pub async fn load_with_trigger(
        &self,
        tenant_id: Uuid,
        trigger_entity_id: Uuid,
    ) -> EngineResult<GraphSnapshot> {
        let snapshot = self.load(tenant_id, None).await?;
        if snapshot.entity(&trigger_entity_id).is_none() {
            return Err(EngineError::entity_not_found(trigger_entity_id));
        }
        Ok(snapshot)
    }
}

// ============================================================================
// In-Memory Implementation (for testing)
// ============================================================================

/// In-memory implementation of [`RiskStore`] for testing.
#[derive(Default)]
pub struct InMemoryRiskStore {
    entities: Arc<RwLock<HashMap<Uuid, Entity>>>,
    dependencies: Arc<RwLock<HashMap<Uuid, Dependency>>>,
}

impl InMemoryRiskStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entity.
    pub async fn insert_entity(&self, entity: Entity) {
        self.entities.write().await.insert(entity.id, entity);
    }

    /// Inserts a dependency.
    pub async fn insert_dependency(&self, dependency: Dependency) {
        self.dependencies
            .write()
            .await
            .insert(dependency.id, dependency);
    }
}

#[async_trait]
impl RiskStore for InMemoryRiskStore {
    async fn load_entities(
        &self,
        tenant_id: Uuid,
        entity_ids: Option<&[Uuid]>,
    ) -> EngineResult<Vec<Entity>> {
        let entities = self.entities.read().await;
        Ok(entities
            .values()
            .filter(|e| e.tenant_id == tenant_id && e.is_active)
            .filter(|e| entity_ids.map_or(true, |ids| ids.contains(&e.id)))
            .cloned()
            .collect())
    }

    async fn load_dependencies(&self, tenant_id: Uuid) -> EngineResult<Vec<Dependency>> {
        let dependencies = self.dependencies.read().await;
        Ok(dependencies
            .values()
            .filter(|d| d.tenant_id == tenant_id && d.is_active)
            .cloned()
            .collect())
    }
}
