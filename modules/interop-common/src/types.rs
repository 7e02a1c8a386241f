use serde::{Deserialize, Serialize};

/// Entity identifier as assigned by the runtime.
pub type EntityId = i64;

/// Component identifier (schema-assigned).
pub type ComponentId = u32;

/// Request identifier of an incoming command.
pub type RequestId = i64;

/// Composite key addressing one component on one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityComponentId {
    pub entity_id: EntityId,
    pub component_id: ComponentId,
}

impl EntityComponentId {
    pub fn new(entity_id: EntityId, component_id: ComponentId) -> Self {
        Self {
            entity_id,
            component_id,
        }
    }
}

impl From<(EntityId, ComponentId)> for EntityComponentId {
    fn from((entity_id, component_id): (EntityId, ComponentId)) -> Self {
        Self::new(entity_id, component_id)
    }
}

impl std::fmt::Display for EntityComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity {} / component {}", self.entity_id, self.component_id)
    }
}
