use std::collections::BTreeMap;
use std::fmt;

use crate::entity::{Ball, Entity, Player};
use crate::error::SchemaError;
use crate::protocol::VariableUpdate;
use crate::schema::SchemaRegistry;

/// Stable identifier of an entity instance. Assigned in creation order
/// starting from 0, so processes that create the same kinds in the same
/// order agree on every identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owns entity instances. Only the store creates or destroys them; field
/// values are mutated through the references it hands out.
#[derive(Debug)]
pub struct EntityStore {
    registry: SchemaRegistry,
    entities: BTreeMap<EntityId, Entity>,
    next_id: u32,
}

impl EntityStore {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self {
            registry,
            entities: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn create(&mut self, kind: &str) -> Result<EntityId, SchemaError> {
        let entity = self.registry.create_instance(kind)?;
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.insert(id, entity);
        Ok(id)
    }

    pub fn destroy(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn ball(&self, id: EntityId) -> Option<&Ball> {
        self.get(id).and_then(Entity::as_ball)
    }

    pub fn ball_mut(&mut self, id: EntityId) -> Option<&mut Ball> {
        self.get_mut(id).and_then(Entity::as_ball_mut)
    }

    pub fn player(&self, id: EntityId) -> Option<&Player> {
        self.get(id).and_then(Entity::as_player)
    }

    pub fn player_mut(&mut self, id: EntityId) -> Option<&mut Player> {
        self.get_mut(id).and_then(Entity::as_player_mut)
    }

    /// Iterates entities in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().map(|(id, entity)| (*id, entity))
    }

    /// Applies a received update to the mirrored entity it names.
    pub fn apply(&mut self, update: &VariableUpdate) -> Result<(), SchemaError> {
        self.entities
            .get_mut(&EntityId(update.entity_id))
            .ok_or(SchemaError::UnknownEntity(update.entity_id))?
            .apply(&update.field, update.value)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{BALL, PLAYER, POSITION};
    use crate::protocol::Value;
    use crate::Vec2;

    fn store() -> EntityStore {
        EntityStore::new(SchemaRegistry::pong().unwrap())
    }

    #[test]
    fn test_ids_follow_creation_order() {
        let mut store = store();
        assert_eq!(store.create(BALL).unwrap(), EntityId(0));
        assert_eq!(store.create(PLAYER).unwrap(), EntityId(1));
        assert_eq!(store.create(PLAYER).unwrap(), EntityId(2));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_create_unknown_kind_leaves_store_unchanged() {
        let mut store = store();
        assert!(store.create("Wall").is_err());
        assert!(store.is_empty());
        assert_eq!(store.create(BALL).unwrap(), EntityId(0));
    }

    #[test]
    fn test_typed_access() {
        let mut store = store();
        let ball = store.create(BALL).unwrap();
        let player = store.create(PLAYER).unwrap();

        assert!(store.ball(ball).is_some());
        assert!(store.player(ball).is_none());
        assert!(store.player(player).is_some());
        assert!(store.ball_mut(player).is_none());
    }

    #[test]
    fn test_destroy_keeps_other_ids() {
        let mut store = store();
        let first = store.create(PLAYER).unwrap();
        let second = store.create(PLAYER).unwrap();

        assert!(store.destroy(first).is_some());
        assert!(store.destroy(first).is_none());
        assert!(store.get(second).is_some());
        assert_eq!(store.create(BALL).unwrap(), EntityId(2));
    }

    #[test]
    fn test_apply_update() {
        let mut store = store();
        let player = store.create(PLAYER).unwrap();

        store
            .apply(&VariableUpdate {
                entity_id: player.0,
                field: POSITION.to_string(),
                value: Value::Vec2(Vec2::new(50.0, 120.0)),
            })
            .unwrap();

        assert_eq!(
            store.player(player).unwrap().position.get(),
            Vec2::new(50.0, 120.0)
        );
    }

    #[test]
    fn test_apply_unknown_entity() {
        let mut store = store();
        let err = store
            .apply(&VariableUpdate {
                entity_id: 9,
                field: POSITION.to_string(),
                value: Value::Vec2(Vec2::ZERO),
            })
            .unwrap_err();
        assert_eq!(err, SchemaError::UnknownEntity(9));
    }
}
