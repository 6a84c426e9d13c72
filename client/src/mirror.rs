use log::warn;
use shared::entity::{BALL, PLAYER};
use shared::{
    Ball, EntityId, EntityStore, Player, SchemaError, SchemaRegistry, VariableUpdate, PLAYER_COUNT,
};
use std::collections::HashMap;

/// Read-only copy of the simulator's entities.
///
/// Instances are created in the same order as on the simulator, so entity
/// identifiers line up without being exchanged. Values only ever change
/// through [`Mirror::apply`].
pub struct Mirror {
    store: EntityStore,
    ball: EntityId,
    players: [EntityId; PLAYER_COUNT],
    /// Tick of the newest value applied per field.
    applied: HashMap<(u32, String), u64>,
    last_tick: u64,
}

impl Mirror {
    pub fn new() -> Result<Self, SchemaError> {
        let mut store = EntityStore::new(SchemaRegistry::pong()?);
        let ball = store.create(BALL)?;
        let players = [store.create(PLAYER)?, store.create(PLAYER)?];

        Ok(Self {
            store,
            ball,
            players,
            applied: HashMap::new(),
            last_tick: 0,
        })
    }

    pub fn fingerprint(&self) -> u64 {
        self.store.registry().fingerprint()
    }

    /// Applies one replication push. Returns how many updates were taken.
    ///
    /// A field already holding a value from a later tick keeps it, so a
    /// reordered datagram cannot roll a field back. Updates naming unknown
    /// entities or fields, or carrying the wrong type, are skipped.
    pub fn apply(&mut self, tick: u64, updates: &[VariableUpdate]) -> usize {
        let mut taken = 0;

        for update in updates {
            let key = (update.entity_id, update.field.clone());
            if self.applied.get(&key).is_some_and(|&newest| newest > tick) {
                continue;
            }

            match self.store.apply(update) {
                Ok(()) => {
                    self.applied.insert(key, tick);
                    taken += 1;
                }
                Err(e) => warn!("Skipping update for entity {}: {}", update.entity_id, e),
            }
        }

        self.last_tick = self.last_tick.max(tick);
        taken
    }

    pub fn last_tick(&self) -> u64 {
        self.last_tick
    }

    pub fn ball(&self) -> Option<&Ball> {
        self.store.ball(self.ball)
    }

    /// The paddle belonging to participant `user_id`.
    pub fn player(&self, user_id: u32) -> Option<&Player> {
        let id = *self.players.get(user_id as usize)?;
        self.store.player(id)
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::entity::{POSITION, ROTATION, SIZE};
    use shared::{Value, Vec2};

    fn update(entity_id: u32, field: &str, value: Value) -> VariableUpdate {
        VariableUpdate {
            entity_id,
            field: field.to_string(),
            value,
        }
    }

    #[test]
    fn test_ids_match_simulator_layout() {
        let mirror = Mirror::new().unwrap();
        assert_eq!(mirror.ball, EntityId(0));
        assert_eq!(mirror.players, [EntityId(1), EntityId(2)]);
        assert_eq!(mirror.store().len(), 3);
    }

    #[test]
    fn test_push_updates_values() {
        let mut mirror = Mirror::new().unwrap();
        let taken = mirror.apply(
            1,
            &[
                update(0, POSITION, Value::Vec2(Vec2::new(310.0, 150.0))),
                update(0, ROTATION, Value::Float(0.5)),
                update(2, POSITION, Value::Vec2(Vec2::new(550.0, 180.0))),
            ],
        );

        assert_eq!(taken, 3);
        let ball = mirror.ball().unwrap();
        assert_eq!(ball.position.get(), Vec2::new(310.0, 150.0));
        assert_eq!(ball.rotation.get(), 0.5);
        assert_eq!(
            mirror.player(1).unwrap().position.get(),
            Vec2::new(550.0, 180.0)
        );
        assert_eq!(mirror.last_tick(), 1);
    }

    #[test]
    fn test_bad_updates_skipped() {
        let mut mirror = Mirror::new().unwrap();
        let taken = mirror.apply(
            1,
            &[
                update(9, POSITION, Value::Vec2(Vec2::ZERO)),
                update(0, "Velocity", Value::Vec2(Vec2::ZERO)),
                update(1, SIZE, Value::Float(3.0)),
                update(1, SIZE, Value::Vec2(Vec2::new(20.0, 64.0))),
            ],
        );

        assert_eq!(taken, 1);
        assert_eq!(mirror.player(0).unwrap().size.get(), Vec2::new(20.0, 64.0));
    }

    #[test]
    fn test_reordered_push_does_not_roll_back() {
        let mut mirror = Mirror::new().unwrap();
        mirror.apply(5, &[update(1, POSITION, Value::Vec2(Vec2::new(50.0, 200.0)))]);
        mirror.apply(
            4,
            &[
                update(1, POSITION, Value::Vec2(Vec2::new(50.0, 196.0))),
                update(0, ROTATION, Value::Float(1.25)),
            ],
        );

        assert_eq!(mirror.player(0).unwrap().position.get(), Vec2::new(50.0, 200.0));
        assert_eq!(mirror.ball().unwrap().rotation.get(), 1.25);
        assert_eq!(mirror.last_tick(), 5);
    }

    #[test]
    fn test_unknown_participant() {
        let mirror = Mirror::new().unwrap();
        assert!(mirror.player(2).is_none());
    }
}
