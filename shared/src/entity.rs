use std::sync::Arc;

use crate::error::SchemaError;
use crate::intent::PlayerIntent;
use crate::protocol::Value;
use crate::replicated::Replicated;
use crate::schema::{FieldDef, FieldType};
use crate::{Vec2, BALL_SIZE, COURT_CENTER, PADDLE_HEIGHT, PADDLE_WIDTH};

pub const BALL: &str = "Ball";
pub const PLAYER: &str = "Player";

pub const POSITION: &str = "Position";
pub const ROTATION: &str = "Rotation";
pub const SIZE: &str = "Size";
pub const DIRECTION: &str = "Direction";

#[derive(Debug, Clone)]
pub struct Ball {
    pub position: Replicated<Vec2>,
    pub rotation: Replicated<f64>,
    pub size: Replicated<Vec2>,
    pub direction: Replicated<Vec2>,
}

impl Default for Ball {
    fn default() -> Self {
        Self {
            position: Replicated::new(COURT_CENTER),
            rotation: Replicated::new(0.0),
            size: Replicated::new(Vec2::new(BALL_SIZE, BALL_SIZE)),
            direction: Replicated::new(Vec2::new(1.0, 0.0)),
        }
    }
}

/// A paddle. `intent` holds the simulation-local `MovementDirection` and
/// `IsMoving` fields; they are never replicated.
#[derive(Debug)]
pub struct Player {
    pub position: Replicated<Vec2>,
    pub size: Replicated<Vec2>,
    intent: Arc<PlayerIntent>,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            position: Replicated::new(Vec2::ZERO),
            size: Replicated::new(Vec2::new(PADDLE_WIDTH, PADDLE_HEIGHT)),
            intent: Arc::new(PlayerIntent::new()),
        }
    }
}

impl Player {
    pub fn intent(&self) -> &PlayerIntent {
        &self.intent
    }

    /// Handle given to the command context, which may only touch intent.
    pub fn intent_handle(&self) -> Arc<PlayerIntent> {
        Arc::clone(&self.intent)
    }
}

/// A replicated field as enumerated for a push.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSnapshot {
    pub name: &'static str,
    pub value: Value,
    pub version: u64,
}

fn vec2_field(name: &'static str, var: &Replicated<Vec2>) -> FieldSnapshot {
    FieldSnapshot {
        name,
        value: Value::Vec2(var.get()),
        version: var.version(),
    }
}

fn float_field(name: &'static str, var: &Replicated<f64>) -> FieldSnapshot {
    FieldSnapshot {
        name,
        value: Value::Float(var.get()),
        version: var.version(),
    }
}

/// An entity instance. The set of kinds is closed; the store picks the
/// variant at creation and it never changes afterwards.
#[derive(Debug)]
pub enum Entity {
    Ball(Ball),
    Player(Player),
}

impl Entity {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Entity::Ball(_) => BALL,
            Entity::Player(_) => PLAYER,
        }
    }

    /// Replicated fields in declaration order.
    pub fn fields(&self) -> Vec<FieldSnapshot> {
        match self {
            Entity::Ball(ball) => vec![
                vec2_field(POSITION, &ball.position),
                float_field(ROTATION, &ball.rotation),
                vec2_field(SIZE, &ball.size),
                vec2_field(DIRECTION, &ball.direction),
            ],
            Entity::Player(player) => vec![
                vec2_field(POSITION, &player.position),
                vec2_field(SIZE, &player.size),
            ],
        }
    }

    pub fn field_defs(&self) -> Vec<FieldDef> {
        self.fields()
            .iter()
            .map(|field| FieldDef::new(field.name, field.value.field_type()))
            .collect()
    }

    /// Writes a received value into the named field (observer mirror path).
    pub fn apply(&mut self, field: &str, value: Value) -> Result<(), SchemaError> {
        let kind = self.kind_name();
        match (self, field, value) {
            (Entity::Ball(ball), POSITION, Value::Vec2(v)) => ball.position.set(v),
            (Entity::Ball(ball), ROTATION, Value::Float(r)) => ball.rotation.set(r),
            (Entity::Ball(ball), SIZE, Value::Vec2(v)) => ball.size.set(v),
            (Entity::Ball(ball), DIRECTION, Value::Vec2(v)) => ball.direction.set(v),
            (Entity::Player(player), POSITION, Value::Vec2(v)) => player.position.set(v),
            (Entity::Player(player), SIZE, Value::Vec2(v)) => player.size.set(v),
            (entity, field, value) => {
                return Err(match entity.field_type(field) {
                    Some(expected) => SchemaError::TypeMismatch {
                        field: field.to_string(),
                        expected,
                        received: value.field_type(),
                    },
                    None => SchemaError::UnknownField {
                        kind: kind.to_string(),
                        field: field.to_string(),
                    },
                })
            }
        }
        Ok(())
    }

    fn field_type(&self, field: &str) -> Option<FieldType> {
        self.fields()
            .into_iter()
            .find(|f| f.name == field)
            .map(|f| f.value.field_type())
    }

    pub fn as_ball(&self) -> Option<&Ball> {
        match self {
            Entity::Ball(ball) => Some(ball),
            _ => None,
        }
    }

    pub fn as_ball_mut(&mut self) -> Option<&mut Ball> {
        match self {
            Entity::Ball(ball) => Some(ball),
            _ => None,
        }
    }

    pub fn as_player(&self) -> Option<&Player> {
        match self {
            Entity::Player(player) => Some(player),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut Player> {
        match self {
            Entity::Player(player) => Some(player),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Direction;

    #[test]
    fn test_ball_field_order() {
        let ball = Entity::Ball(Ball::default());
        let names: Vec<&str> = ball.fields().iter().map(|f| f.name).collect();
        assert_eq!(names, vec![POSITION, ROTATION, SIZE, DIRECTION]);
    }

    #[test]
    fn test_player_fields_exclude_intent() {
        let player = Entity::Player(Player::default());
        let names: Vec<&str> = player.fields().iter().map(|f| f.name).collect();
        assert_eq!(names, vec![POSITION, SIZE]);
    }

    #[test]
    fn test_apply_updates_field() {
        let mut entity = Entity::Ball(Ball::default());
        entity
            .apply(ROTATION, Value::Float(0.25))
            .expect("rotation is a float field");

        let ball = entity.as_ball().unwrap();
        assert_eq!(ball.rotation.get(), 0.25);
        assert_eq!(ball.rotation.version(), 1);
    }

    #[test]
    fn test_apply_unknown_field() {
        let mut entity = Entity::Player(Player::default());
        let err = entity.apply(ROTATION, Value::Float(1.0)).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownField {
                kind: PLAYER.to_string(),
                field: ROTATION.to_string()
            }
        );
    }

    #[test]
    fn test_apply_type_mismatch() {
        let mut entity = Entity::Ball(Ball::default());
        let err = entity.apply(POSITION, Value::Float(1.0)).unwrap_err();
        assert!(matches!(err, SchemaError::TypeMismatch { .. }));
        assert_eq!(entity.as_ball().unwrap().position.version(), 0);
    }

    #[test]
    fn test_intent_handle_shares_state() {
        let player = Player::default();
        let handle = player.intent_handle();
        handle.start(Direction::Down);
        assert!(player.intent().snapshot().moving);
    }
}
