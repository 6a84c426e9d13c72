//! Entity schema registry.
//!
//! A kind is a name plus an ordered list of typed fields. Every process that
//! encodes or decodes a kind must register it with the same names, types and
//! order. The registry can't repair a mismatch; it can only detect one, either
//! at registration (the declared list disagrees with what the kind carries) or
//! at connect time via [`SchemaRegistry::fingerprint`].

use crate::entity::{Ball, Entity, Player, BALL, DIRECTION, PLAYER, POSITION, ROTATION, SIZE};
use crate::error::SchemaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Vec2,
    Float,
}

impl FieldType {
    fn tag(self) -> u8 {
        match self {
            FieldType::Vec2 => 1,
            FieldType::Float => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone)]
struct KindSchema {
    name: String,
    fields: Vec<FieldDef>,
    factory: fn() -> Entity,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    kinds: Vec<KindSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry both simulator and observers use.
    pub fn pong() -> Result<Self, SchemaError> {
        let mut registry = Self::new();
        registry.register_kind(
            BALL,
            vec![
                FieldDef::new(POSITION, FieldType::Vec2),
                FieldDef::new(ROTATION, FieldType::Float),
                FieldDef::new(SIZE, FieldType::Vec2),
                FieldDef::new(DIRECTION, FieldType::Vec2),
            ],
            || Entity::Ball(Ball::default()),
        )?;
        registry.register_kind(
            PLAYER,
            vec![
                FieldDef::new(POSITION, FieldType::Vec2),
                FieldDef::new(SIZE, FieldType::Vec2),
            ],
            || Entity::Player(Player::default()),
        )?;
        Ok(registry)
    }

    /// Declares a kind. `fields` must list exactly the replicated fields the
    /// factory's entities enumerate, in the same order.
    pub fn register_kind(
        &mut self,
        name: &str,
        fields: Vec<FieldDef>,
        factory: fn() -> Entity,
    ) -> Result<(), SchemaError> {
        if self.kind(name).is_some() {
            return Err(SchemaError::DuplicateKind(name.to_string()));
        }

        let actual = factory().field_defs();
        if actual != fields {
            return Err(SchemaError::FieldMismatch {
                kind: name.to_string(),
                declared: fields.iter().map(describe).collect(),
                actual: actual.iter().map(describe).collect(),
            });
        }

        self.kinds.push(KindSchema {
            name: name.to_string(),
            fields,
            factory,
        });
        Ok(())
    }

    pub fn create_instance(&self, kind: &str) -> Result<Entity, SchemaError> {
        self.kind(kind)
            .map(|schema| (schema.factory)())
            .ok_or_else(|| SchemaError::UnknownKind(kind.to_string()))
    }

    pub fn fields(&self, kind: &str) -> Option<&[FieldDef]> {
        self.kind(kind).map(|schema| schema.fields.as_slice())
    }

    pub fn kind_names(&self) -> impl Iterator<Item = &str> {
        self.kinds.iter().map(|schema| schema.name.as_str())
    }

    /// FNV-1a hash over every kind, field name and field type in registration order.
    pub fn fingerprint(&self) -> u64 {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;

        let mut hash = OFFSET;
        let mut feed = |bytes: &[u8]| {
            for byte in bytes {
                hash ^= u64::from(*byte);
                hash = hash.wrapping_mul(PRIME);
            }
        };

        for schema in &self.kinds {
            feed(schema.name.as_bytes());
            feed(&[0]);
            for field in &schema.fields {
                feed(field.name.as_bytes());
                feed(&[0, field.ty.tag()]);
            }
            feed(&[0xff]);
        }
        hash
    }

    fn kind(&self, name: &str) -> Option<&KindSchema> {
        self.kinds.iter().find(|schema| schema.name == name)
    }
}

fn describe(field: &FieldDef) -> String {
    format!("{}: {:?}", field.name, field.ty)
}
