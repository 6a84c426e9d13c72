use thiserror::Error;

use crate::schema::FieldType;

/// Configuration errors raised while declaring or using the entity schema.
///
/// These are fatal at startup: the registry must be byte-identical on every
/// process, and nothing negotiates a mismatch at runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("entity kind `{0}` is not registered")]
    UnknownKind(String),

    #[error("entity kind `{0}` is already registered")]
    DuplicateKind(String),

    /// The declared field list does not match what the kind actually carries.
    #[error("entity kind `{kind}` declares fields {declared:?} but carries {actual:?}")]
    FieldMismatch {
        kind: String,
        declared: Vec<String>,
        actual: Vec<String>,
    },

    #[error("entity kind `{kind}` has no replicated field `{field}`")]
    UnknownField { kind: String, field: String },

    #[error("field `{field}` expects {expected:?} but received {received:?}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        received: FieldType,
    },

    #[error("no entity with id {0}")]
    UnknownEntity(u32),
}
