//! Error types shared by the registry, the store and the console.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors raised by [`crate::registry::Registry`].
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("class already registered: {0}")]
    DuplicateType(String),
}

/// Errors raised by [`crate::model::Entity`].
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// `id`, `__class__`, `created_at` and `updated_at` are managed by the model.
    #[error("attribute can't be updated: {0}")]
    ReservedAttribute(String),

    #[error("record belongs to {found}, expected {expected}")]
    TypeMismatch { expected: String, found: String },

    /// A malformed id or timestamp in an attribute map.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised while saving or reloading the backing file.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing file exists but is not a JSON object.
    #[error("malformed data file {}: {source}", .path.display())]
    MalformedPersistedFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A persisted key is not of the form `<Tag>.<id>`.
    #[error("invalid key in data file: {0}")]
    InvalidKey(String),

    /// A persisted record could not be turned back into an entity.
    #[error("invalid record {key}: {source}")]
    InvalidRecord {
        key: String,
        #[source]
        source: ModelError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Which positional argument a command was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentKind {
    TypeTag,
    Id,
    AttrName,
    Value,
}

impl fmt::Display for ArgumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self {
            ArgumentKind::TypeTag => "class name",
            ArgumentKind::Id => "instance id",
            ArgumentKind::AttrName => "attribute name",
            ArgumentKind::Value => "value",
        };
        f.write_str(what)
    }
}

/// Errors reported back to the console user.
///
/// Everything except [`ConsoleError::Io`] is recoverable: the interpreter prints
/// the message and reads the next line.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("** {0} missing **")]
    MissingArgument(ArgumentKind),

    #[error("** class doesn't exist **")]
    UnknownType(String),

    #[error("** no instance found **")]
    NotFound,

    #[error("** invalid value **")]
    MalformedValue,

    #[error("** attribute can't be updated: {0} **")]
    ReservedAttribute(String),

    #[error("*** Unknown syntax: {0}")]
    SyntaxError(String),

    #[error("** storage error: {0} **")]
    Storage(#[from] StoreError),

    /// Writing to the output sink failed.
    #[error("output error: {0}")]
    Io(#[from] io::Error),
}
