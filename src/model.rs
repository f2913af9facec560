//! Entities: identity, lifecycle timestamps and an open attribute bag.

use crate::error::ModelError;
use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// Open, string-keyed attribute bag of an entity.
pub type Attributes = serde_json::Map<String, Value>;

/// Key under which the type tag is injected into a persisted record.
pub const CLASS_KEY: &str = "__class__";

/// Attribute names owned by the model itself.
pub const RESERVED: [&str; 4] = ["id", CLASS_KEY, "created_at", "updated_at"];

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

/// ISO-8601 timestamps with microsecond precision, e.g. `2017-09-28T21:05:54.119427`.
pub mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer};

    const WRITE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
    // the fractional part is optional when reading
    const READ_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn format(ts: &NaiveDateTime) -> String {
        ts.format(WRITE_FORMAT).to_string()
    }

    pub fn parse(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
        NaiveDateTime::parse_from_str(raw, READ_FORMAT)
    }

    pub(crate) fn deserialize_optional<'de, D>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| parse(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Current local time, truncated so it survives a save/reload unchanged.
fn now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(6)
}

/// Shape of an attribute map as accepted by [`Entity::from_map`].
///
/// Identity markers are optional: a map without them describes a new entity.
#[derive(Debug, Deserialize)]
struct Record {
    #[serde(rename = "__class__", default)]
    class: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_optional")]
    created_at: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "timestamp::deserialize_optional")]
    updated_at: Option<NaiveDateTime>,
    #[serde(flatten)]
    attributes: Attributes,
}

/// One typed, identified business object.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    tag: String,
    id: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    attributes: Attributes,
}

impl Entity {
    /// Create a brand new entity with a fresh id and `created_at == updated_at == now`.
    pub fn new(tag: impl Into<String>, defaults: Attributes) -> Self {
        let ts = now();
        Self {
            tag: tag.into(),
            id: uuid::Uuid::new_v4().to_string(),
            created_at: ts,
            updated_at: ts,
            attributes: defaults
                .into_iter()
                .filter(|(k, _)| !is_reserved(k))
                .collect(),
        }
    }

    /// Rebuild an entity from an attribute map.
    ///
    /// `id`, `created_at` and `updated_at` are taken verbatim when present and
    /// generated fresh otherwise. A `__class__` marker, if any, must match `tag`.
    pub fn from_map(tag: impl Into<String>, map: Attributes) -> Result<Self, ModelError> {
        let tag = tag.into();
        let record: Record = serde_json::from_value(Value::Object(map))?;

        if let Some(found) = record.class {
            if found != tag {
                return Err(ModelError::TypeMismatch {
                    expected: tag,
                    found,
                });
            }
        }

        let ts = now();
        let created_at = record.created_at.unwrap_or(ts);
        Ok(Self {
            tag,
            id: record
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            created_at,
            updated_at: record.updated_at.unwrap_or(created_at),
            attributes: record.attributes,
        })
    }

    /// Attribute map with the type tag injected and timestamps as ISO-8601 strings.
    ///
    /// Feeding the result back into [`Entity::from_map`] yields an equal entity.
    pub fn to_map(&self) -> Attributes {
        let mut map = self.attributes.clone();
        map.insert(CLASS_KEY.to_string(), Value::String(self.tag.clone()));
        map.insert("id".to_string(), Value::String(self.id.clone()));
        map.insert(
            "created_at".to_string(),
            Value::String(timestamp::format(&self.created_at)),
        );
        map.insert(
            "updated_at".to_string(),
            Value::String(timestamp::format(&self.updated_at)),
        );
        map
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub fn updated_at(&self) -> NaiveDateTime {
        self.updated_at
    }

    /// The open attributes, without the identity and timestamp fields.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Add or overwrite one attribute. Reserved names are refused.
    pub fn set(&mut self, name: &str, value: Value) -> Result<Option<Value>, ModelError> {
        if is_reserved(name) {
            return Err(ModelError::ReservedAttribute(name.to_string()));
        }
        Ok(self.attributes.insert(name.to_string(), value))
    }

    /// Apply every pair or none of them.
    pub fn apply(&mut self, changes: Attributes) -> Result<(), ModelError> {
        if let Some(name) = changes.keys().find(|k| is_reserved(k)) {
            return Err(ModelError::ReservedAttribute(name.clone()));
        }
        self.attributes.extend(changes);
        Ok(())
    }

    /// Refresh `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = now();
    }
}

impl fmt::Display for Entity {
    /// `[Tag] (id) {'id': ..., 'created_at': ..., 'updated_at': ..., ...}`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ({}) {{", self.tag, self.id)?;
        f.write_str("'id': ")?;
        write_quoted(f, &self.id)?;
        f.write_str(", 'created_at': ")?;
        write_quoted(f, &timestamp::format(&self.created_at))?;
        f.write_str(", 'updated_at': ")?;
        write_quoted(f, &timestamp::format(&self.updated_at))?;
        for (name, value) in &self.attributes {
            f.write_str(", ")?;
            write_quoted(f, name)?;
            f.write_str(": ")?;
            write_literal(f, value)?;
        }
        f.write_str("}")
    }
}

/// Render a value as a literal: single-quoted strings, bare numbers,
/// `true`/`false`/`null`, `[..]` lists and `{..}` mappings.
pub fn write_literal(out: &mut impl fmt::Write, value: &Value) -> fmt::Result {
    match value {
        Value::Null => out.write_str("null"),
        Value::Bool(b) => write!(out, "{b}"),
        Value::Number(n) => write!(out, "{n}"),
        Value::String(s) => write_quoted(out, s),
        Value::Array(items) => {
            out.write_char('[')?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write_literal(out, item)?;
            }
            out.write_char(']')
        }
        Value::Object(map) => {
            out.write_char('{')?;
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write_quoted(out, k)?;
                out.write_str(": ")?;
                write_literal(out, v)?;
            }
            out.write_char('}')
        }
    }
}

fn write_quoted(out: &mut impl fmt::Write, s: &str) -> fmt::Result {
    out.write_char('\'')?;
    for ch in s.chars() {
        match ch {
            '\'' => out.write_str("\\'")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            c => out.write_char(c)?,
        }
    }
    out.write_char('\'')
}
