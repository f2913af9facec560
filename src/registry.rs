use crate::error::RegistryError;
use crate::model::Attributes;
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Builds the default attribute bag of a freshly created entity.
///
/// Constructors are plain functions so the set of types is fixed in code and
/// nothing typed at the console is ever evaluated.
pub type Constructor = fn() -> Attributes;

/// Mapping from type tag to the constructor of that type.
///
/// Tags are case-sensitive. Enumeration is sorted, which keeps `help` output
/// and error listings stable.
#[derive(Debug, Clone)]
pub struct Registry {
    kinds: BTreeMap<String, Constructor>,
}

impl Registry {
    /// An empty registry. See [`Registry::default`] for the standard types.
    pub fn new() -> Self {
        Self {
            kinds: BTreeMap::new(),
        }
    }

    /// Register a type. Fails if the tag is already taken.
    pub fn register(
        &mut self,
        tag: impl Into<String>,
        constructor: Constructor,
    ) -> Result<(), RegistryError> {
        let tag = tag.into();
        if self.kinds.contains_key(&tag) {
            return Err(RegistryError::DuplicateType(tag));
        }
        self.kinds.insert(tag, constructor);
        Ok(())
    }

    pub fn resolve(&self, tag: &str) -> Result<Constructor, RegistryError> {
        self.kinds
            .get(tag)
            .copied()
            .ok_or_else(|| RegistryError::ClassNotFound(tag.to_string()))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.kinds.contains_key(tag)
    }

    /// All registered tags in sorted order.
    pub fn enumerate(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }
}

impl Default for Registry {
    /// The standard business types:
    /// `BaseModel`, `User`, `State`, `City`, `Amenity`, `Place`, `Review`.
    fn default() -> Self {
        let kinds: [(&str, Constructor); 7] = [
            ("BaseModel", Attributes::new),
            ("User", user),
            ("State", state),
            ("City", city),
            ("Amenity", amenity),
            ("Place", place),
            ("Review", review),
        ];
        Self {
            kinds: kinds
                .into_iter()
                .map(|(tag, ctor)| (tag.to_string(), ctor))
                .collect(),
        }
    }
}

fn defaults(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        _ => Attributes::new(),
    }
}

fn user() -> Attributes {
    defaults(json!({
        "email": "",
        "password": "",
        "first_name": "",
        "last_name": "",
    }))
}

fn state() -> Attributes {
    defaults(json!({ "name": "" }))
}

fn city() -> Attributes {
    defaults(json!({ "state_id": "", "name": "" }))
}

fn amenity() -> Attributes {
    defaults(json!({ "name": "" }))
}

fn place() -> Attributes {
    defaults(json!({
        "city_id": "",
        "user_id": "",
        "name": "",
        "description": "",
        "number_rooms": 0,
        "number_bathrooms": 0,
        "max_guest": 0,
        "price_by_night": 0,
        "latitude": 0.0,
        "longitude": 0.0,
        "amenity_ids": [],
    }))
}

fn review() -> Attributes {
    defaults(json!({ "place_id": "", "user_id": "", "text": "" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_knows_standard_types() {
        let registry = Registry::default();
        let tags: Vec<&str> = registry.enumerate().collect();
        assert_eq!(
            tags,
            vec!["Amenity", "BaseModel", "City", "Place", "Review", "State", "User"]
        );
    }

    #[test]
    fn resolve_unknown_tag_is_class_not_found() {
        let registry = Registry::default();
        match registry.resolve("Ghost") {
            Err(RegistryError::ClassNotFound(tag)) => assert_eq!(tag, "Ghost"),
            other => panic!("expected ClassNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn tags_are_case_sensitive() {
        let registry = Registry::default();
        assert!(registry.contains("User"));
        assert!(!registry.contains("user"));
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut registry = Registry::new();
        registry.register("Thing", Attributes::new).unwrap();
        assert!(matches!(
            registry.register("Thing", Attributes::new),
            Err(RegistryError::DuplicateType(_))
        ));
    }

    #[test]
    fn constructors_provide_type_defaults() {
        let registry = Registry::default();

        let user = registry.resolve("User").unwrap()();
        assert_eq!(user.get("email"), Some(&json!("")));
        assert_eq!(user.len(), 4);

        let place = registry.resolve("Place").unwrap()();
        assert_eq!(place.get("number_rooms"), Some(&json!(0)));
        assert_eq!(place.get("latitude"), Some(&json!(0.0)));
        assert_eq!(place.get("amenity_ids"), Some(&json!([])));

        assert!(registry.resolve("BaseModel").unwrap()().is_empty());
    }
}
