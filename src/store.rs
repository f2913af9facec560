//! The live collection of entities and its JSON mirror on disk.

use crate::error::{RegistryError, StoreError};
use crate::model::{Attributes, Entity};
use crate::registry::Registry;
use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Backing file used when none is configured, relative to the working directory.
pub const DEFAULT_FILE: &str = "file.json";

const KEY_DELIMITER: char = '.';

/// `"<Tag>.<id>"`, the key of an entity both in memory and on disk.
pub fn canonical_key(tag: &str, id: &str) -> String {
    format!("{tag}{KEY_DELIMITER}{id}")
}

/// Inverse of [`canonical_key`]. Splits at the first delimiter; tags never contain one.
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(KEY_DELIMITER)
        .filter(|(tag, id)| !tag.is_empty() && !id.is_empty())
}

/// Keyed collection of live entities mirrored to a single JSON file.
///
/// Nothing touches the file until [`ObjectStore::save`] or
/// [`ObjectStore::reload`] is called.
#[derive(Debug)]
pub struct ObjectStore {
    path: PathBuf,
    objects: BTreeMap<String, Entity>,
}

impl ObjectStore {
    /// An empty store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            objects: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read-only view of every live entity, ordered by canonical key.
    pub fn all(&self) -> &BTreeMap<String, Entity> {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Insert under the entity's canonical key, returning whatever was there before.
    pub fn insert(&mut self, entity: Entity) -> Option<Entity> {
        let key = canonical_key(entity.tag(), entity.id());
        self.objects.insert(key, entity)
    }

    /// Construct a fresh entity of type `tag` and add it to the live collection.
    pub fn create(&mut self, registry: &Registry, tag: &str) -> Result<&Entity, RegistryError> {
        let constructor = registry.resolve(tag)?;
        let entity = Entity::new(tag, constructor());
        debug!("created {} {}", tag, entity.id());
        let key = canonical_key(tag, entity.id());
        self.objects.insert(key.clone(), entity);
        Ok(&self.objects[&key])
    }

    pub fn get(&self, tag: &str, id: &str) -> Option<&Entity> {
        self.objects.get(&canonical_key(tag, id))
    }

    pub fn get_mut(&mut self, tag: &str, id: &str) -> Option<&mut Entity> {
        self.objects.get_mut(&canonical_key(tag, id))
    }

    pub fn contains(&self, tag: &str, id: &str) -> bool {
        self.objects.contains_key(&canonical_key(tag, id))
    }

    pub fn remove(&mut self, tag: &str, id: &str) -> Option<Entity> {
        self.objects.remove(&canonical_key(tag, id))
    }

    /// Live entities whose tag is exactly `tag`.
    pub fn of_type<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Entity> + 'a {
        self.objects.values().filter(move |e| e.tag() == tag)
    }

    pub fn count(&self, tag: &str) -> usize {
        self.of_type(tag).count()
    }

    /// Refresh `updated_at` of one entity and persist the whole store.
    ///
    /// Returns `false` without saving when the entity is not live.
    pub fn touch_and_save(&mut self, tag: &str, id: &str) -> Result<bool, StoreError> {
        match self.get_mut(tag, id) {
            Some(entity) => entity.touch(),
            None => return Ok(false),
        }
        self.save()?;
        Ok(true)
    }

    /// Overwrite the backing file with every live entity.
    ///
    /// Records with no live counterpart disappear from the file.
    pub fn save(&self) -> Result<(), StoreError> {
        let records: serde_json::Map<String, Value> = self
            .objects
            .iter()
            .map(|(key, entity)| (key.clone(), Value::Object(entity.to_map())))
            .collect();
        let content = serde_json::to_vec(&records).map_err(StoreError::Serialize)?;
        atomic_write(&self.path, &content)?;
        debug!(
            "saved {} entities to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Load every record of the backing file into the live collection.
    ///
    /// A missing file is not an error. Any bad record aborts the whole reload
    /// and leaves the live collection as it was. Returns the number of records
    /// loaded.
    pub fn reload(&mut self, registry: &Registry) -> Result<usize, StoreError> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no data file at {}, nothing to reload", self.path.display());
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let records: serde_json::Map<String, Value> = serde_json::from_slice(&content)
            .map_err(|source| StoreError::MalformedPersistedFile {
                path: self.path.clone(),
                source,
            })?;

        let mut staged = Vec::with_capacity(records.len());
        for (key, value) in records {
            let entity = rehydrate(registry, &key, value)
                .inspect_err(|e| warn!("rejecting {}: {}", self.path.display(), e))?;
            staged.push((key, entity));
        }

        let loaded = staged.len();
        self.objects.extend(staged);
        debug!("reloaded {} entities from {}", loaded, self.path.display());
        Ok(loaded)
    }
}

fn rehydrate(registry: &Registry, key: &str, value: Value) -> Result<Entity, StoreError> {
    let invalid_key = || StoreError::InvalidKey(key.to_string());
    let (tag, id) = split_key(key).ok_or_else(invalid_key)?;
    registry.resolve(tag)?;

    let mut map: Attributes =
        serde_json::from_value(value).map_err(|source| StoreError::InvalidRecord {
            key: key.to_string(),
            source: source.into(),
        })?;
    map.entry("id")
        .or_insert_with(|| Value::String(id.to_string()));

    let entity = Entity::from_map(tag, map).map_err(|source| StoreError::InvalidRecord {
        key: key.to_string(),
        source,
    })?;
    if entity.id() != id {
        return Err(invalid_key());
    }
    Ok(entity)
}

/// Write to a sibling temp file, then rename it over `target`.
fn atomic_write(target: &Path, content: &[u8]) -> io::Result<()> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let temp_path = target.with_extension("tmp");
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, target).inspect_err(|_| {
        let _ = fs::remove_file(&temp_path);
    })
}
