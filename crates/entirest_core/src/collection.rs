//! Ordered, dual-indexed entity collection.

use crate::entity::{identity_key, ClientId, Entity};
use crate::error::{CoreError, CoreResult};
use crate::schema::CollectionSchema;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Options for [`Collection::add_one`].
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Position to insert a new entity at; appends when unset. Clamped to
    /// the sequence length.
    pub at: Option<usize>,
}

/// Something that can be added to a collection: a raw record or an
/// already-constructed entity.
pub enum AddInput {
    /// A raw attribute object.
    Raw(Value),
    /// An existing entity, used as-is.
    Existing(Arc<Entity>),
}

impl From<Value> for AddInput {
    fn from(value: Value) -> Self {
        Self::Raw(value)
    }
}

impl From<Map<String, Value>> for AddInput {
    fn from(map: Map<String, Value>) -> Self {
        Self::Raw(Value::Object(map))
    }
}

impl From<Arc<Entity>> for AddInput {
    fn from(entity: Arc<Entity>) -> Self {
        Self::Existing(entity)
    }
}

impl From<&Arc<Entity>> for AddInput {
    fn from(entity: &Arc<Entity>) -> Self {
        Self::Existing(Arc::clone(entity))
    }
}

/// A lookup reference: a raw identity value, a client id, or a record
/// from which either can be derived.
pub enum LookupKey {
    /// A server identity value.
    Identity(Value),
    /// A client id.
    Cid(ClientId),
    /// A raw record carrying an identity attribute or a `cid` field.
    Record(Map<String, Value>),
}

impl From<Value> for LookupKey {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Record(map),
            other => Self::Identity(other),
        }
    }
}

impl From<i64> for LookupKey {
    fn from(id: i64) -> Self {
        Self::Identity(Value::from(id))
    }
}

impl From<u64> for LookupKey {
    fn from(id: u64) -> Self {
        Self::Identity(Value::from(id))
    }
}

impl From<&str> for LookupKey {
    fn from(id: &str) -> Self {
        Self::Identity(Value::String(id.to_string()))
    }
}

impl From<String> for LookupKey {
    fn from(id: String) -> Self {
        Self::Identity(Value::String(id))
    }
}

impl From<ClientId> for LookupKey {
    fn from(cid: ClientId) -> Self {
        Self::Cid(cid)
    }
}

impl From<&Arc<Entity>> for LookupKey {
    fn from(entity: &Arc<Entity>) -> Self {
        Self::Cid(entity.cid())
    }
}

/// An ordered, deduplicated, dual-indexed store of entities of one
/// declared type.
///
/// Insertion order is significant and preserved across merges; new
/// entities append unless a position is given. Adding a record whose
/// resolved identity or client id matches an indexed entity merges its
/// fields onto the existing instance instead of creating a duplicate.
pub struct Collection {
    schema: Arc<CollectionSchema>,
    self_ref: Weak<Collection>,
    models: RwLock<Vec<Arc<Entity>>>,
    by_id: RwLock<HashMap<String, Arc<Entity>>>,
    by_cid: RwLock<HashMap<ClientId, Arc<Entity>>>,
    loading: AtomicBool,
    saving: AtomicBool,
}

impl Collection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new(schema: Arc<CollectionSchema>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            schema,
            self_ref: self_ref.clone(),
            models: RwLock::new(Vec::new()),
            by_id: RwLock::new(HashMap::new()),
            by_cid: RwLock::new(HashMap::new()),
            loading: AtomicBool::new(false),
            saving: AtomicBool::new(false),
        })
    }

    /// Creates a collection populated from an array of raw records.
    pub fn with_records(schema: Arc<CollectionSchema>, records: Value) -> CoreResult<Arc<Self>> {
        let collection = Self::new(schema);
        collection.add_many(records)?;
        Ok(collection)
    }

    /// Returns the collection schema.
    pub fn schema(&self) -> &Arc<CollectionSchema> {
        &self.schema
    }

    /// Adds a single record, merging if it is already present.
    ///
    /// Raw input must be a non-array object; anything else is an
    /// [`CoreError::InvalidArgument`]. If an entity with the record's
    /// resolved identity or client id is already indexed, the record's
    /// fields are shallow-merged onto it and the existing instance is
    /// returned, with no length change and no re-indexing. Otherwise a
    /// new entity of the collection's declared type is created (or the
    /// given entity used as-is), back-referenced, indexed, and inserted.
    pub fn add_one(
        &self,
        input: impl Into<AddInput>,
        options: &AddOptions,
    ) -> CoreResult<Arc<Entity>> {
        match input.into() {
            AddInput::Raw(Value::Object(record)) => self.add_record(record, options),
            AddInput::Raw(Value::Array(_)) => Err(CoreError::invalid_argument(
                "expected a single record to add, got an array",
            )),
            AddInput::Raw(other) => Err(CoreError::invalid_argument(format!(
                "cannot add `{other}` to the collection: a record object is required",
            ))),
            AddInput::Existing(entity) => self.add_entity(entity, options),
        }
    }

    fn add_record(
        &self,
        record: Map<String, Value>,
        options: &AddOptions,
    ) -> CoreResult<Arc<Entity>> {
        if let Some(existing) = self.get(LookupKey::Record(record.clone())) {
            existing.merge(&record);
            debug!(collection = self.schema.name(), cid = %existing.cid(), "merged record into existing entity");
            return Ok(existing);
        }
        let entity = Entity::new(Arc::clone(self.schema.model()), record);
        self.insert(entity, options)
    }

    fn add_entity(
        &self,
        entity: Arc<Entity>,
        options: &AddOptions,
    ) -> CoreResult<Arc<Entity>> {
        let existing = self
            .get(LookupKey::Cid(entity.cid()))
            .or_else(|| entity.id().map(LookupKey::Identity).and_then(|key| self.get(key)));
        if let Some(existing) = existing {
            if !Arc::ptr_eq(&existing, &entity) {
                if let Value::Object(fields) = entity.to_json() {
                    existing.merge(&fields);
                }
            }
            return Ok(existing);
        }
        self.insert(entity, options)
    }

    fn insert(&self, entity: Arc<Entity>, options: &AddOptions) -> CoreResult<Arc<Entity>> {
        entity.attach(self.self_ref.clone());
        self.by_cid.write().insert(entity.cid(), Arc::clone(&entity));
        if let Some(key) = entity.id().as_ref().and_then(identity_key) {
            self.by_id.write().insert(key, Arc::clone(&entity));
        }
        let mut models = self.models.write();
        let at = options.at.unwrap_or(models.len()).min(models.len());
        models.insert(at, Arc::clone(&entity));
        debug!(collection = self.schema.name(), cid = %entity.cid(), at, "added entity");
        Ok(entity)
    }

    /// Adds an array of records in input order.
    ///
    /// Rejects non-array input. Fails fast on an invalid element; records
    /// added before it remain added.
    pub fn add_many(&self, records: Value) -> CoreResult<Vec<Arc<Entity>>> {
        let Value::Array(records) = records else {
            return Err(CoreError::invalid_argument(
                "expected an array of records to add",
            ));
        };
        let mut added = Vec::with_capacity(records.len());
        for record in records {
            added.push(self.add_one(record, &AddOptions::default())?);
        }
        Ok(added)
    }

    /// Alias of [`Collection::add_one`] with default options.
    pub fn update(&self, input: impl Into<AddInput>) -> CoreResult<Arc<Entity>> {
        self.add_one(input, &AddOptions::default())
    }

    /// Alias of [`Collection::add_many`].
    pub fn update_many(&self, records: Value) -> CoreResult<Vec<Arc<Entity>>> {
        self.add_many(records)
    }

    /// Clears the sequence and both indices, then re-populates from
    /// `records` if given. Returns the resulting entities.
    pub fn reset(&self, records: Option<Value>) -> CoreResult<Vec<Arc<Entity>>> {
        self.clear();
        match records {
            Some(records) => self.add_many(records),
            None => Ok(Vec::new()),
        }
    }

    /// Removes every entity. Returns the collection for chaining.
    pub fn remove_all(&self) -> &Self {
        self.clear();
        self
    }

    fn clear(&self) {
        let mut models = self.models.write();
        for entity in models.iter() {
            entity.detach();
        }
        models.clear();
        self.by_id.write().clear();
        self.by_cid.write().clear();
        debug!(collection = self.schema.name(), "reset");
    }

    /// Resolves the identity value of a raw record via the declared
    /// entity type's identity attribute.
    pub fn record_id(&self, record: &Map<String, Value>) -> Option<Value> {
        record
            .get(self.schema.model().id_attribute())
            .filter(|value| !value.is_null())
            .cloned()
    }

    /// Looks up an entity by identity value, client id, or record.
    ///
    /// Identity `0` is a valid lookup key; null resolves to `None`.
    pub fn get(&self, key: impl Into<LookupKey>) -> Option<Arc<Entity>> {
        match key.into() {
            LookupKey::Identity(value) => self.get_by_identity(&value),
            LookupKey::Cid(cid) => self.by_cid.read().get(&cid).cloned(),
            LookupKey::Record(record) => match self.record_id(&record) {
                Some(id) => self.get_by_identity(&id),
                None => record
                    .get("cid")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<ClientId>().ok())
                    .and_then(|cid| self.by_cid.read().get(&cid).cloned()),
            },
        }
    }

    fn get_by_identity(&self, value: &Value) -> Option<Arc<Entity>> {
        let key = identity_key(value)?;
        if let Some(entity) = self.by_id.read().get(&key) {
            return Some(Arc::clone(entity));
        }
        // A bare string may also be a client id in its textual form.
        key.parse::<ClientId>()
            .ok()
            .and_then(|cid| self.by_cid.read().get(&cid).cloned())
    }

    /// Whether an entity resolves for the given key.
    pub fn exists(&self, key: impl Into<LookupKey>) -> bool {
        self.get(key).is_some()
    }

    /// Removes an entity, stripping both index entries and the
    /// back-reference. Returns `None` if nothing resolved.
    pub fn remove(&self, key: impl Into<LookupKey>) -> Option<Arc<Entity>> {
        let entity = self.get(key)?;
        self.by_cid.write().remove(&entity.cid());
        if let Some(id_key) = entity.id().as_ref().and_then(identity_key) {
            self.by_id.write().remove(&id_key);
        }
        let mut models = self.models.write();
        if let Some(position) = models.iter().position(|m| Arc::ptr_eq(m, &entity)) {
            models.remove(position);
        }
        entity.detach();
        debug!(collection = self.schema.name(), cid = %entity.cid(), "removed entity");
        Some(entity)
    }

    /// The entity at the given position, if in bounds.
    pub fn at(&self, index: usize) -> Option<Arc<Entity>> {
        self.models.read().get(index).cloned()
    }

    /// The last entity in the sequence.
    pub fn last(&self) -> Option<Arc<Entity>> {
        self.models.read().last().cloned()
    }

    /// Number of entities in the sequence.
    pub fn size(&self) -> usize {
        self.models.read().len()
    }

    /// Whether the collection holds no entities.
    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }

    /// All entities, in sequence order.
    pub fn all(&self) -> Vec<Arc<Entity>> {
        self.models.read().clone()
    }

    /// Entities whose attributes structurally contain every pair in
    /// `attrs`.
    pub fn where_all(&self, attrs: &Map<String, Value>) -> Vec<Arc<Entity>> {
        self.models
            .read()
            .iter()
            .filter(|entity| entity.matches(attrs))
            .cloned()
            .collect()
    }

    /// The first entity matching `attrs`.
    pub fn find_where(&self, attrs: &Map<String, Value>) -> Option<Arc<Entity>> {
        self.models
            .read()
            .iter()
            .find(|entity| entity.matches(attrs))
            .cloned()
    }

    /// Whether a fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Sets the loading flag.
    pub fn set_loading(&self, loading: bool) {
        self.loading.store(loading, Ordering::SeqCst);
    }

    /// Whether any owned entity is saving.
    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::SeqCst)
    }

    /// Sets the saving flag. Toggled by owned entities as their own
    /// saving state changes.
    pub fn set_saving(&self, saving: bool) {
        self.saving.store(saving, Ordering::SeqCst);
    }

    /// Serializes every entity in sequence order.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Array(self.models.read().iter().map(|e| e.to_json()).collect())
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("schema", &self.schema.name())
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}
