//! The entity record.

use crate::collection::Collection;
use crate::entity::ClientId;
use crate::error::{CoreError, CoreResult};
use crate::schema::ModelSchema;
use parking_lot::RwLock;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Encode set for identity path segments: RFC 3986 unreserved stays bare.
const PATH_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Canonical index/path form of an identity value.
///
/// Null and structured values carry no identity. `0` is a valid identity
/// and maps to `"0"`, distinct from "absent".
pub(crate) fn identity_key(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Array(_) | Value::Object(_) => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
    }
}

/// Options for [`Entity::build`].
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Run the schema's parse hook over the raw attributes first.
    pub parse: bool,
}

/// A single addressable record.
///
/// An entity owns an open attribute bag merged over a per-instance deep
/// clone of its schema's defaults, carries a process-lifetime-unique
/// [`ClientId`], and tracks in-flight persistence state. It may belong to
/// at most one [`Collection`] at a time, through a non-owning
/// back-reference set on insertion and cleared on removal.
pub struct Entity {
    schema: Arc<ModelSchema>,
    cid: ClientId,
    attrs: RwLock<Map<String, Value>>,
    loading: AtomicBool,
    saving: AtomicBool,
    errors: RwLock<Option<Value>>,
    collection: RwLock<Weak<Collection>>,
}

impl Entity {
    /// Creates an entity from raw attributes.
    #[must_use]
    pub fn new(schema: Arc<ModelSchema>, attrs: Map<String, Value>) -> Arc<Self> {
        Self::build(schema, attrs, &BuildOptions::default())
    }

    /// Creates an entity, optionally running the schema parse hook over
    /// the raw attributes first.
    ///
    /// Caller attributes win over schema defaults on key collision. The
    /// schema's initialize hook runs last, exactly once.
    #[must_use]
    pub fn build(schema: Arc<ModelSchema>, attrs: Map<String, Value>, options: &BuildOptions) -> Arc<Self> {
        let raw = if options.parse {
            match schema.run_parse(Value::Object(attrs)) {
                Value::Object(parsed) => parsed,
                _ => Map::new(),
            }
        } else {
            attrs
        };

        // Defaults are deep-cloned per instance, then overlaid.
        let mut merged = schema.defaults().clone();
        for (key, value) in raw {
            if key != "cid" {
                merged.insert(key, value);
            }
        }

        let entity = Arc::new(Self {
            schema: Arc::clone(&schema),
            cid: ClientId::next(),
            attrs: RwLock::new(merged),
            loading: AtomicBool::new(false),
            saving: AtomicBool::new(false),
            errors: RwLock::new(None),
            collection: RwLock::new(Weak::new()),
        });
        schema.run_initialize(&entity);
        entity
    }

    /// Returns the client id. Never changes.
    #[inline]
    pub fn cid(&self) -> ClientId {
        self.cid
    }

    /// Returns the entity's schema.
    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    /// Returns the server-assigned identity value, if present and non-null.
    pub fn id(&self) -> Option<Value> {
        self.attrs
            .read()
            .get(self.schema.id_attribute())
            .filter(|value| !value.is_null())
            .cloned()
    }

    /// An entity without an identity value is considered new.
    pub fn is_new(&self) -> bool {
        self.id().is_none()
    }

    /// Result of the schema's validate hook; `true` when no hook is set.
    pub fn is_valid(&self) -> bool {
        self.schema.run_validate(self)
    }

    /// Whether the attribute is present and non-null.
    pub fn has(&self, key: &str) -> bool {
        self.attrs
            .read()
            .get(key)
            .is_some_and(|value| !value.is_null())
    }

    /// Returns an attribute value.
    pub fn attr(&self, key: &str) -> Option<Value> {
        self.attrs.read().get(key).cloned()
    }

    /// Sets a single attribute.
    pub fn set_attr(&self, key: impl Into<String>, value: Value) {
        self.attrs.write().insert(key.into(), value);
    }

    /// Removes an attribute, returning its previous value.
    pub fn remove_attr(&self, key: &str) -> Option<Value> {
        self.attrs.write().remove(key)
    }

    /// Shallow-merges the given fields onto this entity.
    ///
    /// Top-level keys are overwritten, last writer wins; keys absent from
    /// `fields` are untouched. A `cid` field is ignored.
    pub fn merge(&self, fields: &Map<String, Value>) {
        let mut attrs = self.attrs.write();
        for (key, value) in fields {
            if key != "cid" {
                attrs.insert(key.clone(), value.clone());
            }
        }
    }

    /// Resolves the address of this entity.
    ///
    /// The base is the schema's `url_root`, else the owning collection's
    /// declared url. For a non-new entity the URL-encoded identity is
    /// appended to the trailing-slash-normalized base.
    pub fn url(&self) -> CoreResult<String> {
        let base = match self.schema.url_root() {
            Some(root) => root.to_string(),
            None => self
                .collection()
                .and_then(|collection| collection.schema().url().map(str::to_string))
                .ok_or(CoreError::AddressResolution)?,
        };
        let id = match self.id().as_ref().and_then(identity_key) {
            Some(id) => id,
            None => return Ok(base),
        };
        let mut url = base;
        if !url.ends_with('/') {
            url.push('/');
        }
        url.push_str(&utf8_percent_encode(&id, PATH_COMPONENT).to_string());
        Ok(url)
    }

    /// Flat structural copy of the attributes.
    ///
    /// The client id and the collection relation are never part of the
    /// serialized shape.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(self.attrs.read().clone())
    }

    /// Whether a fetch or delete is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Sets the loading flag.
    pub fn set_loading(&self, loading: bool) {
        self.loading.store(loading, Ordering::SeqCst);
    }

    /// Whether a save is in flight.
    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::SeqCst)
    }

    /// Sets the saving flag, cascading it to the owning collection.
    pub fn set_saving(&self, saving: bool) {
        self.saving.store(saving, Ordering::SeqCst);
        if let Some(collection) = self.collection() {
            collection.set_saving(saving);
        }
    }

    /// The last save-failure payload, if any.
    pub fn errors(&self) -> Option<Value> {
        self.errors.read().clone()
    }

    /// Replaces the save-failure payload wholesale.
    pub fn set_errors(&self, errors: Option<Value>) {
        *self.errors.write() = errors;
    }

    /// The owning collection, if this entity is currently in one.
    pub fn collection(&self) -> Option<Arc<Collection>> {
        self.collection.read().upgrade()
    }

    pub(crate) fn attach(&self, collection: Weak<Collection>) {
        *self.collection.write() = collection;
    }

    pub(crate) fn detach(&self) {
        *self.collection.write() = Weak::new();
    }

    /// Removes the identity attribute, making the entity present as new.
    pub fn clear_identity(&self) {
        self.attrs.write().remove(self.schema.id_attribute());
    }

    // Projections over the attribute bag.

    /// Attribute names, in bag order.
    pub fn attr_keys(&self) -> Vec<String> {
        self.attrs.read().keys().cloned().collect()
    }

    /// Attribute values, in bag order.
    pub fn attr_values(&self) -> Vec<Value> {
        self.attrs.read().values().cloned().collect()
    }

    /// Attribute name/value pairs, in bag order.
    pub fn pairs(&self) -> Vec<(String, Value)> {
        self.attrs
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Swaps keys and values; values with no scalar form are skipped.
    pub fn invert(&self) -> Map<String, Value> {
        let attrs = self.attrs.read();
        let mut inverted = Map::new();
        for (key, value) in attrs.iter() {
            if let Some(as_key) = identity_key(value) {
                inverted.insert(as_key, Value::String(key.clone()));
            }
        }
        inverted
    }

    /// The attributes named in `keys`, where present.
    pub fn pick(&self, keys: &[&str]) -> Map<String, Value> {
        let attrs = self.attrs.read();
        let mut picked = Map::new();
        for key in keys {
            if let Some(value) = attrs.get(*key) {
                picked.insert((*key).to_string(), value.clone());
            }
        }
        picked
    }

    /// All attributes except those named in `keys`.
    pub fn omit(&self, keys: &[&str]) -> Map<String, Value> {
        self.attrs
            .read()
            .iter()
            .filter(|(key, _)| !keys.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Whether the attribute bag is empty.
    pub fn is_empty(&self) -> bool {
        self.attrs.read().is_empty()
    }

    /// Whether every pair in `attrs` is present with an equal value.
    pub(crate) fn matches(&self, attrs: &Map<String, Value>) -> bool {
        let own = self.attrs.read();
        attrs
            .iter()
            .all(|(key, value)| own.get(key) == Some(value))
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("schema", &self.schema.name())
            .field("cid", &self.cid)
            .field("id", &self.id())
            .finish_non_exhaustive()
    }
}
