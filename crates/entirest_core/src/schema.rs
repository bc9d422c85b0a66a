//! Model and collection schemas.
//!
//! A schema is the type-level description of an entity or collection
//! variant: default attributes, the identity attribute name, address
//! roots, overridable hooks, and type-level static values. Specialized
//! variants are produced with [`ModelSchema::extend`] /
//! [`CollectionSchema::extend`], which copy the base exactly once and
//! overlay only the supplied overrides. The base remains reachable
//! through [`ModelSchema::parent`] for explicit delegation.

use crate::entity::Entity;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identity tokens for schemas; survive the clones `extend` makes.
static NEXT_SCHEMA_TOKEN: AtomicU64 = AtomicU64::new(1);

fn next_token() -> u64 {
    NEXT_SCHEMA_TOKEN.fetch_add(1, Ordering::Relaxed)
}

/// Hook converting a raw response payload into attribute values.
pub type ParseFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Hook validating an entity before it is saved.
pub type ValidateFn = Arc<dyn Fn(&Entity) -> bool + Send + Sync>;

/// Hook run once at the end of entity construction.
pub type InitializeFn = Arc<dyn Fn(&Entity) + Send + Sync>;

/// Type-level description of an entity variant.
#[derive(Clone)]
pub struct ModelSchema {
    token: u64,
    name: String,
    id_attribute: String,
    defaults: Map<String, Value>,
    url_root: Option<String>,
    parse: Option<ParseFn>,
    validate: Option<ValidateFn>,
    initialize: Option<InitializeFn>,
    statics: Map<String, Value>,
    parent: Option<Arc<ModelSchema>>,
}

impl ModelSchema {
    /// The root schema: `"id"` identity, no defaults, no hooks.
    #[must_use]
    pub fn base() -> Arc<Self> {
        Arc::new(Self {
            token: next_token(),
            name: "Entity".to_string(),
            id_attribute: "id".to_string(),
            defaults: Map::new(),
            url_root: None,
            parse: None,
            validate: None,
            initialize: None,
            statics: Map::new(),
            parent: None,
        })
    }

    /// Derives a specialized schema from this one.
    ///
    /// The base's behavior and statics are copied once; fields present in
    /// `overrides` replace the copies, and override statics shadow base
    /// statics key by key. No base initialization logic re-runs, and
    /// entities built from the derived schema still
    /// [`derive from`](Self::derives_from) this one.
    #[must_use]
    pub fn extend(&self, overrides: ModelOverrides) -> Arc<Self> {
        let mut derived = self.clone();
        derived.token = next_token();
        derived.parent = Some(Arc::new(self.clone()));
        if let Some(name) = overrides.name {
            derived.name = name;
        }
        if let Some(id_attribute) = overrides.id_attribute {
            derived.id_attribute = id_attribute;
        }
        if let Some(defaults) = overrides.defaults {
            derived.defaults = defaults;
        }
        if let Some(url_root) = overrides.url_root {
            derived.url_root = Some(url_root);
        }
        if let Some(parse) = overrides.parse {
            derived.parse = Some(parse);
        }
        if let Some(validate) = overrides.validate {
            derived.validate = Some(validate);
        }
        if let Some(initialize) = overrides.initialize {
            derived.initialize = Some(initialize);
        }
        for (key, value) in overrides.statics {
            derived.statics.insert(key, value);
        }
        Arc::new(derived)
    }

    /// Returns the schema this one was extended from, if any.
    ///
    /// This is the explicit "super" handle: delegation to base behavior
    /// goes through it rather than through any implicit chain.
    pub fn parent(&self) -> Option<&Arc<ModelSchema>> {
        self.parent.as_ref()
    }

    /// Whether this schema is `ancestor` or was extended from it,
    /// directly or transitively.
    #[must_use]
    pub fn derives_from(&self, ancestor: &ModelSchema) -> bool {
        let mut current = self;
        loop {
            if current.token == ancestor.token {
                return true;
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Returns the schema name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the attribute holding the server-assigned identity.
    pub fn id_attribute(&self) -> &str {
        &self.id_attribute
    }

    /// Default attribute values for new entities.
    ///
    /// Entities receive a deep clone per instance; no two entities share
    /// a default object or array.
    pub fn defaults(&self) -> &Map<String, Value> {
        &self.defaults
    }

    /// The entity's own declared base address, if any.
    pub fn url_root(&self) -> Option<&str> {
        self.url_root.as_deref()
    }

    /// Looks up a type-level static value.
    pub fn static_value(&self, key: &str) -> Option<&Value> {
        self.statics.get(key)
    }

    /// Runs the parse hook, or passes the payload through unchanged.
    #[must_use]
    pub fn run_parse(&self, payload: Value) -> Value {
        match &self.parse {
            Some(parse) => parse(payload),
            None => payload,
        }
    }

    /// Runs the validate hook; entities with no hook are always valid.
    #[must_use]
    pub fn run_validate(&self, entity: &Entity) -> bool {
        match &self.validate {
            Some(validate) => validate(entity),
            None => true,
        }
    }

    /// Runs the initialize hook, if declared.
    pub fn run_initialize(&self, entity: &Entity) {
        if let Some(initialize) = &self.initialize {
            initialize(entity);
        }
    }
}

impl fmt::Debug for ModelSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSchema")
            .field("name", &self.name)
            .field("id_attribute", &self.id_attribute)
            .field("url_root", &self.url_root)
            .finish_non_exhaustive()
    }
}

/// Overrides applied by [`ModelSchema::extend`].
///
/// Unspecified fields inherit the base schema.
#[derive(Default)]
pub struct ModelOverrides {
    name: Option<String>,
    id_attribute: Option<String>,
    defaults: Option<Map<String, Value>>,
    url_root: Option<String>,
    parse: Option<ParseFn>,
    validate: Option<ValidateFn>,
    initialize: Option<InitializeFn>,
    statics: Map<String, Value>,
}

impl ModelOverrides {
    /// Creates an empty override set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the schema name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the identity attribute name.
    #[must_use]
    pub fn id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.id_attribute = Some(attribute.into());
        self
    }

    /// Replaces the default attributes.
    #[must_use]
    pub fn defaults(mut self, defaults: Map<String, Value>) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Sets the entity-level base address.
    #[must_use]
    pub fn url_root(mut self, url_root: impl Into<String>) -> Self {
        self.url_root = Some(url_root.into());
        self
    }

    /// Overrides the parse hook.
    #[must_use]
    pub fn parse(mut self, parse: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.parse = Some(Arc::new(parse));
        self
    }

    /// Overrides the validate hook.
    #[must_use]
    pub fn validate(mut self, validate: impl Fn(&Entity) -> bool + Send + Sync + 'static) -> Self {
        self.validate = Some(Arc::new(validate));
        self
    }

    /// Overrides the initialize hook.
    #[must_use]
    pub fn initialize(mut self, initialize: impl Fn(&Entity) + Send + Sync + 'static) -> Self {
        self.initialize = Some(Arc::new(initialize));
        self
    }

    /// Adds a type-level static value, shadowing the base's on collision.
    #[must_use]
    pub fn static_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.statics.insert(key.into(), value);
        self
    }
}

/// Type-level description of a collection variant.
#[derive(Clone)]
pub struct CollectionSchema {
    token: u64,
    name: String,
    model: Arc<ModelSchema>,
    url: Option<String>,
    parse: Option<ParseFn>,
    statics: Map<String, Value>,
    parent: Option<Arc<CollectionSchema>>,
}

impl CollectionSchema {
    /// Creates a collection schema over the given entity type.
    #[must_use]
    pub fn of(model: Arc<ModelSchema>) -> Arc<Self> {
        Arc::new(Self {
            token: next_token(),
            name: "Collection".to_string(),
            model,
            url: None,
            parse: None,
            statics: Map::new(),
            parent: None,
        })
    }

    /// Derives a specialized collection schema from this one.
    ///
    /// Same contract as [`ModelSchema::extend`].
    #[must_use]
    pub fn extend(&self, overrides: CollectionOverrides) -> Arc<Self> {
        let mut derived = self.clone();
        derived.token = next_token();
        derived.parent = Some(Arc::new(self.clone()));
        if let Some(name) = overrides.name {
            derived.name = name;
        }
        if let Some(model) = overrides.model {
            derived.model = model;
        }
        if let Some(url) = overrides.url {
            derived.url = Some(url);
        }
        if let Some(parse) = overrides.parse {
            derived.parse = Some(parse);
        }
        for (key, value) in overrides.statics {
            derived.statics.insert(key, value);
        }
        Arc::new(derived)
    }

    /// Returns the schema this one was extended from, if any.
    pub fn parent(&self) -> Option<&Arc<CollectionSchema>> {
        self.parent.as_ref()
    }

    /// Whether this schema is `ancestor` or was extended from it.
    #[must_use]
    pub fn derives_from(&self, ancestor: &CollectionSchema) -> bool {
        let mut current = self;
        loop {
            if current.token == ancestor.token {
                return true;
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Returns the schema name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The entity type raw records are instantiated into.
    pub fn model(&self) -> &Arc<ModelSchema> {
        &self.model
    }

    /// The collection's declared base address, if any.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Looks up a type-level static value.
    pub fn static_value(&self, key: &str) -> Option<&Value> {
        self.statics.get(key)
    }

    /// Runs the parse hook, or passes the payload through unchanged.
    #[must_use]
    pub fn run_parse(&self, payload: Value) -> Value {
        match &self.parse {
            Some(parse) => parse(payload),
            None => payload,
        }
    }
}

impl fmt::Debug for CollectionSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionSchema")
            .field("name", &self.name)
            .field("model", &self.model.name())
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Overrides applied by [`CollectionSchema::extend`].
#[derive(Default)]
pub struct CollectionOverrides {
    name: Option<String>,
    model: Option<Arc<ModelSchema>>,
    url: Option<String>,
    parse: Option<ParseFn>,
    statics: Map<String, Value>,
}

impl CollectionOverrides {
    /// Creates an empty override set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the schema name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replaces the declared entity type.
    #[must_use]
    pub fn model(mut self, model: Arc<ModelSchema>) -> Self {
        self.model = Some(model);
        self
    }

    /// Sets the collection base address.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Overrides the response parse hook.
    #[must_use]
    pub fn parse(mut self, parse: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.parse = Some(Arc::new(parse));
        self
    }

    /// Adds a type-level static value, shadowing the base's on collision.
    #[must_use]
    pub fn static_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.statics.insert(key.into(), value);
        self
    }
}
