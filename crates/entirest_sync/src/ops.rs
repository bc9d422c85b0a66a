//! Persistence operations for entities and collections.
//!
//! The state machine around each operation: flag transitions, response
//! parsing and merging, error caching, and collection detachment on
//! delete. All failures clear the in-flight flag they set and propagate;
//! nothing is retried here.

use crate::adapter::{sync, SyncOptions, Verb};
use crate::error::{SyncError, SyncResult};
use crate::transport::{Response, Transport};
use entirest_core::{Collection, Entity};
use serde_json::Value;
use tracing::warn;

/// Options for fetch operations.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Run the response through the schema parse hook. Defaults to true.
    pub parse: bool,
    /// Per-call sync overrides.
    pub sync: SyncOptions,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            parse: true,
            sync: SyncOptions::default(),
        }
    }
}

/// Options for [`EntityPersist::save`].
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Validate before saving. Defaults to true; validation failure
    /// rejects the save without calling the transport.
    pub validate: bool,
    /// Per-call sync overrides.
    pub sync: SyncOptions,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            validate: true,
            sync: SyncOptions::default(),
        }
    }
}

/// Persistence operations on a single entity.
pub trait EntityPersist {
    /// Reads the entity from the server and merges the response onto it.
    fn fetch(&self, transport: &dyn Transport, options: &FetchOptions) -> SyncResult<Response>;

    /// Persists the entity: `create` when new, `update` otherwise.
    fn save(&self, transport: &dyn Transport, options: &SaveOptions) -> SyncResult<Response>;

    /// Deletes the entity on the server, removes it from its owning
    /// collection, and clears its identity so it presents as new again.
    fn delete(&self, transport: &dyn Transport) -> SyncResult<Response>;
}

impl EntityPersist for Entity {
    fn fetch(&self, transport: &dyn Transport, options: &FetchOptions) -> SyncResult<Response> {
        self.set_loading(true);
        match sync(Verb::Read, self, &options.sync, transport) {
            Ok(response) => {
                self.set_loading(false);
                let data = if options.parse {
                    self.schema().run_parse(response.data.clone())
                } else {
                    response.data.clone()
                };
                if let Value::Object(fields) = data {
                    self.merge(&fields);
                }
                Ok(response)
            }
            Err(SyncError::Transport(source)) => {
                self.set_loading(false);
                warn!(cid = %self.cid(), error = %source, "entity fetch failed");
                Err(SyncError::FetchFailed { source })
            }
            Err(other) => {
                self.set_loading(false);
                Err(other)
            }
        }
    }

    fn save(&self, transport: &dyn Transport, options: &SaveOptions) -> SyncResult<Response> {
        let verb = if self.is_new() { Verb::Create } else { Verb::Update };
        self.set_saving(true);
        if options.validate && !self.is_valid() {
            self.set_saving(false);
            return Err(SyncError::ValidationFailed);
        }
        match sync(verb, self, &options.sync, transport) {
            Ok(response) => {
                self.set_saving(false);
                if let Value::Object(fields) = self.schema().run_parse(response.data.clone()) {
                    self.merge(&fields);
                }
                Ok(response)
            }
            Err(SyncError::Transport(source)) => {
                self.set_errors(source.data.clone());
                warn!(cid = %self.cid(), error = %source, "entity save rejected");
                Err(SyncError::SaveRejected { source })
            }
            Err(other) => Err(other),
        }
    }

    fn delete(&self, transport: &dyn Transport) -> SyncResult<Response> {
        self.set_loading(true);
        match sync(Verb::Delete, self, &SyncOptions::default(), transport) {
            Ok(response) => {
                self.set_loading(false);
                // The cid index always holds the entity; the identity
                // index may not, if the identity arrived by merge.
                if let Some(collection) = self.collection() {
                    collection.remove(self.cid());
                }
                self.clear_identity();
                Ok(response)
            }
            Err(SyncError::Transport(source)) => {
                self.set_loading(false);
                warn!(cid = %self.cid(), error = %source, "entity delete failed");
                Err(SyncError::DeleteFailed { source })
            }
            Err(other) => {
                self.set_loading(false);
                Err(other)
            }
        }
    }
}

/// Persistence operations on a collection.
pub trait CollectionPersist {
    /// Reads the collection's records from the server and reconciles
    /// them via merge-on-add.
    fn fetch(&self, transport: &dyn Transport, options: &FetchOptions) -> SyncResult<Response>;
}

impl CollectionPersist for Collection {
    fn fetch(&self, transport: &dyn Transport, options: &FetchOptions) -> SyncResult<Response> {
        self.set_loading(true);
        match sync(Verb::Read, self, &options.sync, transport) {
            Ok(response) => {
                self.set_loading(false);
                let data = if options.parse {
                    self.schema().run_parse(response.data.clone())
                } else {
                    response.data.clone()
                };
                self.add_many(data)?;
                Ok(response)
            }
            Err(SyncError::Transport(source)) => {
                self.set_loading(false);
                warn!(collection = self.schema().name(), error = %source, "collection fetch failed");
                Err(SyncError::FetchFailed { source })
            }
            Err(other) => {
                self.set_loading(false);
                Err(other)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Method, MockTransport, TransportFailure};
    use entirest_core::{CollectionSchema, ModelOverrides, ModelSchema};
    use serde_json::json;
    use std::sync::Arc;

    fn item_schema() -> Arc<ModelSchema> {
        ModelSchema::base().extend(ModelOverrides::new().url_root("/api/items"))
    }

    #[test]
    fn fetch_merges_parsed_response() {
        let transport = MockTransport::new();
        transport.respond(Response::ok(json!({"id": 3, "name": "fetched"})));

        let entity = Entity::new(item_schema(), serde_json::Map::new());
        entity.set_attr("id", json!(3));
        let response = entity.fetch(&transport, &FetchOptions::default()).unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(entity.attr("name"), Some(json!("fetched")));
        assert!(!entity.is_loading());
        assert_eq!(transport.last_request().unwrap().url, "/api/items/3");
    }

    #[test]
    fn fetch_failure_clears_loading_and_keeps_cause() {
        let transport = MockTransport::new();
        transport.fail(TransportFailure::new("gone").with_status(502));

        let entity = Entity::new(item_schema(), serde_json::Map::new());
        let err = entity.fetch(&transport, &FetchOptions::default()).unwrap_err();

        assert!(matches!(
            err,
            SyncError::FetchFailed { source: TransportFailure { status: Some(502), .. } }
        ));
        assert!(!entity.is_loading());
    }

    #[test]
    fn fetch_can_skip_parsing() {
        let schema = item_schema().extend(ModelOverrides::new().parse(|_| json!({"parsed": true})));
        let entity = Entity::new(schema, serde_json::Map::new());

        let transport = MockTransport::new();
        transport.respond(Response::ok(json!({"raw": true})));
        entity
            .fetch(
                &transport,
                &FetchOptions {
                    parse: false,
                    sync: SyncOptions::default(),
                },
            )
            .unwrap();

        assert_eq!(entity.attr("raw"), Some(json!(true)));
        assert_eq!(entity.attr("parsed"), None);
    }

    #[test]
    fn save_new_entity_creates() {
        let transport = MockTransport::new();
        transport.respond(Response::ok(json!({"id": 41})));

        let entity = Entity::new(item_schema(), serde_json::Map::new());
        entity.set_attr("name", json!("fresh"));
        entity.save(&transport, &SaveOptions::default()).unwrap();

        let request = transport.last_request().unwrap();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, "/api/items");
        assert_eq!(request.body, Some(json!({"name": "fresh"})));

        // Server identity merged back; a later save updates.
        assert_eq!(entity.id(), Some(json!(41)));
        assert!(!entity.is_saving());

        transport.respond(Response::ok(Value::Null));
        entity.save(&transport, &SaveOptions::default()).unwrap();
        let request = transport.last_request().unwrap();
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.url, "/api/items/41");
    }

    #[test]
    fn save_gated_by_validation() {
        let schema = item_schema().extend(ModelOverrides::new().validate(|e| e.has("name")));
        let entity = Entity::new(schema, serde_json::Map::new());
        let transport = MockTransport::new();

        let err = entity.save(&transport, &SaveOptions::default()).unwrap_err();
        assert!(matches!(err, SyncError::ValidationFailed));
        assert!(transport.requests().is_empty());
        assert!(!entity.is_saving());

        // validate: false forces the save through.
        transport.respond(Response::ok(Value::Null));
        entity
            .save(
                &transport,
                &SaveOptions {
                    validate: false,
                    sync: SyncOptions::default(),
                },
            )
            .unwrap();
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn save_rejection_caches_errors() {
        let transport = MockTransport::new();
        let payload = json!([{"name": ["is required"]}]);
        transport.fail(
            TransportFailure::new("unprocessable")
                .with_status(422)
                .with_data(payload.clone()),
        );

        let entity = Entity::new(item_schema(), serde_json::Map::new());
        let err = entity.save(&transport, &SaveOptions::default()).unwrap_err();

        assert!(matches!(err, SyncError::SaveRejected { .. }));
        assert_eq!(entity.errors(), Some(payload));
    }

    #[test]
    fn saving_cascades_to_owning_collection() {
        let collection = Collection::new(CollectionSchema::of(item_schema()));
        let entity = collection.update(json!({"id": 1})).unwrap();

        let transport = MockTransport::new();
        transport.respond(Response::ok(Value::Null));
        entity.save(&transport, &SaveOptions::default()).unwrap();

        // Cleared on success, and the clear cascaded too.
        assert!(!entity.is_saving());
        assert!(!collection.is_saving());
    }

    #[test]
    fn delete_detaches_and_resets_identity() {
        let collection = Collection::new(CollectionSchema::of(item_schema()));
        let entity = collection.update(json!({"id": 8, "name": "bye"})).unwrap();

        let transport = MockTransport::new();
        transport.respond(Response::ok(Value::Null));
        entity.delete(&transport).unwrap();

        assert_eq!(transport.last_request().unwrap().url, "/api/items/8");
        assert_eq!(collection.size(), 0);
        assert!(collection.get(8i64).is_none());
        assert!(entity.collection().is_none());
        assert!(entity.is_new());
    }

    #[test]
    fn delete_failure_keeps_membership() {
        let collection = Collection::new(CollectionSchema::of(item_schema()));
        let entity = collection.update(json!({"id": 8})).unwrap();

        let transport = MockTransport::new();
        transport.fail(TransportFailure::new("nope"));
        let err = entity.delete(&transport).unwrap_err();

        assert!(matches!(err, SyncError::DeleteFailed { .. }));
        assert_eq!(collection.size(), 1);
        assert!(!entity.is_new());
        assert!(!entity.is_loading());
    }

    #[test]
    fn collection_fetch_reconciles() {
        let model = ModelSchema::base();
        let schema = CollectionSchema::of(model)
            .extend(entirest_core::CollectionOverrides::new().url("/api/people"));
        let collection = Collection::new(schema);
        collection.update(json!({"id": 1, "name": "old"})).unwrap();

        let transport = MockTransport::new();
        transport.respond(Response::ok(json!([
            {"id": 1, "name": "new"},
            {"id": 2, "name": "added"},
        ])));
        collection.fetch(&transport, &FetchOptions::default()).unwrap();

        assert_eq!(transport.last_request().unwrap().method, Method::Get);
        assert_eq!(collection.size(), 2);
        assert_eq!(collection.get(1i64).unwrap().attr("name"), Some(json!("new")));
        assert!(!collection.is_loading());
    }

    #[test]
    fn collection_fetch_failure_propagates() {
        let schema = CollectionSchema::of(ModelSchema::base())
            .extend(entirest_core::CollectionOverrides::new().url("/api/people"));
        let collection = Collection::new(schema);

        let transport = MockTransport::new();
        transport.fail(TransportFailure::new("down"));
        let err = collection
            .fetch(&transport, &FetchOptions::default())
            .unwrap_err();

        assert!(matches!(err, SyncError::FetchFailed { .. }));
        assert!(!collection.is_loading());
        assert!(collection.is_empty());
    }

    #[test]
    fn collection_parse_hook_shapes_the_response() {
        let schema = CollectionSchema::of(ModelSchema::base()).extend(
            entirest_core::CollectionOverrides::new()
                .url("/api/wrapped")
                .parse(|response| response.get("results").cloned().unwrap_or(Value::Null)),
        );
        let collection = Collection::new(schema);

        let transport = MockTransport::new();
        transport.respond(Response::ok(json!({"results": [{"id": 1}, {"id": 2}]})));
        collection.fetch(&transport, &FetchOptions::default()).unwrap();

        assert_eq!(collection.size(), 2);
    }
}
