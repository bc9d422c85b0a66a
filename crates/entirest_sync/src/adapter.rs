//! Verb-to-transport translation.

use crate::error::SyncResult;
use crate::transport::{Method, Request, Response, Transport};
use entirest_core::{Collection, CoreError, CoreResult, Entity};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Abstract persistence verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// Persist a new resource.
    Create,
    /// Read a resource.
    Read,
    /// Replace an existing resource.
    Update,
    /// Partially update an existing resource.
    Patch,
    /// Delete a resource.
    Delete,
}

impl Verb {
    /// The fixed verb-to-method table.
    #[must_use]
    pub const fn method(&self) -> Method {
        match self {
            Verb::Create => Method::Post,
            Verb::Read => Method::Get,
            Verb::Update => Method::Put,
            Verb::Patch => Method::Patch,
            Verb::Delete => Method::Delete,
        }
    }

    /// Whether the verb carries a request body by default.
    #[must_use]
    pub const fn carries_body(&self) -> bool {
        matches!(self, Verb::Create | Verb::Update | Verb::Patch)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verb::Create => "create",
            Verb::Read => "read",
            Verb::Update => "update",
            Verb::Patch => "patch",
            Verb::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Per-call sync overrides.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Explicit target address; wins over the target's own resolution.
    pub url: Option<String>,
    /// Explicit body; wins over the target's payload for body verbs.
    pub data: Option<Value>,
    /// Extra headers forwarded untouched to the transport.
    pub headers: Vec<(String, String)>,
}

/// Something the adapter can persist: resolves its own address, shapes
/// its own payload, and reports in-flight save state.
pub trait SyncTarget {
    /// Resolves the target address.
    fn resolve_url(&self) -> CoreResult<String>;

    /// Serialized payload sent for body-carrying verbs.
    fn payload(&self) -> Value;

    /// Flags the target as saving. Set synchronously before the
    /// transport call; clearing is the caller's responsibility.
    fn mark_saving(&self);
}

impl SyncTarget for Entity {
    fn resolve_url(&self) -> CoreResult<String> {
        self.url()
    }

    fn payload(&self) -> Value {
        self.to_json()
    }

    fn mark_saving(&self) {
        self.set_saving(true);
    }
}

impl SyncTarget for Collection {
    fn resolve_url(&self) -> CoreResult<String> {
        self.schema()
            .url()
            .map(str::to_string)
            .ok_or(CoreError::AddressResolution)
    }

    fn payload(&self) -> Value {
        self.to_json()
    }

    fn mark_saving(&self) {
        self.set_saving(true);
    }
}

/// Translates an abstract verb into one transport call.
///
/// Stateless: resolves the address (explicit `options.url` first, then
/// the target's own chain, failing with
/// [`AddressResolution`](CoreError::AddressResolution) before any
/// transport work), shapes the body (`options.data`, else the target's
/// payload, for `create`/`update`/`patch` only), marks the target as
/// saving, and hands the request to the transport.
pub fn sync(
    verb: Verb,
    target: &dyn SyncTarget,
    options: &SyncOptions,
    transport: &dyn Transport,
) -> SyncResult<Response> {
    let url = match &options.url {
        Some(url) => url.clone(),
        None => target.resolve_url()?,
    };
    let body = if verb.carries_body() {
        Some(options.data.clone().unwrap_or_else(|| target.payload()))
    } else {
        None
    };
    let request = Request {
        method: verb.method(),
        url,
        body,
        headers: options.headers.clone(),
    };
    target.mark_saving();
    debug!(%verb, method = %request.method, url = %request.url, "sync");
    Ok(transport.send(request)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use crate::SyncError;
    use entirest_core::{ModelOverrides, ModelSchema};
    use serde_json::json;

    fn entity_with_root() -> std::sync::Arc<Entity> {
        let schema = ModelSchema::base().extend(ModelOverrides::new().url_root("/api/items"));
        Entity::new(schema, serde_json::Map::new())
    }

    #[test]
    fn verb_method_table_is_fixed() {
        assert_eq!(Verb::Create.method(), Method::Post);
        assert_eq!(Verb::Read.method(), Method::Get);
        assert_eq!(Verb::Update.method(), Method::Put);
        assert_eq!(Verb::Patch.method(), Method::Patch);
        assert_eq!(Verb::Delete.method(), Method::Delete);
    }

    #[test]
    fn body_only_for_writing_verbs() {
        let transport = MockTransport::new();
        let entity = entity_with_root();
        entity.set_attr("name", json!("x"));

        for verb in [Verb::Read, Verb::Delete] {
            transport.respond(Response::ok(Value::Null));
            sync(verb, entity.as_ref(), &SyncOptions::default(), &transport).unwrap();
            assert!(transport.last_request().unwrap().body.is_none());
        }

        for verb in [Verb::Create, Verb::Update, Verb::Patch] {
            transport.respond(Response::ok(Value::Null));
            sync(verb, entity.as_ref(), &SyncOptions::default(), &transport).unwrap();
            assert_eq!(
                transport.last_request().unwrap().body,
                Some(json!({"name": "x"}))
            );
        }
    }

    #[test]
    fn explicit_url_and_data_win() {
        let transport = MockTransport::new();
        transport.respond(Response::ok(Value::Null));
        let entity = entity_with_root();

        let options = SyncOptions {
            url: Some("/elsewhere".to_string()),
            data: Some(json!({"override": true})),
            headers: vec![("x-trace".to_string(), "1".to_string())],
        };
        sync(Verb::Create, entity.as_ref(), &options, &transport).unwrap();

        let request = transport.last_request().unwrap();
        assert_eq!(request.url, "/elsewhere");
        assert_eq!(request.body, Some(json!({"override": true})));
        assert_eq!(request.headers[0].0, "x-trace");
    }

    #[test]
    fn unresolvable_address_fails_before_transport() {
        let transport = MockTransport::new();
        let entity = Entity::new(ModelSchema::base(), serde_json::Map::new());

        let err = sync(Verb::Read, entity.as_ref(), &SyncOptions::default(), &transport)
            .unwrap_err();
        assert!(matches!(err, SyncError::Core(CoreError::AddressResolution)));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn target_marked_saving_before_the_call() {
        let transport = MockTransport::new();
        transport.respond(Response::ok(Value::Null));
        let entity = entity_with_root();
        assert!(!entity.is_saving());

        sync(Verb::Read, entity.as_ref(), &SyncOptions::default(), &transport).unwrap();
        assert!(entity.is_saving());
    }
}
