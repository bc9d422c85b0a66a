//! EntiRest walkthrough - a contacts list.
//!
//! This demo shows the core surface:
//! - Declaring specialized schemas with `extend`
//! - Merge-on-add reconciliation in a collection
//! - Persistence against an injected transport (scripted here)
//!
//! Run with: cargo run -p rust_contacts

use entirest_core::{Collection, CollectionOverrides, CollectionSchema, ModelOverrides, ModelSchema};
use entirest_sync::{
    CollectionPersist, EntityPersist, FetchOptions, MockTransport, Response, SaveOptions,
};
use serde::Serialize;
use serde_json::{json, Value};

/// A typed view of a contact record, serialized into the attribute bag.
#[derive(Debug, Serialize)]
struct Contact {
    name: String,
    email: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("=== EntiRest Contacts Demo ===\n");

    // A specialized entity type: contacts must have a name to save.
    let contact_model = ModelSchema::base().extend(
        ModelOverrides::new()
            .name("Contact")
            .defaults(match json!({"starred": false}) {
                Value::Object(defaults) => defaults,
                _ => unreachable!(),
            })
            .validate(|entity| entity.has("name")),
    );

    // A specialized collection bound to a resource address.
    let contacts = Collection::new(
        CollectionSchema::of(contact_model).extend(
            CollectionOverrides::new()
                .name("Contacts")
                .url("/api/contacts"),
        ),
    );

    // The transport is injected; here it is scripted.
    let transport = MockTransport::new();
    transport.respond(Response::ok(json!([
        {"id": 1, "name": "Ada Lovelace", "email": "ada@example.com"},
        {"id": 2, "name": "Alan Turing", "email": "alan@example.com"},
    ])));

    println!("1. Fetching contacts...");
    contacts
        .fetch(&transport, &FetchOptions::default())
        .expect("scripted fetch succeeds");
    for contact in contacts.all() {
        println!(
            "   [{}] {}",
            contact.cid(),
            contact.attr("name").unwrap_or(Value::Null)
        );
    }

    println!("\n2. Re-adding an existing contact merges instead of duplicating...");
    let ada = contacts
        .update(json!({"id": 1, "email": "lovelace@example.com"}))
        .expect("records are objects");
    println!(
        "   size is still {}, email now {}",
        contacts.size(),
        ada.attr("email").unwrap_or(Value::Null)
    );

    println!("\n3. Saving a new contact issues a create...");
    let grace = Contact {
        name: "Grace Hopper".to_string(),
        email: "grace@example.com".to_string(),
    };
    let grace = contacts
        .update(serde_json::to_value(&grace).expect("contact serializes"))
        .expect("records are objects");
    transport.respond(Response::ok(json!({"id": 3})));
    grace
        .save(&transport, &SaveOptions::default())
        .expect("scripted save succeeds");
    let request = transport.last_request().expect("a request was sent");
    println!(
        "   {} {} -> assigned id {}",
        request.method,
        request.url,
        grace.id().unwrap_or(Value::Null)
    );

    println!("\n4. Deleting a contact removes it and resets its identity...");
    transport.respond(Response::ok(Value::Null));
    grace.delete(&transport).expect("scripted delete succeeds");
    println!(
        "   size {}, grace is new again: {}",
        contacts.size(),
        grace.is_new()
    );

    println!("\n=== Done ===");
}
