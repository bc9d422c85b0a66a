//! # EntiRest Core
//!
//! Client-side entity store: an in-memory, insertion-ordered,
//! dual-indexed collection of record-like entities with merge-on-add
//! reconciliation.
//!
//! This crate provides:
//! - [`Entity`] — an addressable record over an open attribute bag
//! - [`Collection`] — an ordered, deduplicated, dual-indexed entity store
//! - [`ModelSchema`] / [`CollectionSchema`] — explicit-composition
//!   subclassing for specialized entity and collection variants
//! - [`ClientId`] — process-lifetime-unique client identifiers
//!
//! Persistence over a transport lives in `entirest_sync`.
//!
//! ## Key invariants
//!
//! - An entity's client id never changes
//! - An entity belongs to at most one collection at a time
//! - The cid-index always mirrors the sequence; at most one entity per
//!   non-null identity is indexed
//! - Adding a record matching an indexed identity merges instead of
//!   duplicating

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod entity;
mod error;
mod schema;

pub use collection::{AddInput, AddOptions, Collection, LookupKey};
pub use entity::{BuildOptions, ClientId, Entity, ParseClientIdError};
pub use error::{CoreError, CoreResult};
pub use schema::{
    CollectionOverrides, CollectionSchema, InitializeFn, ModelOverrides, ModelSchema, ParseFn,
    ValidateFn,
};
