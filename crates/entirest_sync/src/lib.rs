//! # EntiRest Sync
//!
//! Persistence layer for EntiRest entities and collections.
//!
//! This crate provides:
//! - [`Verb`] and the fixed verb-to-method table
//! - [`sync`] — the stateless verb-to-transport translation
//! - [`Transport`] — the injected request/response capability, with a
//!   scripted [`MockTransport`] for tests
//! - [`EntityPersist`] / [`CollectionPersist`] — `fetch`/`save`/`delete`
//!   operations with their flag transitions and reconciliation
//!
//! ## Key invariants
//!
//! - Address resolution failures surface before any transport call
//! - Validation failures reject a save without touching the transport
//! - Transport failures are never retried here and always carry their
//!   cause
//! - A fetched response flows through `parse` and then merge-on-add;
//!   it never duplicates already-indexed entities

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod error;
mod ops;
mod transport;

pub use adapter::{sync, SyncOptions, SyncTarget, Verb};
pub use error::{SyncError, SyncResult};
pub use ops::{CollectionPersist, EntityPersist, FetchOptions, SaveOptions};
pub use transport::{Method, MockTransport, Request, Response, Transport, TransportFailure};
