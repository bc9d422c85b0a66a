//! Entity types.

mod cid;
mod record;

pub use cid::{ClientId, ParseClientIdError};
pub use record::{BuildOptions, Entity};

pub(crate) use record::identity_key;
