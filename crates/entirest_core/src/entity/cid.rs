//! Client identifier.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter backing [`ClientId::next`]. Never reset.
static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique client-side identifier for an entity.
///
/// Client ids are:
/// - Unique for the lifetime of the process
/// - Monotonically increasing in allocation order
/// - Immutable once assigned to an entity
///
/// They identify entities that have no server-assigned identity yet, and
/// key the collection's cid-index. The textual form is `c<N>` (`c1`,
/// `c2`, ...).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(u64);

impl ClientId {
    /// Allocates the next client id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw counter value.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId(c{})", self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Error returned when parsing a malformed client id string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseClientIdError;

impl fmt::Display for ParseClientIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client ids have the form c<N>")
    }
}

impl std::error::Error for ParseClientIdError {}

impl FromStr for ClientId {
    type Err = ParseClientIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('c').ok_or(ParseClientIdError)?;
        digits.parse().map(Self).map_err(|_| ParseClientIdError)
    }
}
