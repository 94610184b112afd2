//! Request identifiers.
//!
//! Every [`RequestContext`](crate::server::RequestContext) carries a
//! [`RequestId`] so log lines from matching, coercion and the handler can be
//! correlated. An id supplied by the client in `x-request-id` is kept when it
//! is a valid ULID; otherwise a fresh one is minted.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Header used to receive and echo the request id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Strongly typed request identifier backed by ULID.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(ulid::Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Reuse the client's id when it parses, otherwise generate one.
    #[must_use]
    pub fn from_header_or_new(header_value: Option<&str>) -> Self {
        header_value
            .and_then(|s| s.trim().parse::<RequestId>().ok())
            .unwrap_or_default()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ulid::Ulid::from_string(s).map(RequestId)
    }
}
