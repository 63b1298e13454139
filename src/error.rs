// Error types shared across the crate.

use http::StatusCode;
use thiserror::Error;

/// Failures of the login handshake.
///
/// Bad credentials and portal-side markup changes are indistinguishable from
/// the outside: both end the handshake without a user id marker and surface
/// as [`AuthError::UserIdNotFound`].
#[derive(Debug, Error)]
pub enum AuthError {
    /// A handshake request could not be sent or its response not read.
    #[error("login request failed: {0}")]
    Network(String),

    /// The portal accepted our requests but never exposed the user id
    /// marker, i.e. we are still looking at the logged-out page.
    #[error("could not locate the user id marker in the portal home page")]
    UserIdNotFound,

    /// The home page carried a user id but the login response set no
    /// session cookie, so the id cannot belong to an authenticated session.
    #[error("login response did not establish a session cookie")]
    NoSessionCookie,
}

/// Failures of authenticated portal calls.
#[derive(Debug, Error)]
pub enum Error {
    /// The client holds no session. Raised before any I/O is attempted.
    #[error("not authenticated against the portal")]
    NotAuthenticated,

    /// The request never produced a usable response (connect, TLS, body
    /// read, ...).
    #[error("portal request failed: {0}")]
    Transport(String),

    /// The portal answered with a non-success HTTP status.
    #[error("portal returned HTTP {status}")]
    UpstreamRequestFailed { status: StatusCode },

    /// The response body was not the JSON shape this service emits.
    #[error("malformed portal payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// A field the mapping requires was absent.
    #[error("portal payload is missing required field `{0}`")]
    MissingField(&'static str),

    /// A required field was present but held a value the mapping cannot
    /// read, usually a sign the portal changed its wire format.
    #[error("portal payload field `{field}` holds unreadable value {value:?}")]
    UnreadableField { field: &'static str, value: String },
}
