// File: src/client/core.rs
use crate::client::endpoints::Endpoints;
use crate::client::headers::{DefaultHeadersLayer, DefaultHeadersService};
use crate::error::{AuthError, Error};
use crate::session::{Session, SessionSnapshot, assemble_cookie, extract_user_id};

use http::Request;
use http_body_util::BodyExt;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use tower::ServiceExt;
use tower_layer::Layer;
use tower_service::Service;

pub const USER_AGENT: &str = concat!("compass-edu/", env!("CARGO_PKG_VERSION"));

type PortalHttp = DefaultHeadersService<
    Client<
        hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>,
        String,
    >,
>;

fn build_transport() -> Result<PortalHttp, Error> {
    let mut root_store = rustls::RootCertStore::empty();
    let result = rustls_native_certs::load_native_certs();
    root_store.add_parsable_certificates(result.certs);
    if root_store.is_empty() {
        return Err(Error::Transport(
            "no valid system certificates found".to_string(),
        ));
    }
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    let https_connector = HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_or_http()
        .enable_http1()
        .build();

    let http_client = Client::builder(TokioExecutor::new()).build(https_connector);
    Ok(DefaultHeadersLayer::new(USER_AGENT.to_string()).layer(http_client))
}

/// Client for one school's portal instance.
///
/// Construct it, [`authenticate`](Self::authenticate) (or restore a
/// snapshot), then call the `fetch_*` operations. The client is cheap to
/// clone; clones share the connection pool and the session they were
/// cloned with.
#[derive(Clone, Debug)]
pub struct CompassClient {
    http: PortalHttp,
    endpoints: Endpoints,
    school_prefix: String,
    session: Option<Session>,
}

impl CompassClient {
    /// Unauthenticated client for `https://{school_prefix}.compass.education`.
    pub fn new(school_prefix: &str) -> Result<Self, Error> {
        Ok(Self {
            http: build_transport()?,
            endpoints: Endpoints::for_school(school_prefix),
            school_prefix: school_prefix.to_string(),
            session: None,
        })
    }

    /// Like [`Self::new`] but rooted at an arbitrary base URL, so tests
    /// can point the client at a local server.
    pub fn with_base_url(school_prefix: &str, base: &str) -> Result<Self, Error> {
        Ok(Self {
            http: build_transport()?,
            endpoints: Endpoints::with_base(base),
            school_prefix: school_prefix.to_string(),
            session: None,
        })
    }

    /// Client restored into the authenticated state from a snapshot.
    /// The snapshot is trusted; if it expired upstream, calls will fail
    /// with whatever the portal answers for dead sessions.
    pub fn from_snapshot(snapshot: SessionSnapshot) -> Result<Self, Error> {
        let mut client = Self::new(&snapshot.school_prefix)?;
        client.session = Some(Session::restore(snapshot));
        Ok(client)
    }

    /// Snapshot restore against an arbitrary base URL.
    pub fn from_snapshot_with_base(snapshot: SessionSnapshot, base: &str) -> Result<Self, Error> {
        let mut client = Self::with_base_url(&snapshot.school_prefix, base)?;
        client.session = Some(Session::restore(snapshot));
        Ok(client)
    }

    pub fn school_prefix(&self) -> &str {
        &self.school_prefix
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Exports the session for persistence.
    pub fn snapshot(&self) -> Result<SessionSnapshot, Error> {
        Ok(self.require_session()?.snapshot())
    }

    pub(crate) fn require_session(&self) -> Result<&Session, Error> {
        self.session.as_ref().ok_or(Error::NotAuthenticated)
    }

    pub(crate) fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    // --- LOGIN HANDSHAKE ---

    /// Performs the two-step form login.
    ///
    /// Step one posts the credentials and mines the `Set-Cookie` headers
    /// of the (redirecting) response. Step two fetches the portal home
    /// page with that cookie and scans the markup for the user id
    /// marker. Only when both steps succeed does the client hold a
    /// session; bad credentials surface as [`AuthError::UserIdNotFound`]
    /// because the portal just serves the logged-out page again.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<(), AuthError> {
        let form = form_urlencode(&[
            ("username", username),
            ("password", password),
            ("__EVENTTARGET", "button1"),
        ]);
        log::debug!("logging in to {}", self.endpoints.base());
        let request = Request::builder()
            .method("POST")
            .uri(self.endpoints.login())
            .header(
                http::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(form)
            .map_err(|e| AuthError::Network(e.to_string()))?;
        let (parts, _) = self.send(request).await.map_err(AuthError::Network)?;

        let cookie = assemble_cookie(
            parts
                .headers
                .get_all(http::header::SET_COOKIE)
                .iter()
                .filter_map(|value| value.to_str().ok()),
        );
        if cookie.is_empty() {
            log::debug!("login response set no usable cookie");
        }

        let mut builder = Request::builder().method("GET").uri(self.endpoints.base());
        if !cookie.is_empty() {
            match http::HeaderValue::from_str(&cookie) {
                Ok(value) => builder = builder.header(http::header::COOKIE, value),
                Err(_) => log::debug!("assembled cookie is not a valid header value, sending none"),
            }
        }
        let request = builder
            .body(String::new())
            .map_err(|e| AuthError::Network(e.to_string()))?;
        let (_, body) = self.send(request).await.map_err(AuthError::Network)?;

        let html = String::from_utf8_lossy(&body);
        let user_id = extract_user_id(&html).ok_or(AuthError::UserIdNotFound)?;
        if cookie.is_empty() {
            // A user id without a cookie cannot authenticate anything.
            return Err(AuthError::NoSessionCookie);
        }
        log::debug!("authenticated as user id {user_id}");
        self.session = Some(Session::new(self.school_prefix.clone(), cookie, user_id));
        Ok(())
    }

    // --- TRANSPORT ---

    pub(crate) async fn send(
        &self,
        request: Request<String>,
    ) -> Result<(http::response::Parts, Vec<u8>), String> {
        let method = request.method().clone();
        let uri = request.uri().clone();
        let mut service = self.http.clone();
        let response = service
            .ready()
            .await
            .map_err(|e| format!("{e}"))?
            .call(request)
            .await
            .map_err(|e| format!("{e}"))?;
        let (parts, body) = response.into_parts();
        let bytes = body.collect().await.map_err(|e| format!("{e}"))?.to_bytes();
        log::debug!("{method} {uri} -> {} ({} bytes)", parts.status, bytes.len());
        Ok((parts, bytes.to_vec()))
    }

    /// One service round-trip: POST the JSON body with the session
    /// cookie, demand a success status, decode the enveloped response.
    pub(crate) async fn post_service<T: DeserializeOwned>(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<T, Error> {
        let session = self.require_session()?;
        let cookie = http::HeaderValue::from_str(session.cookie()).map_err(|_| {
            Error::Transport("session cookie is not a valid header value".to_string())
        })?;
        log::trace!("POST {url} body {body}");
        let request = Request::builder()
            .method("POST")
            .uri(url)
            .header(http::header::CONTENT_TYPE, "application/json")
            .header(http::header::COOKIE, cookie)
            .body(body.to_string())
            .map_err(|e| Error::Transport(e.to_string()))?;
        let (parts, bytes) = self.send(request).await.map_err(Error::Transport)?;
        if !parts.status.is_success() {
            return Err(Error::UpstreamRequestFailed {
                status: parts.status,
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Authenticated GET returning the raw body, for non-JSON assets.
    pub(crate) async fn get_raw(&self, url: &str) -> Result<(http::StatusCode, Vec<u8>), Error> {
        let session = self.require_session()?;
        let cookie = http::HeaderValue::from_str(session.cookie()).map_err(|_| {
            Error::Transport("session cookie is not a valid header value".to_string())
        })?;
        let request = Request::builder()
            .method("GET")
            .uri(url)
            .header(http::header::COOKIE, cookie)
            .body(String::new())
            .map_err(|e| Error::Transport(e.to_string()))?;
        let (parts, bytes) = self.send(request).await.map_err(Error::Transport)?;
        Ok((parts.status, bytes))
    }
}

// --- FORM ENCODING ---

/// Percent-encodes a login form the way browsers serialize it
/// (application/x-www-form-urlencoded, spaces as `+`).
fn form_urlencode(pairs: &[(&str, &str)]) -> String {
    let mut out = String::new();
    for (i, (key, value)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push('&');
        }
        push_form_component(&mut out, key);
        out.push('=');
        push_form_component(&mut out, value);
    }
    out
}

fn push_form_component(out: &mut String, raw: &str) {
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
}
