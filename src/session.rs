// Session state for the portal plus the pure pieces of the login
// handshake (cookie assembly, user id extraction). Network handling
// lives in `client::core`.

use serde::{Deserialize, Serialize};

/// Marker preceding the numeric user id in the portal home page markup.
pub const USER_ID_MARKER: &str = "Compass.organisationUserId = ";

/// An authenticated portal session. Immutable once established; the
/// login flow replaces the whole value rather than patching fields.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Session {
    school_prefix: String,
    cookie: String,
    user_id: String,
}

/// Portable projection of a [`Session`] for persistence across
/// process restarts. How it is stored is up to the host application.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub school_prefix: String,
    pub cookie: String,
    pub user_id: String,
}

impl Session {
    pub(crate) fn new(school_prefix: String, cookie: String, user_id: String) -> Self {
        Self {
            school_prefix,
            cookie,
            user_id,
        }
    }

    /// Rebuilds a session from a previously exported snapshot. The
    /// snapshot is trusted as-is; no revalidation round-trip happens.
    pub fn restore(snapshot: SessionSnapshot) -> Self {
        Self {
            school_prefix: snapshot.school_prefix,
            cookie: snapshot.cookie,
            user_id: snapshot.user_id,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            school_prefix: self.school_prefix.clone(),
            cookie: self.cookie.clone(),
            user_id: self.user_id.clone(),
        }
    }

    pub fn school_prefix(&self) -> &str {
        &self.school_prefix
    }

    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// Assembles the request cookie from `Set-Cookie` header values.
///
/// Each header contributes the pair before its first `;` (the attributes
/// after it are ignored). Values containing `=` are kept whole. Headers
/// without a `=` carry no pair and are skipped. The result keeps the
/// portal's expected trailing `"; "` and is empty when nothing usable
/// was offered.
pub fn assemble_cookie<'a, I>(set_cookie_values: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut cookie = String::new();
    for header in set_cookie_values {
        let pair = header.split(';').next().unwrap_or("").trim();
        let Some((key, value)) = pair.split_once('=') else {
            log::debug!("ignoring set-cookie entry without a pair: {header:?}");
            continue;
        };
        cookie.push_str(key.trim());
        cookie.push('=');
        cookie.push_str(value.trim());
        cookie.push_str("; ");
    }
    cookie
}

/// Scans portal home page markup for the user id: the text between
/// [`USER_ID_MARKER`] and the next `;`. Returns `None` when the marker,
/// the terminator, or the id itself is missing, which is what the
/// logged-out page looks like.
pub fn extract_user_id(html: &str) -> Option<String> {
    let after = &html[html.find(USER_ID_MARKER)? + USER_ID_MARKER.len()..];
    let id = after[..after.find(';')?].trim();
    if id.is_empty() {
        return None;
    }
    Some(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_takes_first_pair_of_each_header() {
        let headers = [
            "ASP.NET_SessionId=abc123; path=/; HttpOnly",
            "cpssid_x=token99; secure",
        ];
        assert_eq!(
            assemble_cookie(headers),
            "ASP.NET_SessionId=abc123; cpssid_x=token99; "
        );
    }

    #[test]
    fn test_cookie_skips_pairless_headers() {
        let headers = ["garbage", "sid=1; HttpOnly", "alsojunk"];
        assert_eq!(assemble_cookie(headers), "sid=1; ");
    }

    #[test]
    fn test_cookie_keeps_values_containing_equals() {
        let headers = ["token=a=b=c; path=/"];
        assert_eq!(assemble_cookie(headers), "token=a=b=c; ");
    }

    #[test]
    fn test_cookie_is_empty_without_headers() {
        assert_eq!(assemble_cookie([]), "");
    }

    #[test]
    fn test_user_id_is_marker_to_semicolon() {
        let html = "var x = 1; Compass.organisationUserId = 12345; var y = 2;";
        assert_eq!(extract_user_id(html).as_deref(), Some("12345"));
    }

    #[test]
    fn test_user_id_absent_marker_or_terminator() {
        assert_eq!(extract_user_id("<html>please log in</html>"), None);
        assert_eq!(extract_user_id("Compass.organisationUserId = 12345"), None);
        assert_eq!(extract_user_id("Compass.organisationUserId = ;"), None);
    }

    #[test]
    fn test_snapshot_roundtrip_preserves_fields() {
        let session = Session::new("demo".into(), "sid=1; ".into(), "42".into());
        let restored = Session::restore(session.snapshot());
        assert_eq!(restored, session);
    }
}
