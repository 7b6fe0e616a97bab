//! Outbound header construction for proxied WebSocket dials.

use http::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION, COOKIE, UPGRADE};
use thiserror::Error;

use crate::subprotocol::{self, GROUP_PREFIX, USER_PREFIX};

const SEC_WEBSOCKET_PROTOCOL: HeaderName =
    HeaderName::from_static("sec-websocket-protocol");
const IMPERSONATE_USER: HeaderName = HeaderName::from_static("impersonate-user");
const IMPERSONATE_GROUP: HeaderName = HeaderName::from_static("impersonate-group");

/// Group added alongside any impersonated group so that requests every
/// authenticated user may make (self subject access reviews and the like)
/// still pass authorization.
const AUTHENTICATED_GROUP: &str = "system:authenticated";

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("error decoding {prefix} subprotocol: {source}")]
    BadImpersonationToken {
        prefix: &'static str,
        #[source]
        source: subprotocol::DecodeError,
    },
    #[error("decoded {prefix} identity is not a legal header value")]
    IllegalIdentity { prefix: &'static str },
}

/// The outbound header set for a backend dial, together with the
/// subprotocol the client upgrade must be answered with.
#[derive(Debug)]
pub struct Translation {
    pub headers: HeaderMap,
    /// The token to offer back to the client. When several tokens were
    /// supplied, the last one processed wins.
    pub subprotocol: Option<String>,
}

/// Remove headers that must never reach the backend through the proxy's
/// identity, whichever path the request takes.
pub fn strip_denylisted(headers: &mut HeaderMap) {
    headers.remove(COOKIE);
    headers.remove(HeaderName::from_static("x-csrftoken"));
}

/// Build the header set for a proxied WebSocket dial.
///
/// Every inbound header is copied verbatim except `Sec-WebSocket-Protocol`,
/// whose comma-separated tokens are classified individually:
/// `Impersonate-User.<payload>` and `Impersonate-Group.<payload>` decode
/// into impersonation headers; anything else is an ordinary application
/// subprotocol and is forwarded as-is (the backend performs its own
/// subprotocol handling). Handshake-only headers are stripped afterwards;
/// the dialer regenerates them for its own handshake.
pub fn translate(inbound: &HeaderMap) -> Result<Translation, TranslateError> {
    let mut headers = HeaderMap::with_capacity(inbound.len());
    let mut negotiated: Option<String> = None;

    for (name, value) in inbound.iter() {
        if name != &SEC_WEBSOCKET_PROTOCOL {
            headers.append(name.clone(), value.clone());
            continue;
        }

        let Ok(tokens) = value.to_str() else {
            // Subprotocol tokens are ASCII by construction; anything else
            // cannot name a protocol we understand.
            continue;
        };

        for token in tokens.split(',').map(str::trim) {
            if let Some(payload) = token.strip_prefix(USER_PREFIX) {
                let user = decode_identity(payload, USER_PREFIX)?;
                headers.insert(IMPERSONATE_USER, user);
            } else if let Some(payload) = token.strip_prefix(GROUP_PREFIX) {
                // Group identity also establishes the user field, matching
                // the representation the backend expects from the proxy.
                let group = decode_identity(payload, GROUP_PREFIX)?;
                headers.insert(IMPERSONATE_USER, group.clone());
                headers.insert(IMPERSONATE_GROUP, group);
            } else if let Ok(protocol) = HeaderValue::from_str(token) {
                headers.insert(SEC_WEBSOCKET_PROTOCOL, protocol);
            }
            negotiated = Some(token.to_string());
        }
    }

    // Handshake-only headers are not forwarded; the subprotocol header
    // stays because the backend needs it for its own negotiation.
    for name in [
        CONNECTION,
        HeaderName::from_static("sec-websocket-extensions"),
        HeaderName::from_static("sec-websocket-key"),
        HeaderName::from_static("sec-websocket-version"),
        UPGRADE,
    ] {
        headers.remove(name);
    }

    if headers.contains_key(&IMPERSONATE_GROUP) {
        headers.append(
            IMPERSONATE_GROUP,
            HeaderValue::from_static(AUTHENTICATED_GROUP),
        );
    }

    Ok(Translation {
        headers,
        subprotocol: negotiated,
    })
}

fn decode_identity(
    payload: &str,
    prefix: &'static str,
) -> Result<HeaderValue, TranslateError> {
    let identity = subprotocol::decode(payload)
        .map_err(|source| TranslateError::BadImpersonationToken { prefix, source })?;
    HeaderValue::from_str(&identity)
        .map_err(|_| TranslateError::IllegalIdentity { prefix })
}
