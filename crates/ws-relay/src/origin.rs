use http::header::{HeaderMap, ORIGIN};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq)]
pub enum OriginRejection {
    #[error("request carries no Origin header")]
    Missing,
    #[error("origin '{origin}' does not match the expected origin")]
    Mismatch { origin: String },
}

/// Validate the `Origin` header of an upgrade request against the
/// configured expected origin.
///
/// - With no configured origin the proxy is permissive: any origin (or
///   none) is accepted, and the decision is logged.
/// - With a configured origin, the request must carry an `Origin` header
///   whose first value equals it exactly.
pub fn check_origin(
    headers: &HeaderMap,
    expected: Option<&str>,
) -> Result<(), OriginRejection> {
    let Some(expected) = expected else {
        warn!(
            origin = headers
                .get(ORIGIN)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("<none>"),
            "no expected origin configured; allowing upgrade"
        );
        return Ok(());
    };

    let Some(first) = headers.get_all(ORIGIN).iter().next() else {
        return Err(OriginRejection::Missing);
    };

    let origin = first.to_str().unwrap_or_default();
    if origin == expected {
        Ok(())
    } else {
        Err(OriginRejection::Mismatch {
            origin: origin.to_string(),
        })
    }
}
