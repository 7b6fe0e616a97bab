//! REST forwarding toward the API server.

use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use serde_json::{Map, Value};
use tracing::{error, warn};

use list_filter::{filter, FilterQuery};
use ws_relay::{strip_denylisted, ProxyEndpoint, TlsTrustPolicy};

/// Build the shared backend client: redirects are returned to the caller
/// as-is rather than chased, and the certificate trust mode matches the
/// relay's dialer.
pub fn build_client(trust: TlsTrustPolicy) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());
    if trust.skips_verification() {
        builder = builder.danger_accept_invalid_certs(true);
    }
    builder.build()
}

/// Forward one REST request to the backend and pipe the response back,
/// filtered when the request carried query predicates.
///
/// Degrades instead of failing: an unreachable backend yields a 502 with
/// an empty JSON object, and an unreadable or non-JSON body yields an
/// empty object under the backend's own status code. The backend's status
/// is mirrored to the client in every case where one exists.
pub async fn forward(
    client: &reqwest::Client,
    endpoint: &ProxyEndpoint,
    method: Method,
    path_and_query: &str,
    mut headers: HeaderMap,
    body: Bytes,
) -> Response {
    strip_denylisted(&mut headers);
    // The client derives Host from the rewritten URL.
    headers.remove(header::HOST);

    match &endpoint.origin {
        Some(origin) => match HeaderValue::from_str(origin) {
            Ok(value) => {
                headers.insert(header::ORIGIN, value);
            }
            Err(_) => {
                headers.remove(header::ORIGIN);
            }
        },
        None => {
            headers.remove(header::ORIGIN);
        }
    }
    headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("*"));

    let query = filter_query(path_and_query);
    let url = endpoint.http_url(path_and_query);

    let response = match client
        .request(method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            error!(target = %url, %err, "failed to reach backend");
            return (StatusCode::BAD_GATEWAY, Json(Value::Object(Map::new())))
                .into_response();
        }
    };

    let status = response.status();
    let raw_body = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(target = %url, %err, "failed to read backend response body");
            Bytes::new()
        }
    };

    let payload = if query.is_empty() {
        match serde_json::from_slice::<Value>(&raw_body) {
            Ok(value) => value,
            Err(err) => {
                warn!(target = %url, %err, "backend response body is not JSON");
                Value::Object(Map::new())
            }
        }
    } else {
        filter(&raw_body, &query)
    };

    (status, Json(payload)).into_response()
}

/// Decode the request's query string into filter predicates.
fn filter_query(path_and_query: &str) -> FilterQuery {
    let Some((_, raw_query)) = path_and_query.split_once('?') else {
        return FilterQuery::default();
    };
    FilterQuery::from_pairs(
        url::form_urlencoded::parse(raw_query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_query_string_means_empty_predicates() {
        assert!(filter_query("/apis/batch/v1/jobs").is_empty());
        assert!(filter_query("/apis/batch/v1/jobs?").is_empty());
    }

    #[test]
    fn query_pairs_are_decoded() {
        let query = filter_query("/apis/x?status=run%2Cstop&labels=env%3Dprod");
        assert!(!query.is_empty());

        // Decoded pairs drive the filter exactly as the engine expects.
        let body = br#"{"items": [
            {"status": "Running", "labels": {"env": "prod"}},
            {"status": "Paused", "labels": {"env": "prod"}}
        ]}"#;
        let out = filter(body, &query);
        assert_eq!(out["items"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn repeated_keys_collect_multiple_values() {
        let query = filter_query("/apis/x?name=a&name=b");
        let body = br#"{"items": [{"name": "a"}, {"name": "b"}]}"#;
        // Values AND together, so no single item can satisfy both.
        let out = filter(body, &query);
        assert!(out["items"].as_array().unwrap().is_empty());
    }
}
