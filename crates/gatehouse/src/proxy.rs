//! Reverse-proxy handles and their cache
//!
//! A [`ReverseProxy`] is bound to one destination URL and forwards whole
//! requests to it over a pooled HTTP client. Handles are created on first use
//! and kept for the life of the process in a [`ProxyCache`]; the route set is
//! fixed at startup, so the cache stays small.
//!
//! Forwarding rewrites:
//!
//! - scheme, host and port come from the destination
//! - the path is the destination path joined with `/`; the inbound sub-path is dropped
//! - the query is the destination query followed by the inbound query
//! - `Host` becomes the destination authority, `X-Forwarded-Host` carries the inbound `Host`
//! - the client address is appended to `X-Forwarded-For` when known
//! - hop-by-hop headers are removed in both directions

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, Response, header};
use dashmap::DashMap;
use http_body_util::LengthLimitError;
use tracing::{debug, trace};
use url::Url;

use crate::error::{GatewayError, GatewayResult};

/// Largest request body forwarded by default (10 MiB)
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Headers meaningful only for a single transport hop
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Build the HTTP client shared by every proxy handle
///
/// Redirects are relayed to the caller rather than followed, and no request
/// timeout is applied: a slow backend is a slow response.
///
/// # Errors
///
/// Returns [`GatewayError::Configuration`] if the TLS backend cannot be
/// initialised.
pub fn build_client() -> GatewayResult<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Some(std::time::Duration::from_secs(90)))
        .build()
        .map_err(|e| GatewayError::configuration(format!("Failed to create HTTP client: {e}")))
}

/// Forwarding handle bound to one destination
#[derive(Clone)]
pub struct ReverseProxy {
    destination: Url,
    client: reqwest::Client,
}

impl std::fmt::Debug for ReverseProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReverseProxy")
            .field("destination", &self.destination.as_str())
            .field("client", &"<reqwest::Client>")
            .finish()
    }
}

impl ReverseProxy {
    /// Create a handle forwarding to `destination`
    pub fn new(destination: Url, client: reqwest::Client) -> Self {
        Self {
            destination,
            client,
        }
    }

    /// Destination this handle forwards to
    pub fn destination(&self) -> &Url {
        &self.destination
    }

    /// Backend URL for a request carrying `inbound_query`
    pub fn target_url(&self, inbound_query: Option<&str>) -> Url {
        let mut url = self.destination.clone();

        if !url.path().ends_with('/') {
            let joined = format!("{}/", url.path());
            url.set_path(&joined);
        }

        let query = match (self.destination.query(), inbound_query) {
            (Some(ours), Some(theirs)) if !ours.is_empty() && !theirs.is_empty() => {
                Some(format!("{ours}&{theirs}"))
            }
            (Some(ours), _) if !ours.is_empty() => Some(ours.to_string()),
            (_, Some(theirs)) if !theirs.is_empty() => Some(theirs.to_string()),
            _ => None,
        };
        url.set_query(query.as_deref());
        url.set_fragment(None);

        url
    }

    /// Forward `request` to the destination and relay the response
    ///
    /// The request body is read fully (up to `body_limit` bytes) before
    /// forwarding; the response body is streamed back as it arrives.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::PayloadTooLarge`] if the body exceeds `body_limit`
    /// - [`GatewayError::BadRequest`] if the body stream fails for any other reason
    /// - [`GatewayError::Backend`] if the backend cannot be reached
    pub async fn forward(
        &self,
        request: Request<Body>,
        body_limit: usize,
    ) -> GatewayResult<Response<Body>> {
        let (parts, body) = request.into_parts();

        if let Some(length) = content_length(&parts.headers)
            && length > body_limit
        {
            return Err(GatewayError::PayloadTooLarge { limit: body_limit });
        }

        let client_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let inbound_host = parts
            .headers
            .get(header::HOST)
            .cloned()
            .or_else(|| {
                parts
                    .uri
                    .authority()
                    .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
            });

        let url = self.target_url(parts.uri.query());
        let headers = forwarded_headers(parts.headers, inbound_host, client_addr);

        let body = axum::body::to_bytes(body, body_limit)
            .await
            .map_err(|e| body_read_error(e, body_limit))?;

        trace!(method = %parts.method, url = %url, "Forwarding request");

        let upstream = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                GatewayError::backend_with_destination(e.to_string(), self.destination.as_str())
            })?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        debug!(
            destination = %self.destination,
            status = status.as_u16(),
            "Backend responded"
        );

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Over-limit bodies are 413; any other read failure is the client's fault
fn body_read_error(error: axum::Error, limit: usize) -> GatewayError {
    let inner = error.into_inner();
    if inner.is::<LengthLimitError>() {
        return GatewayError::PayloadTooLarge { limit };
    }
    debug!(error = %inner, "Failed to read request body");
    GatewayError::bad_request("Request body could not be read")
}

fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Request headers as sent to the backend
fn forwarded_headers(
    mut headers: HeaderMap,
    inbound_host: Option<HeaderValue>,
    client_addr: Option<SocketAddr>,
) -> HeaderMap {
    strip_hop_by_hop(&mut headers);

    // The client sets Host from the target URL and Content-Length from the body
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);

    match inbound_host {
        Some(host) => {
            headers.insert(X_FORWARDED_HOST, host);
        }
        None => {
            headers.remove(X_FORWARDED_HOST);
        }
    }

    if let Some(addr) = client_addr {
        let ip = addr.ip().to_string();
        let chain = match headers
            .get_all(X_FORWARDED_FOR)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
        {
            prior if prior.is_empty() => ip,
            prior => format!("{}, {ip}", prior.join(", ")),
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    headers
}

/// Remove hop-by-hop headers, including any named by `Connection`
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Proxy handles keyed by destination URL
///
/// Keys are the destination's serialized form; no further canonicalization
/// is applied. Entries are never evicted.
#[derive(Debug)]
pub struct ProxyCache {
    handles: DashMap<String, Arc<ReverseProxy>>,
    client: reqwest::Client,
}

impl ProxyCache {
    /// Create an empty cache whose handles share `client`
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            handles: DashMap::new(),
            client,
        }
    }

    /// Return the handle for `destination`, creating it on first use
    ///
    /// Concurrent first requests for the same destination observe the same
    /// handle.
    pub fn get_or_create(&self, destination: &Url) -> Arc<ReverseProxy> {
        let key = destination.to_string();
        if let Some(handle) = self.handles.get(&key) {
            return Arc::clone(handle.value());
        }

        let handle = self.handles.entry(key).or_insert_with(|| {
            debug!(destination = %destination, "Creating proxy handle");
            Arc::new(ReverseProxy::new(destination.clone(), self.client.clone()))
        });
        Arc::clone(handle.value())
    }

    /// Number of cached handles
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no handles have been created
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
