//! Request forwarding.
//!
//! Every permitted request is re-issued against the configured target with
//! the same method, headers and body, and the upstream response is relayed
//! back unchanged. Only the path and query of the inbound request are used;
//! scheme and authority always come from the target.

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::filter::PathFilter;
use futures_util::TryStreamExt;
use hyper::client::HttpConnector;
use hyper::header::HOST;
use hyper::{Body, Client, Request, Response, Uri};
use hyper_tls::HttpsConnector;
use std::borrow::Cow;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, warn};
use url::{Position, Url};

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct ProxyState {
    pub filter: PathFilter,
    pub forwarder: Forwarder,
}

impl ProxyState {
    pub fn new(filter: PathFilter, forwarder: Forwarder) -> Self {
        Self { filter, forwarder }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(
            PathFilter::new(config.allowed_path.clone()),
            Forwarder::new(config.target.clone()),
        )
    }
}

#[derive(Clone)]
pub struct Forwarder {
    target: Url,
    client: Client<HttpsConnector<HttpConnector>>,
}

impl Forwarder {
    pub fn new(target: Url) -> Self {
        Self {
            target,
            client: Client::builder().build(HttpsConnector::new()),
        }
    }

    /// Only http and https targets can be reached. Anything else fails the
    /// request the same way an unreachable upstream does.
    fn ensure_supported_scheme(&self) -> Result<(), ProxyError> {
        match self.target.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(ProxyError::Upstream(format!(
                "unsupported protocol scheme {:?}",
                scheme
            ))),
        }
    }

    /// Rebase the inbound path and query onto the target's scheme and
    /// authority. The query is carried over byte for byte.
    pub fn resolve(&self, uri: &Uri) -> Result<Uri, ProxyError> {
        let authority = &self.target[Position::BeforeUsername..Position::AfterPort];
        let path = remove_dot_segments(uri.path());
        let path_and_query = match uri.query() {
            Some(query) => format!("{}?{}", path, query),
            None => path.into_owned(),
        };

        Uri::builder()
            .scheme(self.target.scheme())
            .authority(authority)
            .path_and_query(path_and_query)
            .build()
            .map_err(|err| ProxyError::BuildRequest(err.to_string()))
    }

    /// Forward a permitted request and relay the upstream response.
    ///
    /// Local construction failures map to `BuildRequest` (500); anything that
    /// goes wrong reaching the upstream, including a target scheme the client
    /// cannot speak, maps to `Upstream` (502).
    pub async fn forward(&self, req: Request<Body>) -> Result<Response<Body>, ProxyError> {
        self.ensure_supported_scheme()?;
        let uri = self.resolve(req.uri())?;
        let (parts, body) = req.into_parts();

        debug!(method = %parts.method, target = %uri, "forwarding request");

        let mut outbound = Request::builder()
            .method(parts.method)
            .uri(uri)
            .body(body)
            .map_err(|err| ProxyError::BuildRequest(err.to_string()))?;

        // Host is derived from the target URI by the client.
        let mut headers = parts.headers;
        headers.remove(HOST);
        *outbound.headers_mut() = headers;

        let upstream = self
            .client
            .request(outbound)
            .await
            .map_err(|err| ProxyError::Upstream(err.to_string()))?;

        Ok(relay(upstream))
    }
}

/// RFC 3986 dot-segment removal on an absolute path. Percent-encoded dots
/// are left alone.
fn remove_dot_segments(path: &str) -> Cow<'_, str> {
    if path.is_empty() {
        return Cow::Borrowed("/");
    }
    if !path.starts_with('/') || !path.split('/').any(|seg| seg == "." || seg == "..") {
        return Cow::Borrowed(path);
    }

    let mut out: Vec<&str> = Vec::new();
    let mut segments = path.split('/').skip(1).peekable();
    while let Some(segment) = segments.next() {
        let last = segments.peek().is_none();
        match segment {
            "." => {}
            ".." => {
                out.pop();
            }
            other => {
                out.push(other);
                continue;
            }
        }
        if last {
            out.push("");
        }
    }
    Cow::Owned(format!("/{}", out.join("/")))
}

fn relay(upstream: Response<Body>) -> Response<Body> {
    let (parts, body) = upstream.into_parts();

    let stream = body.inspect_err(|err| warn!(error = %err, "upstream body ended early"));

    let mut response = Response::new(Body::wrap_stream(stream));
    *response.status_mut() = parts.status;
    for (name, value) in parts.headers.iter() {
        response.headers_mut().append(name, value.clone());
    }
    response
}

/// Service entry point: filter, then forward. Failures become error
/// responses here so the connection task never sees an error.
pub async fn handle(
    req: Request<Body>,
    state: Arc<ProxyState>,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let result = match state.filter.check(&path) {
        Ok(()) => state.forwarder.forward(req).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(response) => {
            debug!(
                %method,
                %path,
                status = response.status().as_u16(),
                "relayed upstream response"
            );
            Ok(response)
        }
        Err(err) => {
            warn!(%method, %path, status = err.status().as_u16(), error = %err, "request failed");
            Ok(err.into_response())
        }
    }
}
