use hyper::header::{HeaderValue, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use hyper::{Body, Response, StatusCode};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop the proxy before it binds its listener.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required parameter: --target-url")]
    MissingTarget,

    #[error("Invalid target url {url:?}: {source}")]
    InvalidTarget {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to read config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Per-request failures. Each one ends the request with a plain-text error
/// response; none of them reach the server loop.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Forbidden: path {path:?} is not allowed, only {allowed:?} is permitted")]
    Forbidden { path: String, allowed: String },

    #[error("Failed to create request: {0}")]
    BuildRequest(String),

    #[error("Request to target failed: {0}")]
    Upstream(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ProxyError::BuildRequest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(format!("{}\n", self)));
        *response.status_mut() = self.status();

        let headers = response.headers_mut();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        response
    }
}
