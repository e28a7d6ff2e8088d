//! Shared harness: a scripted upstream and a proxy bound to ephemeral ports.

#![allow(dead_code)]

use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderValue};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use pathproxy::{server, Forwarder, PathFilter, ProxyState};
use std::convert::Infallible;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use url::Url;

/// A request as seen by the upstream.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub type Log = Arc<Mutex<Vec<Captured>>>;

pub fn ephemeral_listener() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").unwrap()
}

/// An address nothing is listening on.
pub fn closed_addr() -> SocketAddr {
    let listener = ephemeral_listener();
    listener.local_addr().unwrap()
}

/// Echo upstream: records every request, answers with the request body and a
/// few fixed headers. `/teapot` answers 418, everything else 201. `/slow`
/// holds its response until `gate` is notified.
pub fn start_gated_upstream_on(listener: TcpListener, gate: Arc<Notify>) -> (SocketAddr, Log) {
    let addr = listener.local_addr().unwrap();
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let server_log = log.clone();
    let make_svc = make_service_fn(move |_conn| {
        let log = server_log.clone();
        let gate = gate.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let log = log.clone();
                let gate = gate.clone();
                async move {
                    let (parts, body) = req.into_parts();
                    let body = hyper::body::to_bytes(body).await.unwrap_or_default();
                    log.lock().unwrap().push(Captured {
                        method: parts.method,
                        uri: parts.uri.to_string(),
                        headers: parts.headers,
                        body: body.clone(),
                    });

                    if parts.uri.path() == "/slow" {
                        gate.notified().await;
                    }

                    let status = if parts.uri.path() == "/teapot" {
                        StatusCode::IM_A_TEAPOT
                    } else {
                        StatusCode::CREATED
                    };

                    let mut response = Response::new(Body::from(body));
                    *response.status_mut() = status;
                    let headers = response.headers_mut();
                    headers.insert("x-upstream", HeaderValue::from_static("echo"));
                    headers.append("set-cookie", HeaderValue::from_static("a=1"));
                    headers.append("set-cookie", HeaderValue::from_static("b=2"));
                    Ok::<_, Infallible>(response)
                }
            }))
        }
    });

    let server = Server::from_tcp(listener).unwrap().serve(make_svc);
    tokio::spawn(server);
    (addr, log)
}

pub fn start_upstream_on(listener: TcpListener) -> (SocketAddr, Log) {
    start_gated_upstream_on(listener, Arc::new(Notify::new()))
}

pub fn start_upstream() -> (SocketAddr, Log) {
    start_upstream_on(ephemeral_listener())
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

pub fn start_proxy(target: &str, allowed: Option<&str>) -> SocketAddr {
    let forwarder = Forwarder::new(Url::parse(target).unwrap());
    let filter = PathFilter::new(allowed.map(str::to_string));
    let state = Arc::new(ProxyState::new(filter, forwarder));

    let listener = ephemeral_listener();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve(listener, state, std::future::pending()));
    addr
}

pub fn proxy_url(proxy: SocketAddr, path: &str) -> String {
    format!("http://{}{}", proxy, path)
}
