use crate::proxy::{self, ProxyState};
use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use std::convert::Infallible;
use std::future::Future;
use std::net::TcpListener;
use std::sync::Arc;
use tracing::info;

/// Serve proxied requests on `listener` until `shutdown` resolves, then
/// drain in-flight requests.
///
/// Each connection is driven on its own task by hyper; the only state shared
/// between them is the read-only `ProxyState`.
pub async fn serve<F>(
    listener: TcpListener,
    state: Arc<ProxyState>,
    shutdown: F,
) -> Result<(), hyper::Error>
where
    F: Future<Output = ()>,
{
    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| proxy::handle(req, state.clone())))
        }
    });

    let server = Server::from_tcp(listener)?.serve(make_svc);
    info!(addr = %server.local_addr(), "proxy accepting connections");

    server.with_graceful_shutdown(shutdown).await
}
