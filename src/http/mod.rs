//! The HTTP server, handler and routes.
//!
//! This file itself contains fairly little business logic and just sets up the
//! `hyper` server and catches errors. The main logic is in `handlers.rs`.

use bytes::Bytes;
use deadpool_postgres::Pool;
use http_body_util::Full;
use hyper::{body::Incoming, service::service_fn};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
};
use std::{
    convert::Infallible,
    fs,
    future::Future,
    net::{IpAddr, SocketAddr},
    os::unix::fs::PermissionsExt,
    panic::AssertUnwindSafe,
    path::PathBuf,
    sync::Arc,
};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{api, config::Config, prelude::*};
use self::handlers::handle;


mod handlers;
pub(crate) mod response;


/// HTTP server configuration.
#[derive(Debug, Clone, confique::Config)]
pub(crate) struct HttpConfig {
    /// The TCP port the HTTP server should listen on.
    #[config(default = 8000)]
    pub(crate) port: u16,

    /// The bind address to listen on.
    #[config(default = "127.0.0.1")]
    pub(crate) address: IpAddr,

    /// Unix domain socket to listen on. Specifying this will overwrite
    /// the TCP configuration. Example: "/tmp/shopfront.socket".
    pub(crate) unix_socket: Option<PathBuf>,

    /// Unix domain socket file permissions.
    #[config(default = 0o755)]
    pub(crate) unix_socket_permissions: u32,

    /// Maximum size of a request body in bytes. Larger GraphQL requests are
    /// rejected with 413.
    #[config(default = 1_048_576)]
    pub(crate) max_body_size: usize,
}

impl HttpConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.unix_socket_permissions > 0o777 {
            bail!("'http.unix_socket_permissions' is not a valid file mode");
        }
        if self.max_body_size == 0 {
            bail!("'http.max_body_size' must not be 0");
        }
        Ok(())
    }
}


// Our responses always have a fully buffered body.
pub(crate) type Response<T = Full<Bytes>> = hyper::Response<T>;
type Request<T = Incoming> = hyper::Request<T>;


/// Context that the request handler has access to.
struct Context {
    api_root: api::RootNode,
    db_pool: Pool,
    config: Arc<Config>,
}


/// Starts the HTTP server and runs it until the process is stopped.
pub(crate) async fn serve(config: Config, api_root: api::RootNode, db: Pool) -> Result<()> {
    let http_config = config.http.clone();
    let ctx = Arc::new(Context {
        api_root,
        db_pool: db,
        config: Arc::new(config),
    });

    if let Some(unix_socket) = &http_config.unix_socket {
        if unix_socket.exists() {
            fs::remove_file(unix_socket)?;
        }
        let listener = tokio::net::UnixListener::bind(unix_socket)
            .with_context(|| format!("failed to bind to '{}'", unix_socket.display()))?;
        let permissions = fs::Permissions::from_mode(http_config.unix_socket_permissions);
        fs::set_permissions(unix_socket, permissions)?;
        info!("Listening on unix://{}", unix_socket.display());

        loop {
            match listener.accept().await {
                Ok((stream, _)) => serve_connection(stream, &ctx),
                Err(e) => warn!("Failed to accept connection: {e}"),
            }
        }
    } else {
        let addr = SocketAddr::new(http_config.address, http_config.port);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind to {addr}"))?;
        info!("Listening on http://{}", listener.local_addr()?);

        loop {
            match listener.accept().await {
                Ok((stream, _)) => serve_connection(stream, &ctx),
                Err(e) => warn!("Failed to accept connection: {e}"),
            }
        }
    }
}

/// Spawns a task that handles all requests on one connection, with HTTP/1 or
/// HTTP/2, whatever the client speaks.
fn serve_connection<S>(stream: S, ctx: &Arc<Context>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let ctx = Arc::clone(ctx);
    let service = service_fn(move |req| {
        handle_internal_errors(handle(req, Arc::clone(&ctx)))
    });

    tokio::spawn(async move {
        let builder = auto::Builder::new(TokioExecutor::new());
        if let Err(e) = builder.serve_connection(TokioIo::new(stream), service).await {
            debug!("Error serving connection: {e}");
        }
    });
}

/// Wraps another future and catches all panics that might occur when
/// polling it. That way we always answer with `500` instead of just closing
/// the connection.
async fn handle_internal_errors(
    future: impl Future<Output = Response>,
) -> Result<Response, Infallible> {
    // The `AssertUnwindSafe` is fine: the handler only has access to the
    // request-scoped transaction (which is rolled back on drop) and to
    // immutable shared state.
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(response) => Ok(response),
        Err(panic) => {
            // Most panics carry a `&str` or `String`.
            let msg = panic.downcast_ref::<String>()
                .map(|s| s.as_str())
                .or(panic.downcast_ref::<&str>().copied());

            match msg {
                Some(msg) => error!("INTERNAL SERVER ERROR: HTTP handler panicked: '{}'", msg),
                None => error!("INTERNAL SERVER ERROR: HTTP handler panicked"),
            }

            Ok(response::internal_server_error())
        }
    }
}
