//! serving
//!
//! Development HTTP server.
//!
//! # Overview
//!
//! [`run_simple`] serves a [`Handler`] over HTTP through axum. Requests
//! are collected into a [`Request`] (bodies above [`MAX_BODY_BYTES`] get a
//! 413) and answered by the handler. It is meant for local development,
//! not production traffic.
//!
//! # Modes
//!
//! - threaded: multi-thread runtime, the handler runs on the blocking pool
//! - single: current-thread runtime, the handler runs inline so requests
//!   are answered one at a time
//! - debugger: handler errors and panics are rendered into the 500 body
//! - reloader: see [`reloader`]
//!
//! The server stops on Ctrl-C.

pub mod reloader;

use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::Router;
use tokio::net::TcpListener;

use crate::http::{Handler, Request, Response};

/// Set in the environment of the server process spawned by the reloader.
pub const RUN_MAIN_ENV: &str = "FLASK_RUN_MAIN";

/// Largest request body the server accepts.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// How to serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeOptions {
    pub host: String,
    pub port: u16,
    pub use_reloader: bool,
    pub use_debugger: bool,
    pub threaded: bool,
    /// Directories the reloader watches.
    pub reloader_paths: Vec<PathBuf>,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            use_reloader: false,
            use_debugger: false,
            threaded: false,
            reloader_paths: Vec::new(),
        }
    }
}

/// Whether this process is the server child of a reloader.
pub fn is_running_from_reloader() -> bool {
    std::env::var(RUN_MAIN_ENV).is_ok_and(|v| v == "true")
}

/// Serve `handler` until Ctrl-C.
///
/// With the reloader enabled, the calling process becomes the watcher and
/// the actual server runs in a child process.
pub fn run_simple(options: &ServeOptions, handler: Arc<dyn Handler>) -> Result<()> {
    if options.use_reloader && !is_running_from_reloader() {
        return reloader::run_with_reloader(&options.reloader_paths);
    }

    let runtime = if options.threaded {
        tokio::runtime::Builder::new_multi_thread().enable_all().build()
    } else {
        tokio::runtime::Builder::new_current_thread().enable_all().build()
    }
    .context("failed to start server runtime")?;

    runtime.block_on(bind_and_serve(options, handler))
}

async fn bind_and_serve(options: &ServeOptions, handler: Arc<dyn Handler>) -> Result<()> {
    let listener = TcpListener::bind((options.host.as_str(), options.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", options.host, options.port))?;
    let addr = listener.local_addr()?;
    println!(" * Running on http://{addr}/ (Press CTRL+C to quit)");
    tracing::info!(%addr, threaded = options.threaded, debugger = options.use_debugger, "serving");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    serve(listener, handler, options, shutdown).await
}

/// Serve requests on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    handler: Arc<dyn Handler>,
    options: &ServeOptions,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = ServerState {
        handler,
        use_debugger: options.use_debugger,
        threaded: options.threaded,
    };
    let app = Router::new().fallback(respond).with_state(state);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("shutting down");
        })
        .await
        .context("server failed")
}

#[derive(Clone)]
struct ServerState {
    handler: Arc<dyn Handler>,
    use_debugger: bool,
    threaded: bool,
}

async fn respond(
    State(state): State<ServerState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: axum::extract::Request,
) -> axum::response::Response {
    let request = match into_request(request).await {
        Ok(request) => request,
        Err(rejection) => {
            tracing::warn!(%peer, status = rejection.status, "request rejected");
            return into_response(rejection);
        }
    };
    let method = request.method.clone();
    let path = request.path.clone();

    let response = if state.threaded {
        let handler = Arc::clone(&state.handler);
        let use_debugger = state.use_debugger;
        match tokio::task::spawn_blocking(move || dispatch(&*handler, &request, use_debugger)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(%peer, error = %e, "request worker failed");
                Response::internal_server_error()
            }
        }
    } else {
        dispatch(&*state.handler, &request, state.use_debugger)
    };

    tracing::info!(%peer, %method, %path, status = response.status, "request");
    into_response(response)
}

/// Collect an incoming request, refusing bodies over [`MAX_BODY_BYTES`].
async fn into_request(request: axum::extract::Request) -> std::result::Result<Request, Response> {
    let (parts, body) = request.into_parts();

    let declared = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > MAX_BODY_BYTES as u64) {
        return Err(Response::text(413, "Payload Too Large"));
    }
    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| Response::text(413, "Payload Too Large"))?;

    let target = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path(), |pq| pq.as_str());
    let mut converted = Request::new(parts.method.as_str(), target);
    converted.headers = parts
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    converted.body = body.to_vec();
    Ok(converted)
}

fn into_response(response: Response) -> axum::response::Response {
    let mut out = axum::response::Response::new(Body::from(response.body));
    *out.status_mut() =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    for (name, value) in response.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                out.headers_mut().append(name, value);
            }
            _ => tracing::warn!(header = %name, "dropping invalid response header"),
        }
    }
    out
}

/// Call `handler`, turning errors and panics into 500 responses.
pub fn dispatch(handler: &dyn Handler, request: &Request, use_debugger: bool) -> Response {
    let detail = match panic::catch_unwind(AssertUnwindSafe(|| handler.call(request))) {
        Ok(Ok(response)) => return response,
        Ok(Err(err)) => format!("{err:#}"),
        Err(payload) => format!("panic: {}", panic_message(payload.as_ref())),
    };

    tracing::error!(method = %request.method, path = %request.path, error = %detail, "request failed");
    if use_debugger {
        Response::text(500, format!("Internal Server Error\n\n{detail}\n"))
    } else {
        Response::internal_server_error()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
