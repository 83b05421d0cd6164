//! HTTP status server
//!
//! Exposes the read-only views of the publisher on `0.0.0.0:8087`
//! (configurable):
//!
//! - `GET /healthcheck` - latest dependency probe results as JSON
//! - `GET /recent` - the recent registry, numbered oldest first, as JSON
//! - `GET /metrics` - Prometheus text exposition format
//!
//! Handlers only read cached state; none of them touches the FTP server or
//! the broker.

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use seftpub_core::domain::{SharedHealth, SharedRegistry};
use seftpub_core::ports::IDeliveryPort;

use crate::metrics::MetricsRegistry;

/// Everything the status endpoints read from
#[derive(Clone)]
pub struct StatusState {
    pub registry: SharedRegistry,
    pub health: SharedHealth,
    pub delivery: Arc<dyn IDeliveryPort>,
    pub metrics: Arc<MetricsRegistry>,
}

/// HTTP server for the health, registry and metrics endpoints.
pub struct StatusServer {
    state: StatusState,
    addr: SocketAddr,
}

impl StatusServer {
    /// Creates a new `StatusServer`.
    ///
    /// # Arguments
    /// * `state` - Shared read models
    /// * `endpoint` - Address to bind, e.g. `"0.0.0.0:8087"`
    pub fn new(state: StatusState, endpoint: &str) -> anyhow::Result<Self> {
        let addr: SocketAddr = endpoint.parse()?;
        Ok(Self { state, addr })
    }

    /// Binds the configured address and serves until `shutdown` is cancelled.
    ///
    /// Should be spawned as a background task.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` is cancelled.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()> {
        info!(addr = %listener.local_addr()?, "Status server listening");

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, _) = result?;
                    let io = TokioIo::new(stream);
                    let state = self.state.clone();

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let state = state.clone();
                            async move { handle_request(req, &state) }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            error!(error = %e, "Status HTTP connection error");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("Status server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Handle a single HTTP request.
fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: &StatusState,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    Ok(respond(req.method(), req.uri().path(), state))
}

/// Routes a request to its read model
pub fn respond(method: &Method, path: &str, state: &StatusState) -> Response<Full<Bytes>> {
    if *method != Method::GET {
        return text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    }

    match path {
        "/healthcheck" => json(&state.health.current()),
        "/recent" => {
            let view = state
                .registry
                .status_view()
                .annotate(|handle| state.delivery.is_confirmed(handle));
            json(&view)
        }
        "/metrics" => match state.metrics.encode() {
            Ok(body) => with_content_type(
                Response::new(Full::new(Bytes::from(body))),
                "text/plain; version=0.0.4; charset=utf-8",
            ),
            Err(e) => text(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Failed to encode metrics: {e}"),
            ),
        },
        _ => text(StatusCode::NOT_FOUND, "Not Found"),
    }
}

fn json<T: Serialize>(value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => with_content_type(
            Response::new(Full::new(Bytes::from(body))),
            "application/json",
        ),
        Err(e) => text(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Failed to serialize response: {e}"),
        ),
    }
}

fn text(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    let mut response = with_content_type(
        Response::new(Full::new(Bytes::from(body.to_string()))),
        "text/plain; charset=utf-8",
    );
    *response.status_mut() = status;
    response
}

fn with_content_type(
    mut response: Response<Full<Bytes>>,
    content_type: &'static str,
) -> Response<Full<Bytes>> {
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
