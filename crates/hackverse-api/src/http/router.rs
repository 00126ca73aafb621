//! Router construction and server host for the API.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Router,
    http::{
        Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::{get, post},
};
use hackverse_telemetry::{build_sha, propagate_request_id_layer, set_request_id_layer};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{Span, info};

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::auth::require_bearer;
use crate::http::compare::compare;
use crate::http::constants::REQUEST_ID_HEADER;
use crate::http::health::{health, metrics};
use crate::http::telemetry::record_http_metrics;
use crate::state::ApiState;

/// Axum router wrapper that hosts the similarity endpoints.
#[derive(Debug)]
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Build the router with every middleware layer attached.
    #[must_use]
    pub fn new(state: ApiState) -> Self {
        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE]);
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(trace_layer)
            .layer(middleware::from_fn_with_state(
                state.metrics.clone(),
                record_http_metrics,
            ));

        let require_auth = middleware::from_fn_with_state(state.clone(), require_bearer);
        let router = Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .route("/compare", post(compare).route_layer(require_auth))
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state);

        Self { router }
    }

    /// The fully layered router, for embedding or in-process requests.
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve on `addr` until the process receives Ctrl-C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Bind`] when the listener cannot be bound and
    /// [`ApiServerError::Serve`] when the server loop fails.
    pub async fn serve(self, addr: SocketAddr) -> ApiServerResult<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        self.serve_on(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Serve`] when the server loop fails.
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> ApiServerResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        if let Ok(local) = listener.local_addr() {
            info!(addr = %local, "similarity api listening");
        }
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for sigterm");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
