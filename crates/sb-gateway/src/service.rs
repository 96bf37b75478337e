//! Bridge HTTP service - the host-facing surface of the gateway.
//!
//! Binds the listener, serves the endpoint table and runs the maintenance
//! tick until shut down.

use crate::domain::config::BridgeConfig;
use crate::domain::endpoints::GatewayEndpoint;
use crate::domain::error::GatewayError;
use crate::domain::gateway::{maintenance_task, ConnectionGateway};
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post, MethodRouter},
    Json, Router,
};
use shared_wire::{Ack, HealthSnapshot, PollResponse, ResponseEnvelope, StatusSnapshot};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
struct AppState {
    gateway: Arc<ConnectionGateway>,
}

/// Bridge service state
pub struct BridgeService {
    config: BridgeConfig,
    gateway: Arc<ConnectionGateway>,
    local_addr: Option<SocketAddr>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
    maintenance: Option<JoinHandle<()>>,
}

impl BridgeService {
    /// Create a service with its own gateway
    pub fn new(config: BridgeConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        let gateway = Arc::new(ConnectionGateway::new(&config));
        Ok(Self::with_gateway(config, gateway))
    }

    /// Serve an existing gateway
    pub fn with_gateway(config: BridgeConfig, gateway: Arc<ConnectionGateway>) -> Self {
        Self {
            config,
            gateway,
            local_addr: None,
            shutdown_tx: None,
            server: None,
            maintenance: None,
        }
    }

    pub fn gateway(&self) -> &Arc<ConnectionGateway> {
        &self.gateway
    }

    /// Address actually bound, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Start on the configured address
    pub async fn start(&mut self) -> Result<SocketAddr, GatewayError> {
        self.start_on(self.config.http_addr()).await
    }

    /// Bind `addr`, spawn the server and the maintenance tick, and return the
    /// bound address. Does not wait for shutdown.
    pub async fn start_on(&mut self, addr: SocketAddr) -> Result<SocketAddr, GatewayError> {
        if self.server.is_some() {
            return Err(GatewayError::Internal("service already started".into()));
        }

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| GatewayError::Bind(e.to_string()))?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let router = build_router(Arc::clone(&self.gateway), self.config.server.max_body_bytes);

        info!(addr = %local_addr, "Starting bridge HTTP server");
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "Bridge HTTP server error");
            }
        });

        let maintenance = tokio::spawn(maintenance_task(
            Arc::clone(&self.gateway),
            self.config.timeouts.sweep_interval,
        ));

        self.local_addr = Some(local_addr);
        self.shutdown_tx = Some(shutdown_tx);
        self.server = Some(server);
        self.maintenance = Some(maintenance);
        Ok(local_addr)
    }

    /// Trigger graceful shutdown and wait for the server to stop.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(maintenance) = self.maintenance.take() {
            maintenance.abort();
        }
        if let Some(server) = self.server.take() {
            if let Err(e) = server.await {
                error!(error = %e, "Bridge HTTP server task failed");
            }
        }
        // Nobody is left to answer.
        self.gateway.correlator().disconnect_all();
        info!(addr = ?self.local_addr, "Bridge HTTP server stopped");
    }
}

/// Router over the fixed endpoint table. Anything else is a typed 404.
pub fn build_router(gateway: Arc<ConnectionGateway>, max_body_bytes: usize) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(max_body_bytes));

    GatewayEndpoint::ALL
        .into_iter()
        .fold(Router::new(), |router, endpoint| {
            router.route(endpoint.path(), handler_for(endpoint))
        })
        .fallback(unknown_endpoint)
        .layer(middleware)
        .with_state(AppState { gateway })
}

fn handler_for(endpoint: GatewayEndpoint) -> MethodRouter<AppState> {
    match endpoint {
        GatewayEndpoint::Health => get(health),
        GatewayEndpoint::Status => get(status),
        GatewayEndpoint::Ready => post(ready),
        GatewayEndpoint::Disconnect => post(disconnect),
        GatewayEndpoint::Poll => get(poll),
        GatewayEndpoint::Response => post(response),
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthSnapshot> {
    Json(state.gateway.health())
}

async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.gateway.status())
}

/// Body (`{pluginReady, timestamp}`) is not inspected.
async fn ready(State(state): State<AppState>) -> Json<Ack> {
    state.gateway.ready();
    Json(Ack::ok())
}

async fn disconnect(State(state): State<AppState>) -> Json<Ack> {
    state.gateway.disconnect();
    Json(Ack::ok())
}

async fn poll(State(state): State<AppState>) -> (StatusCode, Json<PollResponse>) {
    let reply = state.gateway.poll();
    let code = if reply.caller_online {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(reply.body))
}

async fn response(
    State(state): State<AppState>,
    Json(envelope): Json<ResponseEnvelope>,
) -> Json<Ack> {
    state.gateway.respond(envelope);
    Json(Ack::ok())
}

async fn unknown_endpoint(uri: Uri) -> GatewayError {
    GatewayError::UnknownEndpoint(uri.path().to_string())
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let code = match &self {
            GatewayError::UnknownEndpoint(_) => StatusCode::NOT_FOUND,
            GatewayError::Config(_) | GatewayError::Bind(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let mut body = serde_json::json!({ "error": self.to_string() });
        if let GatewayError::UnknownEndpoint(path) = &self {
            body["path"] = serde_json::Value::String(path.clone());
        }
        (code, Json(body)).into_response()
    }
}
