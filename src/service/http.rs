//! HTTP service instance managed by the supervisor.
//!
//! # Responsibilities
//! - Create Axum Router with the configured static routes
//! - Wire up middleware (tracing, timeouts, body limits, request ID)
//! - Bind the listener on start
//! - Drain in-flight requests when the instance token is cancelled
//!
//! # Design Decisions
//! - Router is built in `create`, so bad routes fail before anything binds
//! - Binding happens in `start`, so a replaced instance has released its
//!   port before the next one binds
//! - `stop` waits for the serve task; it is bounded by the shutdown watchdog

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Request, StatusCode},
    response::IntoResponse,
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::config::schema::{RouteConfig, ServiceConfig};
use crate::config::validation::HEALTH_PATH;
use crate::service::{Service, ServiceFactory, StartupError};

/// Generates a UUID v4 `x-request-id` for requests that carry none.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Factory producing [`HttpService`] instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpServiceFactory;

impl ServiceFactory for HttpServiceFactory {
    type Config = ServiceConfig;
    type Service = HttpService;

    fn create(
        &self,
        config: ServiceConfig,
        token: CancellationToken,
    ) -> Result<HttpService, StartupError> {
        HttpService::new(config, token)
    }
}

/// A static-response HTTP server bound to one configuration.
pub struct HttpService {
    bind_address: String,
    router: Option<Router>,
    token: CancellationToken,
    local_addr: Option<SocketAddr>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl HttpService {
    /// Build the router for `config`; nothing is bound yet.
    pub fn new(config: ServiceConfig, token: CancellationToken) -> Result<Self, StartupError> {
        let router = build_router(&config)?;
        Ok(Self {
            bind_address: config.listener.bind_address,
            router: Some(router),
            token,
            local_addr: None,
            task: None,
        })
    }

    /// Address the listener is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Service for HttpService {
    async fn start(&mut self) -> Result<(), StartupError> {
        let router = self
            .router
            .take()
            .ok_or_else(|| StartupError::Start("service already started".to_string()))?;

        let bind_error = |source| StartupError::Bind {
            address: self.bind_address.clone(),
            source,
        };
        let listener = TcpListener::bind(&self.bind_address)
            .await
            .map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        tracing::info!(address = %local_addr, "HTTP service listening");

        let shutdown = self.token.clone().cancelled_owned();
        self.task = Some(tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
        }));
        self.local_addr = Some(local_addr);
        Ok(())
    }

    async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        match task.await {
            Ok(Ok(())) => tracing::info!(address = ?self.local_addr, "HTTP service stopped"),
            Ok(Err(e)) => tracing::error!(error = %e, "HTTP service exited with error"),
            Err(e) => tracing::error!(error = %e, "HTTP service task failed"),
        }
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
fn build_router(config: &ServiceConfig) -> Result<Router, StartupError> {
    let mut router = Router::new().route(HEALTH_PATH, get(|| async { "ok" }));

    for route in &config.routes {
        let response = StaticResponse::try_from(route)?;
        router = router.route(
            &route.path,
            any(move || {
                let response = response.clone();
                async move { response.into_response() }
            }),
        );
    }

    Ok(router
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(UuidRequestId)))
}

#[derive(Debug, Clone)]
struct StaticResponse {
    status: StatusCode,
    content_type: HeaderValue,
    body: String,
}

impl TryFrom<&RouteConfig> for StaticResponse {
    type Error = StartupError;

    fn try_from(route: &RouteConfig) -> Result<Self, Self::Error> {
        let status = StatusCode::from_u16(route.status).map_err(|e| {
            StartupError::Create(format!("route {}: {}", route.path, e))
        })?;
        let content_type = HeaderValue::from_str(&route.content_type).map_err(|e| {
            StartupError::Create(format!("route {}: content type: {}", route.path, e))
        })?;
        Ok(Self {
            status,
            content_type,
            body: route.body.clone(),
        })
    }
}

impl IntoResponse for StaticResponse {
    fn into_response(self) -> axum::response::Response {
        (
            self.status,
            [(header::CONTENT_TYPE, self.content_type)],
            self.body,
        )
            .into_response()
    }
}
