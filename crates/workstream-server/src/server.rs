use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::FromRef,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use workstream_notifications::{
    InMemoryDirectory, InMemoryNotificationStore, NotificationHub, NotificationService,
};

use crate::auth::{AuthState, StaticTokenResolver};
use crate::{config::AppConfig, handlers};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<NotificationService>,
    pub auth: AuthState,
    /// Interval between SSE keep-alive comments
    pub keep_alive: Duration,
}

impl AppState {
    /// In-memory storage seeded from `directory`, hub tuned from `notifications`
    /// and the static token table from `auth`.
    pub fn from_config(cfg: &AppConfig) -> Self {
        let seed = cfg.directory.clone();
        let directory = InMemoryDirectory::with_seed(
            seed.employees,
            seed.projects.into_iter().map(Into::into),
            seed.tasks.into_iter().map(Into::into),
        );
        let hub = NotificationHub::new_shared(cfg.hub_config());
        let service = NotificationService::new(
            Arc::new(directory),
            Arc::new(InMemoryNotificationStore::new()),
            hub,
        );
        let resolver = StaticTokenResolver::new(&cfg.auth.tokens);
        tracing::debug!(tokens = resolver.len(), "Token resolver configured");

        Self {
            service: Arc::new(service),
            auth: AuthState::new(Arc::new(resolver)),
            keep_alive: cfg.keep_alive(),
        }
    }

    pub fn hub(&self) -> &Arc<NotificationHub> {
        self.service.hub()
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

pub fn build_app(cfg: &AppConfig) -> Router {
    build_router(AppState::from_config(cfg), cfg)
}

pub fn build_router(state: AppState, cfg: &AppConfig) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    let api = Router::new()
        .route("/notifications", get(handlers::list_notifications))
        .route("/notifications/", get(handlers::list_notifications))
        .route("/notifications/connect/{token}", get(handlers::connect))
        .route(
            "/notifications/send/projects/{project_id}/tasks/{task_id}",
            post(handlers::send_notification),
        )
        .route("/projects/{project_id}/tasks", post(handlers::create_task))
        .route(
            "/projects/{project_id}/tasks/{task_id}",
            put(handlers::update_task),
        );

    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        span.record("http.status_code", res.status().as_u16());
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct WorkstreamServer {
    addr: SocketAddr,
    app: Router,
    state: AppState,
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn build(self) -> WorkstreamServer {
        let state = AppState::from_config(&self.config);
        let app = build_router(state.clone(), &self.config);

        WorkstreamServer {
            addr: self.addr,
            app,
            state,
        }
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkstreamServer {
    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        let hub = self.state.hub().clone();
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal(hub))
            .await?;
        Ok(())
    }
}

async fn shutdown_signal(hub: Arc<NotificationHub>) {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
    // Event streams only end when closed; serve waits for them to finish.
    hub.close_all();
}
