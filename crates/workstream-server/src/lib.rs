pub mod auth;
pub mod config;
pub mod handlers;
pub mod observability;
pub mod server;

pub use auth::{AuthState, AuthenticatedUser, StaticTokenResolver, TokenResolver};
pub use config::{AppConfig, AuthConfig, DirectorySeed, NotificationsConfig, ServerConfig};
pub use observability::init_tracing;
pub use server::{AppState, ServerBuilder, WorkstreamServer, build_app, build_router};
