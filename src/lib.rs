//! Distributed circuit breaker gateway library

pub mod admin;
pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod store;

pub use config::schema::GatewayConfig;
pub use gateway::CallGateway;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
