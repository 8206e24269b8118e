//! Wire fronts for the keyhole URL shortener.
//!
//! The HTTP front is an axum router; the gRPC front is a tonic service.
//! Both share the identity component, the request mediator and the
//! configured auth key, carried in [`state::AppState`].

pub mod app;
pub mod config;
pub mod error;
pub mod grpc;
pub mod handlers;
pub mod middleware;
pub mod model;
pub mod state;

pub use config::Config;
pub use state::AppState;
