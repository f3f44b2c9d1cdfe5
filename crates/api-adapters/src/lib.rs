//! # api-adapters
//!
//! The HTTP boundary of the message board: JSON views of the domain records,
//! the error-to-status mapping, Prometheus metrics and (feature `web-axum`)
//! the axum router with its middleware stack.

pub mod metrics;
pub mod views;

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod extract;
#[cfg(feature = "web-axum")]
pub mod layers;
#[cfg(feature = "web-axum")]
pub mod routes;
#[cfg(feature = "web-axum")]
pub mod state;

#[cfg(feature = "web-axum")]
pub use error::ApiError;
pub use metrics::Metrics;
#[cfg(feature = "web-axum")]
pub use routes::router;
#[cfg(feature = "web-axum")]
pub use state::AppState;
