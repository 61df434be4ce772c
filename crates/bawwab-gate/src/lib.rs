//! HTTP gate for Bawwab
//!
//! The axum server and middleware that sit in front of a protected
//! resource: per-request session checks, directory authentication and
//! authorization, signed session cookies, and Prometheus metrics.

pub mod gate;
pub mod metrics;
pub mod server;
pub mod session;

pub use gate::Gate;
pub use server::{AppState, GateServer};
pub use session::{SessionCodec, SessionProof};
