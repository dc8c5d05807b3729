//! Tunnelgate Core Library
//!
//! This crate provides the authenticating gateway that sits in front of a
//! local service published through a tunnel. It includes:
//! - Loopback port allocation that returns already-bound listeners
//! - Stateless, HMAC-signed session cookies
//! - Request routing between login, WebSocket pass-through and proxying
//! - Gateway lifecycle with non-blocking start and bounded graceful stop
//! - The persisted route table

pub mod brand;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod port;
pub mod token;

pub use config::{AuthConfig, RouteConfig, TunnelConfig};
pub use crypto::SigningKey;
pub use error::{GateError, Result};
pub use gateway::{Dispatch, Gateway, GatewayConfig, SHUTDOWN_TIMEOUT};
pub use token::{DEFAULT_COOKIE_TTL, SessionToken, TokenCodec};
