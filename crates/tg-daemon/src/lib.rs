//! Tunnelgate Daemon
//!
//! Owning process for the gateways: starts one per protected route, reports
//! what happened over a channel, and tears them all down on shutdown.

pub mod server;
pub mod session;

pub use server::{GatewaySupervisor, SupervisorCommand, SupervisorEvent};
pub use session::RouteSession;
