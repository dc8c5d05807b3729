//! Port Allocator
//!
//! Hands out an already-bound loopback listener instead of a port number, so
//! nothing can grab the port between "find" and "bind".

use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use tracing::{debug, trace};

use crate::error::{GateError, Result};

/// Number of consecutive ports tried before giving up
pub const PORT_SCAN_WINDOW: u16 = 100;

/// Bind the first free loopback port in `start..start + 100`.
///
/// The window is clamped at 65535. Fails with
/// [`GateError::PortAllocationFailed`] when every candidate is taken.
pub fn acquire(start: u16) -> Result<TcpListener> {
    let end = start.saturating_add(PORT_SCAN_WINDOW - 1);

    for port in start..=end {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        match TcpListener::bind(addr) {
            Ok(listener) => {
                debug!(port, "Acquired listener");
                return Ok(listener);
            }
            Err(e) => trace!(port, error = %e, "Port unavailable"),
        }
    }

    Err(GateError::PortAllocationFailed { start, end })
}
