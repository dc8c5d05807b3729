//! Branding Constants
//!
//! Single source of truth for product naming and the gateway's fixed HTTP surface.

/// Product display name
pub const PRODUCT_NAME: &str = "Tunnelgate";

/// Binary executable name
pub const BIN_NAME: &str = "tunnelgate";

/// Short description
pub const DESCRIPTION: &str = "Tunnel routes behind an authenticating gateway";

/// Name of the session cookie issued after a successful login
pub const COOKIE_NAME: &str = "__tunnelgate_auth";

/// Path the login form posts to
pub const LOGIN_PATH: &str = "/___auth/login";
