//! Gateway Router
//!
//! Every request is classified, in this order, into one of four outcomes:
//!
//! 1. `Upgrade: websocket` → forwarded upstream without an auth check
//! 2. `POST` to the login path → credential check, cookie, redirect
//! 3. valid session cookie → forwarded upstream unchanged
//! 4. anything else → the static login page
//!
//! Classification is a pure function of the request head, so it can be
//! tested without sockets.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Form, FromRequest, Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::brand::{COOKIE_NAME, LOGIN_PATH};
use crate::crypto::constant_time_eq;
use crate::gateway::forward::Upstream;
use crate::token::{TokenCodec, now_unix_secs};

const LOGIN_HTML: &str = include_str!("login.html");

/// Where a request goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// WebSocket handshake, passed through unauthenticated
    WebSocket,
    /// Login form submission
    Login,
    /// Carries a valid session for `subject`
    Authenticated { subject: String },
    /// Gets the login page
    Unauthenticated,
}

/// Decide how to handle a request from its method, path and headers
pub fn classify(
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    codec: &TokenCodec,
    now: u64,
) -> Dispatch {
    if is_websocket(headers) {
        return Dispatch::WebSocket;
    }

    if method == Method::POST && path == LOGIN_PATH {
        return Dispatch::Login;
    }

    match session_cookie(headers) {
        Some(value) => match codec.verify(value, now) {
            Some(subject) => Dispatch::Authenticated { subject },
            None => {
                debug!("Ignoring invalid session cookie");
                Dispatch::Unauthenticated
            }
        },
        None => Dispatch::Unauthenticated,
    }
}

/// Raw value of the first session cookie, exactly as the client sent it.
///
/// Values are not percent-decoded: the signature covers the bytes on the wire.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| Cookie::split_parse(v))
        .filter_map(|c| c.ok())
        .find(|c| c.name() == COOKIE_NAME)
        .and_then(|c| c.value_raw())
}

/// `Upgrade` header equals `websocket`, ignoring case
pub fn is_websocket(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// The single shared credential pair protecting a route
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Exact match on both fields.
    ///
    /// Both comparisons always run and each is constant-time.
    pub fn matches(&self, username: &str, password: &str) -> bool {
        let user_ok = constant_time_eq(self.username.as_bytes(), username.as_bytes());
        let pass_ok = constant_time_eq(self.password.as_bytes(), password.as_bytes());
        user_ok & pass_ok
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Read-only state shared by every request of one gateway
#[derive(Debug)]
pub struct GatewayState {
    pub credentials: Credentials,
    pub codec: TokenCodec,
    pub upstream: Upstream,
}

#[derive(Debug, Default, Deserialize)]
struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// Build the axum router serving one gateway
pub fn build_router(state: Arc<GatewayState>) -> Router {
    Router::new().fallback(dispatch).with_state(state)
}

async fn dispatch(State(state): State<Arc<GatewayState>>, req: Request) -> Response {
    let route = classify(
        req.method(),
        req.uri().path(),
        req.headers(),
        &state.codec,
        now_unix_secs(),
    );

    match route {
        Dispatch::WebSocket => state.upstream.forward_upgrade(req).await,
        Dispatch::Login => handle_login(&state, req).await,
        Dispatch::Authenticated { .. } => state.upstream.forward(req).await,
        Dispatch::Unauthenticated => login_page(),
    }
}

async fn handle_login(state: &GatewayState, req: Request<Body>) -> Response {
    let form = match Form::<LoginForm>::from_request(req, &()).await {
        Ok(Form(form)) => form,
        Err(e) => {
            debug!(error = %e, "Unreadable login form");
            LoginForm::default()
        }
    };

    if !state.credentials.matches(&form.username, &form.password) {
        debug!("Login rejected");
        return Redirect::to("/?error=1").into_response();
    }

    let value = state.codec.issue(&form.username, now_unix_secs());
    let max_age = i64::try_from(state.codec.ttl().as_secs()).unwrap_or(i64::MAX);
    let cookie = Cookie::build((COOKIE_NAME, value))
        .path("/")
        .max_age(time::Duration::seconds(max_age))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build();

    // Written unencoded so the cookie carries the token verbatim
    let set_cookie = match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Session cookie is not a valid header");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    info!(subject = %form.username, "Login accepted");
    let mut resp = Redirect::to("/").into_response();
    resp.headers_mut().append(header::SET_COOKIE, set_cookie);
    resp
}

fn login_page() -> Response {
    Html(LOGIN_HTML).into_response()
}
