//! Upstream forwarding
//!
//! Relays requests to the protected service on loopback. Ordinary requests
//! are proxied with hop-by-hop headers stripped; upgrade requests keep their
//! `Connection`/`Upgrade` headers and, on `101`, the two upgraded connections
//! are spliced together byte for byte.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Request, Response, StatusCode, Uri};
use axum::response::IntoResponse;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tracing::{debug, warn};

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// HTTP client pinned to one loopback service
#[derive(Clone)]
pub struct Upstream {
    client: Client<HttpConnector, Body>,
    authority: String,
}

impl Upstream {
    pub fn new(target_port: u16) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            client,
            authority: format!("127.0.0.1:{}", target_port),
        }
    }

    /// `host:port` of the protected service
    pub fn authority(&self) -> &str {
        &self.authority
    }

    fn target_uri(&self, original: &Uri) -> Result<Uri, axum::http::Error> {
        let path_and_query = original
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        Uri::builder()
            .scheme("http")
            .authority(self.authority.as_str())
            .path_and_query(path_and_query)
            .build()
    }

    /// Proxy an ordinary request and relay the response
    pub async fn forward(&self, mut req: Request<Body>) -> Response<Body> {
        let uri = match self.target_uri(req.uri()) {
            Ok(uri) => uri,
            Err(e) => return upstream_error(&self.authority, e),
        };
        *req.uri_mut() = uri;
        *req.version_mut() = axum::http::Version::HTTP_11;
        strip_hop_by_hop(req.headers_mut());
        append_forwarded_for(&mut req);

        match self.client.request(req).await {
            Ok(resp) => {
                let (mut parts, body) = resp.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => upstream_error(&self.authority, e),
        }
    }

    /// Proxy an upgrade handshake and splice the connections if upstream agrees
    pub async fn forward_upgrade(&self, mut req: Request<Body>) -> Response<Body> {
        let uri = match self.target_uri(req.uri()) {
            Ok(uri) => uri,
            Err(e) => return upstream_error(&self.authority, e),
        };
        let client_upgrade = hyper::upgrade::on(&mut req);
        *req.uri_mut() = uri;
        *req.version_mut() = axum::http::Version::HTTP_11;
        append_forwarded_for(&mut req);

        let mut resp = match self.client.request(req).await {
            Ok(resp) => resp,
            Err(e) => return upstream_error(&self.authority, e),
        };

        if resp.status() == StatusCode::SWITCHING_PROTOCOLS {
            let upstream_upgrade = hyper::upgrade::on(&mut resp);
            let authority = self.authority.clone();
            tokio::spawn(async move {
                let (client_io, upstream_io) =
                    match tokio::try_join!(client_upgrade, upstream_upgrade) {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(upstream = %authority, error = %e, "Upgrade failed");
                            return;
                        }
                    };
                let mut client_io = TokioIo::new(client_io);
                let mut upstream_io = TokioIo::new(upstream_io);
                match tokio::io::copy_bidirectional(&mut client_io, &mut upstream_io).await {
                    Ok((sent, received)) => {
                        debug!(upstream = %authority, sent, received, "Upgraded connection closed")
                    }
                    Err(e) => debug!(upstream = %authority, error = %e, "Upgraded connection ended"),
                }
            });
        }

        resp.map(Body::new)
    }
}

impl std::fmt::Debug for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstream")
            .field("authority", &self.authority)
            .finish()
    }
}

fn upstream_error(authority: &str, error: impl std::fmt::Display) -> Response<Body> {
    warn!(upstream = %authority, error = %error, "Upstream request failed");
    StatusCode::BAD_GATEWAY.into_response()
}

/// Remove hop-by-hop headers, including any named by `Connection`
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

fn append_forwarded_for(req: &mut Request<Body>) {
    let Some(ConnectInfo(peer)) = req.extensions().get::<ConnectInfo<SocketAddr>>().copied() else {
        return;
    };
    let client_ip = peer.ip().to_string();
    let value = match req
        .headers()
        .get(&X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
    {
        Some(prior) => format!("{}, {}", prior, client_ip),
        None => client_ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        req.headers_mut().insert(X_FORWARDED_FOR, value);
    }
}
