//! Session Token Codec
//!
//! A session token is carried entirely in the auth cookie:
//!
//! ```text
//! <subject>:<expiry as hex unix seconds>.<hex hmac-sha256 of everything before the dot>
//! ```
//!
//! Nothing is stored server-side. A token is valid while its signature
//! matches under the gateway's signing key and the current time is strictly
//! before its expiry.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::crypto::{PayloadSigner, SigningKey};
use crate::error::Result;

/// Default lifetime of a successful login
pub const DEFAULT_COOKIE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Decoded form of the cookie value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub subject: String,
    pub expiry: u64,
    pub signature: String,
}

impl SessionToken {
    /// The signed half of the wire format
    pub fn payload(&self) -> String {
        encode_payload(&self.subject, self.expiry)
    }

    /// Wire format: `payload.signature`
    pub fn encode(&self) -> String {
        format!("{}.{}", self.payload(), self.signature)
    }

    /// Split a cookie value into its parts without checking the signature.
    ///
    /// Use [`TokenCodec::verify`] to authenticate a cookie.
    pub fn decode(value: &str) -> Option<Self> {
        let (payload, signature) = split_signature(value)?;
        let (subject, expiry) = parse_payload(payload)?;
        Some(Self {
            subject: subject.to_string(),
            expiry,
            signature: signature.to_string(),
        })
    }
}

fn encode_payload(subject: &str, expiry: u64) -> String {
    format!("{}:{:x}", subject, expiry)
}

// The payload never contains '.', so the last one separates the signature.
fn split_signature(value: &str) -> Option<(&str, &str)> {
    value.rsplit_once('.')
}

fn parse_payload(payload: &str) -> Option<(&str, u64)> {
    let (subject, expiry_hex) = payload.rsplit_once(':')?;
    let expiry = u64::from_str_radix(expiry_hex, 16).ok()?;
    Some((subject, expiry))
}

/// Issues and verifies session tokens for one gateway.
///
/// Each gateway owns its own codec, so gateways with different keys never
/// accept each other's cookies.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    signer: PayloadSigner,
    ttl: Duration,
}

impl TokenCodec {
    /// Create a codec. A zero `ttl` falls back to [`DEFAULT_COOKIE_TTL`].
    pub fn new(key: &SigningKey, ttl: Duration) -> Result<Self> {
        let ttl = if ttl.is_zero() { DEFAULT_COOKIE_TTL } else { ttl };
        Ok(Self {
            signer: PayloadSigner::new(key)?,
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Build a signed token for `subject` valid until `now + ttl`
    pub fn sign(&self, subject: &str, now: u64) -> SessionToken {
        let expiry = now.saturating_add(self.ttl.as_secs());
        let signature = self.signer.sign(&encode_payload(subject, expiry));
        SessionToken {
            subject: subject.to_string(),
            expiry,
            signature,
        }
    }

    /// Issue the cookie value for `subject`
    pub fn issue(&self, subject: &str, now: u64) -> String {
        self.sign(subject, now).encode()
    }

    /// Authenticate a cookie value, returning its subject if it is valid at `now`.
    ///
    /// The signature is checked over the payload exactly as transmitted, in
    /// constant time, before the payload is parsed.
    pub fn verify(&self, value: &str, now: u64) -> Option<String> {
        let (payload, signature) = split_signature(value)?;
        if !self.signer.verify(payload, signature) {
            return None;
        }
        let (subject, expiry) = parse_payload(payload)?;
        (now < expiry).then(|| subject.to_string())
    }
}

/// Current wall-clock time as unix seconds
pub fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
