//! Cryptographic utilities for Tunnelgate
//!
//! Provides signing keys and the HMAC-SHA256 primitive behind session tokens.

use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{GateError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Recommended signing key size in bytes
pub const SIGNING_KEY_SIZE: usize = 32;

/// Secret key used by a single gateway to sign and verify its session tokens
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Generate a new random 32-byte key
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; SIGNING_KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw key bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(GateError::InvalidSigningKey("key is empty".to_string()));
        }
        Ok(Self(bytes))
    }

    /// Decode a hex-encoded key, as stored in the route configuration
    pub fn from_hex(encoded: &str) -> Result<Self> {
        Self::from_bytes(hex::decode(encoded.trim())?)
    }

    /// Hex encoding for storage
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("len", &self.0.len())
            .finish_non_exhaustive()
    }
}

/// Keyed HMAC-SHA256 signer bound to one signing key
#[derive(Clone)]
pub struct PayloadSigner {
    mac: HmacSha256,
}

impl PayloadSigner {
    pub fn new(key: &SigningKey) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|e| GateError::InvalidSigningKey(e.to_string()))?;
        Ok(Self { mac })
    }

    /// Lowercase hex HMAC of `payload`
    pub fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check a transmitted hex signature without leaking where it diverges
    pub fn verify(&self, payload: &str, signature: &str) -> bool {
        constant_time_eq(self.sign(payload).as_bytes(), signature.as_bytes())
    }
}

impl std::fmt::Debug for PayloadSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadSigner").finish_non_exhaustive()
    }
}

/// Constant-time byte comparison. Slices of different length compare unequal.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_key_size() {
        let key = SigningKey::generate();
        assert_eq!(key.len(), SIGNING_KEY_SIZE);
        assert_ne!(key, SigningKey::generate());
    }

    #[test]
    fn test_hex_roundtrip() {
        let key = SigningKey::generate();
        let decoded = SigningKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(key, decoded);
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert!(matches!(
            SigningKey::from_hex("not-hex"),
            Err(GateError::InvalidSigningKey(_))
        ));
        assert!(matches!(
            SigningKey::from_hex(""),
            Err(GateError::InvalidSigningKey(_))
        ));
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SigningKey::from_bytes(vec![0xab; 4]).unwrap();
        let rendered = format!("{:?}", key);
        assert!(!rendered.contains("ab"));
        assert!(!rendered.contains("171"));
    }

    #[test]
    fn test_known_hmac_vector() {
        // RFC 4231 test case 2
        let key = SigningKey::from_bytes(b"Jefe".to_vec()).unwrap();
        let signer = PayloadSigner::new(&key).unwrap();
        assert_eq!(
            signer.sign("what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_verify_is_exact() {
        let signer = PayloadSigner::new(&SigningKey::generate()).unwrap();
        let sig = signer.sign("admin:0");
        assert!(signer.verify("admin:0", &sig));
        assert!(!signer.verify("admin:0", &sig.to_uppercase()));
        assert!(!signer.verify("admin:0", &sig[..sig.len() - 1]));
        assert!(!signer.verify("admin:1", &sig));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
