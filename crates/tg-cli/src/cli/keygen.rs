//! Keygen Command Implementation

use tg_core::SigningKey;

/// Print a fresh signing key as hex
pub fn run() {
    println!("{}", SigningKey::generate().to_hex());
}
