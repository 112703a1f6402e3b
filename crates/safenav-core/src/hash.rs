//! Stable fingerprints for expression trees (used in logs and tests).

use blake3::Hasher;
use serde::Serialize;

use crate::expr::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn to_hex(&self) -> String {
        // blake3 hex(32b) is 64 hex chars
        let mut s = String::with_capacity(64);
        for b in &self.0 {
            use std::fmt::Write as _;
            let _ = write!(&mut s, "{:02x}", b);
        }
        s
    }

    /// First 8 bytes as hex; enough to tell trees apart in a log line.
    pub fn short(&self) -> String {
        self.to_hex()[..16].to_string()
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    let mut h = Hasher::new();
    h.update(bytes);
    let out = h.finalize();
    Hash256(out.into())
}

/// Hash any serde-serializable value deterministically (via JSON).
pub fn hash_serde<T: Serialize>(v: &T) -> Result<Hash256, crate::error::Error> {
    let bytes = serde_json::to_vec(v).map_err(|e| crate::error::Error::Hash(e.to_string()))?;
    Ok(hash_bytes(&bytes))
}

/// Structural fingerprint of a tree: equal trees hash equal.
pub fn fingerprint(expr: &Expr) -> Result<Hash256, crate::error::Error> {
    hash_serde(expr)
}
