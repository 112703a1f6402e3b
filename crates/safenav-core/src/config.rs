//! Rewrite and engine configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteConfig {
    /// For members whose fallback is a fresh empty collection, also guard on
    /// the member itself resolving to its zero value, not only on the
    /// receiver being absent.
    pub double_guard: bool,

    /// Substitute empty sequences/collections for absent `Sequence<T>` and
    /// `Collection<T>` members. When off, every member falls back to its
    /// type's zero value.
    pub collection_fallbacks: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            double_guard: true,
            collection_fallbacks: true,
        }
    }
}

impl RewriteConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `SAFENAV_DOUBLE_GUARD`: `true`/`false`
    /// - `SAFENAV_COLLECTION_FALLBACKS`: `true`/`false`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("SAFENAV_DOUBLE_GUARD") {
            if let Ok(v) = s.parse::<bool>() {
                cfg.double_guard = v;
            }
        }

        if let Ok(s) = std::env::var("SAFENAV_COLLECTION_FALLBACKS") {
            if let Ok(v) = s.parse::<bool>() {
                cfg.collection_fallbacks = v;
            }
        }

        cfg
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deepest expression nesting the in-memory engine will evaluate.
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_depth: 512 }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `SAFENAV_MAX_DEPTH`: evaluation depth limit
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("SAFENAV_MAX_DEPTH") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_depth = v;
            }
        }

        cfg
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.max_depth == 0 {
            return Err(crate::error::Error::Config(
                "max_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
