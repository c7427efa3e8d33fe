use std::path::PathBuf;

use tracing::debug;

/// Where to look for the node binary under test.
pub struct BinaryConfig {
    pub env_var: &'static str,
    pub binary_name: &'static str,
    pub fallback_path: &'static str,
}

pub struct BinaryResolver;

impl BinaryResolver {
    /// Resolve the binary path: explicit env override first, then the
    /// conventional build-tree location.
    #[must_use]
    pub fn resolve_path(cfg: &BinaryConfig) -> PathBuf {
        let path = std::env::var(cfg.env_var)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(cfg.fallback_path));
        debug!(binary = cfg.binary_name, path = %path.display(), "resolved node binary");
        path
    }
}
