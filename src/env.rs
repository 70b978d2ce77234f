//! Environment-variable defaults for resource limits.
//!
//! `KR_MAX_DEPTH`, `KR_MAX_NODES`, and `KR_DEFAULT_TIMEOUT_MS` override the
//! compiled defaults when the caller supplies no limits. Malformed values
//! are ignored in favor of the defaults.

use noesis_engine::ResourceLimits;
use std::env;

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Default limits, honoring the `KR_*` environment variables.
pub fn default_limits() -> ResourceLimits {
    let mut limits = ResourceLimits::default();
    if let Some(depth) = parse_var::<u32>("KR_MAX_DEPTH") {
        limits.depth = depth;
    }
    if let Some(nodes) = parse_var::<u64>("KR_MAX_NODES") {
        limits.nodes = nodes;
    }
    if let Some(time_ms) = parse_var::<u64>("KR_DEFAULT_TIMEOUT_MS") {
        limits.time_ms = time_ms;
    }
    limits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        // The compiled defaults apply when nothing is set; the exact
        // values come from the engine crate.
        let limits = default_limits();
        assert!(limits.time_ms > 0);
        assert!(limits.depth > 0);
        assert!(limits.nodes > 0);
    }
}
