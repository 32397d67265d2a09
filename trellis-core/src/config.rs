//! Runtime Configuration
//!
//! Knobs that change diagnostics and bookkeeping without changing reactive
//! semantics. Pass a `Config` to `Runtime::with_config`.

/// Runtime configuration.
///
/// # Example
///
/// ```rust
/// use trellis_core::{Config, Runtime};
///
/// let runtime = Runtime::with_config(
///     Config::default()
///         .warn_on_readonly_write(false)
///         .prune_empty_deps(true),
/// );
/// assert!(runtime.config().prunes_empty_deps());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    warn_on_readonly_write: bool,
    prune_empty_deps: bool,
}

impl Config {
    /// Emit a `tracing` warning whenever a write to a readonly wrapper is
    /// swallowed. On by default.
    pub fn warn_on_readonly_write(mut self, enabled: bool) -> Self {
        self.warn_on_readonly_write = enabled;
        self
    }

    /// Remove property-level dependency sets as soon as their last
    /// subscriber stops.
    ///
    /// Off by default: empty sets are kept and reclaimed together with their
    /// target object, which saves re-allocating them for targets that are
    /// subscribed and unsubscribed repeatedly.
    pub fn prune_empty_deps(mut self, enabled: bool) -> Self {
        self.prune_empty_deps = enabled;
        self
    }

    pub fn warns_on_readonly_write(&self) -> bool {
        self.warn_on_readonly_write
    }

    pub fn prunes_empty_deps(&self) -> bool {
        self.prune_empty_deps
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            warn_on_readonly_write: true,
            prune_empty_deps: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.warns_on_readonly_write());
        assert!(!config.prunes_empty_deps());
    }

    #[test]
    fn builder_overrides() {
        let config = Config::default()
            .warn_on_readonly_write(false)
            .prune_empty_deps(true);
        assert!(!config.warns_on_readonly_write());
        assert!(config.prunes_empty_deps());
    }
}
