#![forbid(unsafe_code)]

//! Runtime configuration.
//!
//! Built with chained `with_*` setters, or read from the process environment
//! with [`RuntimeConfig::from_env`]:
//!
//! | variable            | effect                                        |
//! |---------------------|-----------------------------------------------|
//! | `WEFT_PLATFORM`     | platform, see [`Environment::detect`]         |
//! | `WEFT_FABRIC`       | native renderer flavour                       |
//! | `WEFT_DEV_CHECKS`   | `1`/`0`: force development checks on or off   |
//! | `WEFT_RENDER_QUEUE` | render thread queue capacity (jobs)           |

use weft_core::{Environment, Error};

/// Default name of the render thread.
pub const DEFAULT_RENDER_THREAD_NAME: &str = "weft-render";

/// Default render queue capacity.
///
/// Bounded so a stalled render thread applies backpressure to writers
/// instead of growing memory without limit.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Host environment; decides web routing and gesture support.
    pub environment: Environment,
    /// Development checks (capability assertions). Defaults to on in debug
    /// builds and off in release builds.
    pub dev_checks: bool,
    pub render_thread_name: String,
    pub channel_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            dev_checks: cfg!(debug_assertions),
            render_thread_name: DEFAULT_RENDER_THREAD_NAME.to_owned(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `WEFT_*` environment variables.
    ///
    /// Malformed values are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self {
            environment: Environment::detect(),
            ..Self::default()
        };
        if let Ok(raw) = std::env::var("WEFT_DEV_CHECKS") {
            match parse_flag(&raw) {
                Ok(flag) => config.dev_checks = flag,
                Err(err) => tracing::warn!(%err, "ignoring WEFT_DEV_CHECKS"),
            }
        }
        if let Ok(raw) = std::env::var("WEFT_RENDER_QUEUE") {
            match parse_capacity(&raw) {
                Ok(capacity) => config.channel_capacity = capacity,
                Err(err) => tracing::warn!(%err, "ignoring WEFT_RENDER_QUEUE"),
            }
        }
        config
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub fn with_dev_checks(mut self, enabled: bool) -> Self {
        self.dev_checks = enabled;
        self
    }

    #[must_use]
    pub fn with_render_thread_name(mut self, name: impl Into<String>) -> Self {
        self.render_thread_name = name.into();
        self
    }

    /// Render queue capacity; clamped to at least 1.
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

fn parse_flag(raw: &str) -> Result<bool, Error> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::InvalidConfig {
            key: "WEFT_DEV_CHECKS",
            value: other.to_owned(),
        }),
    }
}

fn parse_capacity(raw: &str) -> Result<usize, Error> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::InvalidConfig {
            key: "WEFT_RENDER_QUEUE",
            value: raw.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.render_thread_name, DEFAULT_RENDER_THREAD_NAME);
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.dev_checks, cfg!(debug_assertions));
        assert!(!config.environment.should_use_web());
    }

    #[test]
    fn builder_chain() {
        let config = RuntimeConfig::default()
            .with_environment(Environment::web())
            .with_dev_checks(false)
            .with_channel_capacity(0)
            .with_render_thread_name("ui");
        assert!(config.environment.should_use_web());
        assert!(!config.dev_checks);
        assert_eq!(config.channel_capacity, 1);
        assert_eq!(config.render_thread_name, "ui");
    }

    #[test]
    fn flag_parsing() {
        assert!(parse_flag("1").unwrap());
        assert!(parse_flag(" ON ").unwrap());
        assert!(!parse_flag("false").unwrap());
        assert!(parse_flag("maybe").is_err());
    }

    #[test]
    fn capacity_parsing() {
        assert_eq!(parse_capacity("64").unwrap(), 64);
        assert!(parse_capacity("0").is_err());
        assert!(parse_capacity("lots").is_err());
    }
}
