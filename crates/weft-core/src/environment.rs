#![forbid(unsafe_code)]

//! Host environment: which platform the render tree lives on.
//!
//! Detection reads environment variables once, the way capability probing
//! does for terminals:
//!
//! | variable        | values                                        |
//! |-----------------|-----------------------------------------------|
//! | `WEFT_PLATFORM` | `native` (default), `web`, `jest`, `chrome-debugger` |
//! | `WEFT_FABRIC`   | `1`/`true` when the native renderer is Fabric (default on) |

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Where views are rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Platform {
    #[default]
    Native,
    Web,
    /// Web renderer running under a test runner.
    Jest,
    /// Native app with JS executing in a remote debugger.
    ChromeDebugger,
}

impl Platform {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Web => "web",
            Self::Jest => "jest",
            Self::ChromeDebugger => "chrome-debugger",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "web" => Ok(Self::Web),
            "jest" => Ok(Self::Jest),
            "chrome-debugger" | "chrome_debugger" => Ok(Self::ChromeDebugger),
            other => Err(Error::InvalidConfig {
                key: "WEFT_PLATFORM",
                value: other.to_owned(),
            }),
        }
    }
}

/// Platform plus renderer flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Environment {
    platform: Platform,
    fabric: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self::native(true)
    }
}

impl Environment {
    #[must_use]
    pub const fn native(fabric: bool) -> Self {
        Self {
            platform: Platform::Native,
            fabric,
        }
    }

    #[must_use]
    pub const fn web() -> Self {
        Self {
            platform: Platform::Web,
            fabric: false,
        }
    }

    #[must_use]
    pub const fn jest() -> Self {
        Self {
            platform: Platform::Jest,
            fabric: false,
        }
    }

    #[must_use]
    pub const fn chrome_debugger() -> Self {
        Self {
            platform: Platform::ChromeDebugger,
            fabric: false,
        }
    }

    /// Read `WEFT_PLATFORM` / `WEFT_FABRIC`. Unknown values fall back to the
    /// default with a warning.
    #[must_use]
    pub fn detect() -> Self {
        let platform = match std::env::var("WEFT_PLATFORM") {
            Ok(raw) => raw.parse().unwrap_or_else(|err| {
                tracing::warn!(%err, "ignoring WEFT_PLATFORM");
                Platform::default()
            }),
            Err(_) => Platform::default(),
        };
        let fabric = std::env::var("WEFT_FABRIC")
            .map(|raw| matches!(raw.trim(), "1" | "true" | "yes"))
            .unwrap_or(platform == Platform::Native);
        Self { platform, fabric }
    }

    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// Native renderer with Fabric (the only one with a props registry).
    #[must_use]
    pub const fn is_fabric(&self) -> bool {
        self.fabric
    }

    /// Whether views are updated through the web path (component refs
    /// instead of native nodes).
    #[must_use]
    pub fn should_use_web(&self) -> bool {
        self.platform != Platform::Native
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.platform == Platform::Native {
            let renderer = if self.fabric { "fabric" } else { "paper" };
            write!(f, "native/{renderer}")
        } else {
            f.write_str(self.platform.as_str())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_platforms() {
        assert_eq!("native".parse::<Platform>().unwrap(), Platform::Native);
        assert_eq!(" Web ".parse::<Platform>().unwrap(), Platform::Web);
        assert_eq!("chrome_debugger".parse::<Platform>().unwrap(), Platform::ChromeDebugger);
        assert!("ios".parse::<Platform>().is_err());
    }

    #[test]
    fn web_routing() {
        assert!(!Environment::native(true).should_use_web());
        assert!(Environment::web().should_use_web());
        assert!(Environment::jest().should_use_web());
        assert!(Environment::chrome_debugger().should_use_web());
    }

    #[test]
    fn display() {
        assert_eq!(Environment::native(true).to_string(), "native/fabric");
        assert_eq!(Environment::native(false).to_string(), "native/paper");
        assert_eq!(Environment::jest().to_string(), "jest");
    }
}
