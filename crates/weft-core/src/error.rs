use thiserror::Error;

use crate::environment::Environment;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Flushing removals where there is no props registry: the renderer is
    /// not Fabric or the backend lacks batched removal.
    #[error(
        "props registry is only available on Fabric backends with batched removal \
         (backend: {backend}, environment: {environment})"
    )]
    BatchedRemovalUnsupported { backend: String, environment: String },

    /// The render context stopped accepting jobs.
    #[error("render context is closed")]
    RenderContextClosed,

    /// A platform-gated capability was invoked where it cannot work.
    #[error("{capability}() is not supported in {environment}")]
    UnsupportedEnvironment {
        capability: &'static str,
        environment: Environment,
    },

    /// A render-context-only capability was invoked from elsewhere.
    #[error("{capability}() can only be used on the render context")]
    NotOnRenderContext { capability: &'static str },

    #[error("invalid value for {key}: {value:?}")]
    InvalidConfig { key: &'static str, value: String },
}

impl Error {
    #[must_use]
    pub fn unsupported(capability: &'static str, environment: Environment) -> Self {
        Self::UnsupportedEnvironment {
            capability,
            environment,
        }
    }

    /// Whether this error is a development-time configuration error.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::BatchedRemovalUnsupported { .. } | Self::InvalidConfig { .. }
        )
    }
}
