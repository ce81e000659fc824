//! Error types for disclosure orchestration

use std::fmt;
use thiserror::Error;

use crate::config::ConfigError;
use crate::gateway::GatewayError;
use crate::types::VisibleStage;

/// Disclosure result type alias
pub type Result<T> = std::result::Result<T, DisclosureError>;

/// Collaborators the orchestration cannot start without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    PresentationGateway,
    ScanEngine,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PresentationGateway => f.write_str("presentation gateway"),
            Self::ScanEngine => f.write_str("scan engine"),
        }
    }
}

/// What the machine was trying to render when the gateway failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    Contact(VisibleStage),
    Cta,
}

impl fmt::Display for RenderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contact(stage) => write!(f, "contact stage {stage}"),
            Self::Cta => f.write_str("CTA banner"),
        }
    }
}

/// Disclosure error taxonomy
///
/// Stale signals and unrecognized payloads are not errors: the former
/// surface as [`crate::SignalOutcome::Stale`], the latter as
/// [`crate::classifier::Basis::Fallback`].
#[derive(Debug, Error)]
pub enum DisclosureError {
    #[error("Missing dependency: {dependency} is not available")]
    MissingDependency { dependency: Dependency },

    #[error("Failed to render {target}: {source}")]
    RenderFailure {
        target: RenderTarget,
        source: GatewayError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Disclosure service is no longer running")]
    ServiceStopped,
}
