//! Core types shared by the classifier, the state machine and the gateway.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of one scan attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh identifier for callers that have none of their own.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of a session on the contact track.
///
/// Ordered so that `a < b` means `b` comes later in the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStage {
    NotStarted,
    Analyzing,
    FormShown,
}

impl ContactStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Analyzing => "analyzing",
            Self::FormShown => "form_shown",
        }
    }
}

impl fmt::Display for ContactStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contact stage the gateway can be asked to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibleStage {
    /// "Analyzing your site..." placeholder.
    Analyzing,
    /// The lead-capture form itself.
    FormShown,
}

impl From<VisibleStage> for ContactStage {
    fn from(stage: VisibleStage) -> Self {
        match stage {
            VisibleStage::Analyzing => ContactStage::Analyzing,
            VisibleStage::FormShown => ContactStage::FormShown,
        }
    }
}

impl fmt::Display for VisibleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ContactStage::from(*self).fmt(f)
    }
}

/// Binary accessibility verdict for a scanned site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Compliant,
    NonCompliant,
}

impl Classification {
    pub fn is_compliant(self) -> bool {
        matches!(self, Self::Compliant)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::NonCompliant => "non_compliant",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the gateway needs to render the CTA banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtaReport {
    pub classification: Classification,
    pub issues_count: u32,
    /// Host name that was scanned, if known. The renderer picks its own
    /// placeholder when absent.
    pub domain: Option<String>,
}

/// What a signal handler decided to do with a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// A delayed action was armed (or a new session was started).
    Armed,
    /// The signal was valid but nothing needed doing.
    Ignored,
    /// The signal referenced a superseded session, or no session is active.
    Stale,
}
