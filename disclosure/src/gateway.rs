//! Collaborator seams: the presentation gateway the machine renders into,
//! and the scan engine it subscribes to.

use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::types::{CtaReport, SessionId, VisibleStage};

/// Failure reported by a presentation gateway render call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct GatewayError {
    message: String,
}

impl GatewayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Renders the disclosure UI.
///
/// Render calls must be idempotent. They are invoked while the machine
/// holds its state lock, so implementations must not call back into the
/// machine.
pub trait PresentationGateway: Send + Sync {
    /// Show the contact modal at the given stage.
    fn render_contact_stage(&self, stage: VisibleStage) -> Result<(), GatewayError>;

    /// Show the CTA banner.
    fn render_cta(&self, report: &CtaReport) -> Result<(), GatewayError>;

    /// Whether the contact modal is currently on screen.
    fn is_contact_visible(&self) -> bool;
}

/// Signals published by the scan engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The visitor submitted a URL to scan.
    ScanSubmitted { scan_id: SessionId, url: String },
    /// The engine finished processing results for a scan.
    ResultsReceived { scan_id: SessionId, payload: Value },
}

/// The upstream scanner widget.
pub trait ScanEngine: Send + Sync {
    /// Whether the scan UI is still on screen.
    fn is_scan_active(&self) -> bool;

    /// Subscribe to engine events. Each call returns an independent receiver.
    fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;
}
