//! Disclosure state machine.
//!
//! Owns the active [`Session`] and decides, exactly once per session, when
//! the contact modal advances (`NotStarted → Analyzing → FormShown`) and
//! when the CTA banner is shown.
//!
//! Several independent triggers race to show the contact form: the
//! scan-submitted timers, the results timer, the trusted-message timer and
//! the failsafe. None of them coordinate. Instead every delayed action takes
//! the state lock, re-reads the stage, and only renders if the stage is
//! still behind its target. Whichever action gets there first wins; the rest
//! observe the advanced stage and do nothing. A failed render leaves the
//! stage where it was, so the next trigger in line retries.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::classifier::{ScanPayload, classify, infer_from_issues_count};
use crate::config::DisclosureConfig;
use crate::error::{DisclosureError, RenderTarget, Result};
use crate::gateway::{PresentationGateway, ScanEngine};
use crate::session::{Session, SessionSnapshot};
use crate::types::{ContactStage, CtaReport, SessionId, SignalOutcome, VisibleStage};

/// Which path asked for the contact form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    ScanTimer,
    Results,
    Message,
    Failsafe,
}

impl Trigger {
    fn as_str(self) -> &'static str {
        match self {
            Self::ScanTimer => "scan_timer",
            Self::Results => "results",
            Self::Message => "message",
            Self::Failsafe => "failsafe",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DelayedAction {
    Analyzing,
    Form(Trigger),
    Cta,
}

/// Drives contact form and CTA disclosure for the active scan session.
///
/// Cheap to clone; clones share the same session state.
#[derive(Clone)]
pub struct DisclosureMachine {
    inner: Arc<Inner>,
}

struct Inner {
    config: DisclosureConfig,
    gateway: Arc<dyn PresentationGateway>,
    engine: Arc<dyn ScanEngine>,
    active: Mutex<Option<Session>>,
}

impl DisclosureMachine {
    pub fn new(
        config: DisclosureConfig,
        gateway: Arc<dyn PresentationGateway>,
        engine: Arc<dyn ScanEngine>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                gateway,
                engine,
                active: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &DisclosureConfig {
        &self.inner.config
    }

    /// Start a session for a newly submitted scan.
    ///
    /// Supersedes (and disarms) any previous session. A repeated signal for
    /// the session that is already active is ignored, unless that session
    /// already completed with its CTA; the id is then reused by a new scan.
    pub async fn on_scan_submitted(&self, id: SessionId, url: &str) -> SignalOutcome {
        let mut active = self.inner.active.lock().await;

        if let Some(current) = active.as_ref() {
            if current.id == id && !current.is_terminal() {
                tracing::debug!(session = %id, "Duplicate scan-submitted signal ignored");
                return SignalOutcome::Ignored;
            }
            current.discard();
            tracing::info!(session = %current.id, superseded_by = %id, "Session superseded");
        }

        let session = Session::new(id, url);
        let timing = &self.inner.config.timing;
        self.arm(&session, timing.analyzing_delay(), DelayedAction::Analyzing);
        self.arm(
            &session,
            timing.scan_form_delay(),
            DelayedAction::Form(Trigger::ScanTimer),
        );
        self.arm(
            &session,
            timing.failsafe(),
            DelayedAction::Form(Trigger::Failsafe),
        );

        tracing::info!(
            session = %session.id,
            domain = session.domain.as_deref().unwrap_or("-"),
            "Scan submitted, contact track armed"
        );
        *active = Some(session);
        SignalOutcome::Armed
    }

    /// Classify the scan results and schedule the contact form.
    pub async fn on_results_received(&self, id: &SessionId, payload: &Value) -> SignalOutcome {
        let mut active = self.inner.active.lock().await;
        let Some(session) = active.as_mut().filter(|s| &s.id == id) else {
            tracing::debug!(session = %id, "Results for inactive session ignored");
            return SignalOutcome::Stale;
        };
        if session.is_terminal() {
            return SignalOutcome::Ignored;
        }

        let payload = ScanPayload::from_json(payload);
        if !payload.is_recognized() {
            tracing::warn!(
                session = %session.id,
                "Result payload has no recognized fields, classifying as non-compliant"
            );
        }
        let verdict = classify(&payload, &self.inner.config.classifier);
        session.record_verdict(&verdict);
        tracing::info!(
            session = %session.id,
            classification = %verdict.classification,
            issues = verdict.issues_count,
            basis = ?verdict.basis,
            "Scan results classified"
        );

        if session.contact_stage == ContactStage::FormShown {
            return SignalOutcome::Ignored;
        }
        self.arm(
            session,
            self.inner.config.timing.results_form_delay(),
            DelayedAction::Form(Trigger::Results),
        );
        SignalOutcome::Armed
    }

    /// React to a cross-origin message from the scanner iframe.
    pub async fn on_external_message(&self, origin_is_trusted: bool) -> SignalOutcome {
        let active = self.inner.active.lock().await;
        let Some(session) = active.as_ref() else {
            tracing::debug!("Iframe message without an active session ignored");
            return SignalOutcome::Stale;
        };
        if !origin_is_trusted {
            tracing::debug!(session = %session.id, "Untrusted iframe message ignored");
            return SignalOutcome::Ignored;
        }
        if session.is_terminal() || session.contact_stage == ContactStage::FormShown {
            return SignalOutcome::Ignored;
        }

        self.arm(
            session,
            self.inner.config.timing.message_form_delay(),
            DelayedAction::Form(Trigger::Message),
        );
        SignalOutcome::Armed
    }

    /// Schedule the CTA banner after the visitor submits the contact form.
    pub async fn on_contact_form_submitted(&self) -> SignalOutcome {
        let active = self.inner.active.lock().await;
        let Some(session) = active.as_ref() else {
            tracing::debug!("Contact form submitted without an active session");
            return SignalOutcome::Stale;
        };
        if !self.inner.config.enable_cta {
            tracing::debug!(session = %session.id, "CTA disabled, form submission ignored");
            return SignalOutcome::Ignored;
        }
        if session.cta_shown {
            return SignalOutcome::Ignored;
        }

        self.arm(
            session,
            self.inner.config.timing.cta_after_submit(),
            DelayedAction::Cta,
        );
        SignalOutcome::Armed
    }

    /// Copy of the active session, if any.
    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        self.inner.active.lock().await.as_ref().map(Session::snapshot)
    }

    /// Discard the active session and disarm its timers.
    pub async fn shutdown(&self) {
        if let Some(session) = self.inner.active.lock().await.take() {
            session.discard();
            tracing::debug!(session = %session.id, "Session discarded on shutdown");
        }
    }

    fn arm(&self, session: &Session, delay: Duration, action: DelayedAction) {
        let machine = self.clone();
        let id = session.id.clone();
        tracing::debug!(session = %id, ?action, delay_ms = delay.as_millis() as u64, "Armed");
        session.timers.schedule(delay, async move {
            machine.fire(id, action).await;
        });
    }

    async fn fire(&self, id: SessionId, action: DelayedAction) {
        let mut active = self.inner.active.lock().await;
        let Some(session) = active.as_mut().filter(|s| s.id == id) else {
            tracing::debug!(
                session = %id,
                ?action,
                "Delayed action for superseded session skipped"
            );
            return;
        };
        if session.is_terminal() {
            return;
        }

        let result = match action {
            DelayedAction::Analyzing => {
                self.advance(session, VisibleStage::Analyzing, Trigger::ScanTimer)
            }
            DelayedAction::Form(Trigger::Failsafe) if !self.inner.engine.is_scan_active() => {
                tracing::debug!(session = %session.id, "Failsafe skipped, scan UI closed");
                Ok(false)
            }
            DelayedAction::Form(trigger) => {
                self.advance(session, VisibleStage::FormShown, trigger)
            }
            DelayedAction::Cta => self.show_cta(session),
        };

        if let Err(err) = result {
            tracing::warn!(session = %session.id, ?action, "{err}; awaiting next trigger");
        }
    }

    /// Move the contact track forward to `target` if it is still behind.
    fn advance(
        &self,
        session: &mut Session,
        target: VisibleStage,
        trigger: Trigger,
    ) -> Result<bool> {
        let next = ContactStage::from(target);
        if session.contact_stage >= next {
            tracing::debug!(
                session = %session.id,
                stage = %session.contact_stage,
                trigger = trigger.as_str(),
                "Contact stage already reached"
            );
            return Ok(false);
        }
        // The gateway cannot tell the placeholder from the form, so only the
        // placeholder defers to a modal someone else already opened.
        if target == VisibleStage::Analyzing && self.inner.gateway.is_contact_visible() {
            tracing::debug!(session = %session.id, "Contact modal already visible");
            return Ok(false);
        }

        self.inner
            .gateway
            .render_contact_stage(target)
            .map_err(|source| DisclosureError::RenderFailure {
                target: RenderTarget::Contact(target),
                source,
            })?;
        session.contact_stage = next;

        tracing::info!(
            session = %session.id,
            stage = %next,
            trigger = trigger.as_str(),
            elapsed_ms = session.started_at.elapsed().as_millis() as u64,
            "Contact stage disclosed"
        );
        Ok(true)
    }

    fn show_cta(&self, session: &mut Session) -> Result<bool> {
        if session.cta_shown {
            return Ok(false);
        }

        let policy = &self.inner.config.classifier;
        let report = CtaReport {
            classification: session
                .classification
                .unwrap_or_else(|| infer_from_issues_count(session.issues_count, policy)),
            issues_count: session.issues_count.unwrap_or(0),
            domain: session.domain.clone(),
        };
        self.inner
            .gateway
            .render_cta(&report)
            .map_err(|source| DisclosureError::RenderFailure {
                target: RenderTarget::Cta,
                source,
            })?;

        session.cta_shown = true;
        session.discard();
        tracing::info!(
            session = %session.id,
            classification = %report.classification,
            issues = report.issues_count,
            "CTA shown, session complete"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingGateway, RenderCall, StaticEngine};
    use pretty_assertions::assert_eq;
    use tokio::time::sleep;

    fn machine() -> (DisclosureMachine, Arc<RecordingGateway>, Arc<StaticEngine>) {
        let gateway = Arc::new(RecordingGateway::new());
        let engine = Arc::new(StaticEngine::new());
        let machine = DisclosureMachine::new(
            DisclosureConfig::default(),
            Arc::clone(&gateway) as Arc<dyn PresentationGateway>,
            Arc::clone(&engine) as Arc<dyn ScanEngine>,
        );
        (machine, gateway, engine)
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_scan_signal_is_ignored() {
        let (machine, _gateway, _engine) = machine();
        let id = SessionId::from("scan-1");

        assert_eq!(machine.on_scan_submitted(id.clone(), "example.se").await, SignalOutcome::Armed);
        assert_eq!(machine.on_scan_submitted(id, "example.se").await, SignalOutcome::Ignored);
        assert_eq!(machine.snapshot().await.map(|s| s.pending_timers), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn signals_without_session_are_stale() {
        let (machine, gateway, _engine) = machine();

        assert_eq!(machine.on_external_message(true).await, SignalOutcome::Stale);
        assert_eq!(machine.on_contact_form_submitted().await, SignalOutcome::Stale);
        assert_eq!(
            machine
                .on_results_received(&SessionId::from("ghost"), &serde_json::json!({}))
                .await,
            SignalOutcome::Stale
        );
        sleep(Duration::from_secs(20)).await;
        assert_eq!(gateway.calls(), Vec::<RenderCall>::new());
    }

    #[tokio::test(start_paused = true)]
    async fn untrusted_message_arms_nothing() {
        let (machine, _gateway, _engine) = machine();
        machine.on_scan_submitted(SessionId::from("scan-1"), "example.se").await;

        assert_eq!(machine.on_external_message(false).await, SignalOutcome::Ignored);
        assert_eq!(machine.snapshot().await.map(|s| s.pending_timers), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn analyzing_defers_to_visible_modal() {
        let (machine, gateway, _engine) = machine();
        gateway.set_contact_visible(true);
        machine.on_scan_submitted(SessionId::from("scan-1"), "example.se").await;

        sleep(Duration::from_millis(5_500)).await;
        let snap = machine.snapshot().await.expect("session");
        assert_eq!(snap.contact_stage, ContactStage::NotStarted);
        assert!(gateway.calls().is_empty());

        sleep(Duration::from_secs(2)).await;
        assert_eq!(
            gateway.calls(),
            vec![RenderCall::Contact(VisibleStage::FormShown)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cta_disabled_by_config() {
        let gateway = Arc::new(RecordingGateway::new());
        let config = DisclosureConfig {
            enable_cta: false,
            ..DisclosureConfig::default()
        };
        let machine = DisclosureMachine::new(
            config,
            Arc::clone(&gateway) as Arc<dyn PresentationGateway>,
            Arc::new(StaticEngine::new()),
        );
        machine.on_scan_submitted(SessionId::from("scan-1"), "example.se").await;

        assert_eq!(machine.on_contact_form_submitted().await, SignalOutcome::Ignored);
        sleep(Duration::from_secs(15)).await;
        assert_eq!(gateway.cta_reports(), Vec::new());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_disarms_active_session() {
        let (machine, gateway, _engine) = machine();
        machine.on_scan_submitted(SessionId::from("scan-1"), "example.se").await;

        machine.shutdown().await;
        sleep(Duration::from_secs(15)).await;

        assert!(machine.snapshot().await.is_none());
        assert!(gateway.calls().is_empty());
    }
}
