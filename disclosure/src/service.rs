//! Signal subscription loop.
//!
//! Subscribes to the scan engine's events and to page events (iframe
//! messages, form submissions) and feeds them, one at a time and in arrival
//! order, to the [`DisclosureMachine`].

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::DisclosureConfig;
use crate::error::{Dependency, DisclosureError, Result};
use crate::gateway::{EngineEvent, PresentationGateway, ScanEngine};
use crate::machine::DisclosureMachine;

/// Buffered page events before `send` starts waiting.
const PAGE_EVENT_CAPACITY: usize = 64;

/// Browser-side signals the host page forwards to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// A `message` event; only the sender origin matters.
    CrossOriginMessage { origin: String },
    /// A form `submit` event.
    FormSubmitted { form_id: String },
}

/// Collaborator handles as currently available to the host.
#[derive(Clone, Default)]
pub struct Dependencies {
    pub gateway: Option<Arc<dyn PresentationGateway>>,
    pub engine: Option<Arc<dyn ScanEngine>>,
}

impl Dependencies {
    pub fn new(gateway: Arc<dyn PresentationGateway>, engine: Arc<dyn ScanEngine>) -> Self {
        Self {
            gateway: Some(gateway),
            engine: Some(engine),
        }
    }

    /// First collaborator that is still missing.
    pub fn missing(&self) -> Option<Dependency> {
        if self.gateway.is_none() {
            Some(Dependency::PresentationGateway)
        } else if self.engine.is_none() {
            Some(Dependency::ScanEngine)
        } else {
            None
        }
    }
}

/// Running disclosure orchestration.
pub struct DisclosureService {
    machine: DisclosureMachine,
    page_tx: mpsc::Sender<PageEvent>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl DisclosureService {
    /// Start orchestrating with the given collaborators.
    ///
    /// Fails with `MissingDependency` if either handle is absent; nothing is
    /// subscribed or armed in that case.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime, since the event loop is
    /// spawned onto the current runtime.
    pub fn start(config: DisclosureConfig, deps: Dependencies) -> Result<Self> {
        let gateway = deps.gateway.ok_or(DisclosureError::MissingDependency {
            dependency: Dependency::PresentationGateway,
        })?;
        let engine = deps.engine.ok_or(DisclosureError::MissingDependency {
            dependency: Dependency::ScanEngine,
        })?;
        config.validate()?;

        // Subscribe before spawning so no event published after `start`
        // returns can be missed.
        let events = engine.subscribe();
        let machine = DisclosureMachine::new(config, gateway, engine);
        let (page_tx, page_rx) = mpsc::channel(PAGE_EVENT_CAPACITY);
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(run(machine.clone(), events, page_rx, shutdown.clone()));
        tracing::info!("Disclosure service started");

        Ok(Self {
            machine,
            page_tx,
            shutdown,
            task,
        })
    }

    /// Wait for the host to provide both collaborators, then start.
    ///
    /// `probe` is polled every `attach.poll_interval_ms` until it reports
    /// both handles or `attach.timeout_ms` elapses.
    pub async fn attach<F>(config: DisclosureConfig, mut probe: F) -> Result<Self>
    where
        F: FnMut() -> Dependencies,
    {
        let deadline = Instant::now() + config.attach.timeout();
        loop {
            let deps = probe();
            let Some(dependency) = deps.missing() else {
                return Self::start(config, deps);
            };
            if Instant::now() >= deadline {
                tracing::warn!(%dependency, "Gave up waiting for dependency");
                return Err(DisclosureError::MissingDependency { dependency });
            }
            tracing::debug!(%dependency, "Waiting for dependency");
            tokio::time::sleep(config.attach.poll_interval()).await;
        }
    }

    pub fn machine(&self) -> &DisclosureMachine {
        &self.machine
    }

    /// Sender for hosts that forward page events from elsewhere.
    pub fn page_events(&self) -> mpsc::Sender<PageEvent> {
        self.page_tx.clone()
    }

    pub async fn send(&self, event: PageEvent) -> Result<()> {
        self.page_tx
            .send(event)
            .await
            .map_err(|_| DisclosureError::ServiceStopped)
    }

    /// Stop the loop and discard the active session.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(err) = self.task.await {
            tracing::error!("Disclosure service task failed: {err}");
        }
        tracing::info!("Disclosure service stopped");
    }
}

async fn run(
    machine: DisclosureMachine,
    mut events: broadcast::Receiver<EngineEvent>,
    mut page_rx: mpsc::Receiver<PageEvent>,
    shutdown: CancellationToken,
) {
    let mut engine_open = true;
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            event = events.recv(), if engine_open => match event {
                Ok(event) => handle_engine_event(&machine, event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Scan engine events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Scan engine closed its event stream");
                    engine_open = false;
                }
            },
            event = page_rx.recv() => match event {
                Some(event) => handle_page_event(&machine, event).await,
                None => break,
            },
        }
    }
    machine.shutdown().await;
}

async fn handle_engine_event(machine: &DisclosureMachine, event: EngineEvent) {
    match event {
        EngineEvent::ScanSubmitted { scan_id, url } => {
            machine.on_scan_submitted(scan_id, &url).await;
        }
        EngineEvent::ResultsReceived { scan_id, payload } => {
            machine.on_results_received(&scan_id, &payload).await;
        }
    }
}

async fn handle_page_event(machine: &DisclosureMachine, event: PageEvent) {
    match event {
        PageEvent::CrossOriginMessage { origin } => {
            let trusted = origin_is_trusted(&origin, machine.config().trusted_origin.as_deref());
            machine.on_external_message(trusted).await;
        }
        PageEvent::FormSubmitted { form_id } if form_id == machine.config().contact_form_id => {
            machine.on_contact_form_submitted().await;
        }
        PageEvent::FormSubmitted { form_id } => {
            tracing::debug!(%form_id, "Submission of unrelated form ignored");
        }
    }
}

/// Whether a message origin matches the configured scanner origin.
///
/// Compares scheme, host and port, so a trailing slash or path on the
/// configured value does not matter.
pub fn origin_is_trusted(origin: &str, trusted: Option<&str>) -> bool {
    let Some(trusted) = trusted else {
        return false;
    };
    match (url::Url::parse(origin), url::Url::parse(trusted)) {
        (Ok(origin), Ok(trusted)) => origin.origin() == trusted.origin(),
        _ => origin == trusted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_match_ignores_path() {
        let trusted = Some("https://ace.example.com/scan/");
        assert!(origin_is_trusted("https://ace.example.com", trusted));
        assert!(!origin_is_trusted("https://evil.example.com", trusted));
        assert!(!origin_is_trusted("http://ace.example.com", trusted));
        assert!(!origin_is_trusted("https://ace.example.com:8443", trusted));
    }

    #[test]
    fn nothing_is_trusted_without_configuration() {
        assert!(!origin_is_trusted("https://ace.example.com", None));
    }

    #[test]
    fn missing_reports_gateway_first() {
        assert_eq!(
            Dependencies::default().missing(),
            Some(Dependency::PresentationGateway)
        );
    }
}
