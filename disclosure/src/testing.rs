//! Test doubles: a spy presentation gateway and a scriptable scan engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::gateway::{EngineEvent, GatewayError, PresentationGateway, ScanEngine};
use crate::types::{CtaReport, VisibleStage};

/// A render call observed by [`RecordingGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderCall {
    Contact(VisibleStage),
    Cta(CtaReport),
}

#[derive(Debug, Default)]
struct SpyState {
    calls: Vec<(Instant, RenderCall)>,
    contact_visible: bool,
    failing_contact_renders: u32,
    failing_cta_renders: u32,
}

/// Presentation gateway that records every successful render call.
///
/// A successful contact render makes the modal visible. Failures can be
/// injected for the next N contact or CTA renders; failed calls are not
/// recorded.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    state: Mutex<SpyState>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SpyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.state().calls.iter().map(|(_, call)| call.clone()).collect()
    }

    /// Calls paired with the (virtual) instant they happened.
    pub fn timed_calls(&self) -> Vec<(Instant, RenderCall)> {
        self.state().calls.clone()
    }

    pub fn form_renders(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|(_, call)| *call == RenderCall::Contact(VisibleStage::FormShown))
            .count()
    }

    pub fn cta_reports(&self) -> Vec<CtaReport> {
        self.state()
            .calls
            .iter()
            .filter_map(|(_, call)| match call {
                RenderCall::Cta(report) => Some(report.clone()),
                RenderCall::Contact(_) => None,
            })
            .collect()
    }

    pub fn set_contact_visible(&self, visible: bool) {
        self.state().contact_visible = visible;
    }

    pub fn fail_next_contact_renders(&self, count: u32) {
        self.state().failing_contact_renders = count;
    }

    pub fn fail_next_cta_renders(&self, count: u32) {
        self.state().failing_cta_renders = count;
    }
}

impl PresentationGateway for RecordingGateway {
    fn render_contact_stage(&self, stage: VisibleStage) -> Result<(), GatewayError> {
        let mut state = self.state();
        if state.failing_contact_renders > 0 {
            state.failing_contact_renders -= 1;
            return Err(GatewayError::new("injected contact render failure"));
        }
        state.contact_visible = true;
        state.calls.push((Instant::now(), RenderCall::Contact(stage)));
        Ok(())
    }

    fn render_cta(&self, report: &CtaReport) -> Result<(), GatewayError> {
        let mut state = self.state();
        if state.failing_cta_renders > 0 {
            state.failing_cta_renders -= 1;
            return Err(GatewayError::new("injected CTA render failure"));
        }
        state.calls.push((Instant::now(), RenderCall::Cta(report.clone())));
        Ok(())
    }

    fn is_contact_visible(&self) -> bool {
        self.state().contact_visible
    }
}

/// Scan engine whose events are published by the test.
#[derive(Debug)]
pub struct StaticEngine {
    scan_active: AtomicBool,
    events: Mutex<Option<broadcast::Sender<EngineEvent>>>,
}

impl Default for StaticEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticEngine {
    /// Events buffered per subscriber before it starts lagging.
    pub const EVENT_CAPACITY: usize = 16;

    pub fn new() -> Self {
        let (events, _) = broadcast::channel(Self::EVENT_CAPACITY);
        Self {
            scan_active: AtomicBool::new(true),
            events: Mutex::new(Some(events)),
        }
    }

    fn events(&self) -> MutexGuard<'_, Option<broadcast::Sender<EngineEvent>>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_scan_active(&self, active: bool) {
        self.scan_active.store(active, Ordering::SeqCst);
    }

    /// Publish an event; returns how many subscribers received it.
    pub fn publish(&self, event: EngineEvent) -> usize {
        self.events()
            .as_ref()
            .map_or(0, |tx| tx.send(event).unwrap_or(0))
    }

    /// Drop the sender so every subscriber sees the stream end.
    pub fn close_events(&self) {
        self.events().take();
    }
}

impl ScanEngine for StaticEngine {
    fn is_scan_active(&self) -> bool {
        self.scan_active.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        match self.events().as_ref() {
            Some(tx) => tx.subscribe(),
            // Closed engine: hand out a receiver whose sender is already gone.
            None => broadcast::channel(1).1,
        }
    }
}
