//! Scanner disclosure orchestration
//!
//! Decides when an accessibility-scanner widget shows its contact form and
//! its compliance CTA banner. Several unordered signals (scan submitted,
//! results processed, iframe message, contact form submitted, elapsed time)
//! race to trigger each disclosure; the state machine guarantees each one
//! happens exactly once per scan session, with a failsafe deadline for when
//! every signal is lost.
//!
//! The widget itself is reached only through two seams: a
//! [`PresentationGateway`] that renders and a [`ScanEngine`] that publishes
//! events. [`DisclosureService`] subscribes to the engine and drives the
//! [`DisclosureMachine`].

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod classifier;
pub mod config;
pub mod error;
pub mod gateway;
pub mod machine;
pub mod service;
pub mod session;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use classifier::{Basis, ClassifierPolicy, ScanPayload, Verdict, classify, classify_json};
pub use crate::config::{ConfigLoader, DisclosureConfig};
pub use error::{Dependency, DisclosureError, Result};
pub use gateway::{EngineEvent, GatewayError, PresentationGateway, ScanEngine};
pub use machine::DisclosureMachine;
pub use service::{Dependencies, DisclosureService, PageEvent};
pub use session::SessionSnapshot;
pub use types::{Classification, ContactStage, CtaReport, SessionId, SignalOutcome, VisibleStage};
