//! Per-scan session state.

use scanner_async_utils::TimerSet;
use tokio::time::Instant;

use crate::classifier::Verdict;
use crate::types::{Classification, ContactStage, SessionId};

/// State of one scan attempt. Only the state machine mutates it.
#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) id: SessionId,
    pub(crate) contact_stage: ContactStage,
    pub(crate) cta_shown: bool,
    pub(crate) classification: Option<Classification>,
    pub(crate) issues_count: Option<u32>,
    pub(crate) domain: Option<String>,
    pub(crate) timers: TimerSet,
    pub(crate) started_at: Instant,
}

impl Session {
    pub(crate) fn new(id: SessionId, url: &str) -> Self {
        Self {
            id,
            contact_stage: ContactStage::NotStarted,
            cta_shown: false,
            classification: None,
            issues_count: None,
            domain: display_domain(url),
            timers: TimerSet::new(),
            started_at: Instant::now(),
        }
    }

    pub(crate) fn record_verdict(&mut self, verdict: &Verdict) {
        self.classification = Some(verdict.classification);
        self.issues_count = Some(verdict.issues_count);
    }

    /// CTA shown: nothing further happens in this session.
    pub(crate) fn is_terminal(&self) -> bool {
        self.cta_shown
    }

    /// Cancel every pending delayed action.
    pub(crate) fn discard(&self) {
        self.timers.cancel_all();
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            contact_stage: self.contact_stage,
            cta_shown: self.cta_shown,
            classification: self.classification,
            issues_count: self.issues_count,
            domain: self.domain.clone(),
            pending_timers: self.timers.pending(),
            timers_cancelled: self.timers.is_cancelled(),
        }
    }
}

/// Read-only copy of the active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub contact_stage: ContactStage,
    pub cta_shown: bool,
    pub classification: Option<Classification>,
    pub issues_count: Option<u32>,
    pub domain: Option<String>,
    pub pending_timers: usize,
    pub timers_cancelled: bool,
}

/// Host name of the scanned site, for display in the CTA.
///
/// Visitors often type a bare host ("example.se"), so a missing scheme is
/// retried as https.
pub fn display_domain(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = url::Url::parse(trimmed)
        .ok()
        .filter(|u| u.has_host())
        .or_else(|| url::Url::parse(&format!("https://{trimmed}")).ok())?;
    parsed.host_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn domain_from_full_url() {
        assert_eq!(
            display_domain("https://www.example.se/om-oss?x=1"),
            Some("www.example.se".to_string())
        );
    }

    #[test]
    fn domain_from_bare_host() {
        assert_eq!(display_domain("example.se"), Some("example.se".to_string()));
        assert_eq!(display_domain(" example.se/path "), Some("example.se".to_string()));
    }

    #[test]
    fn empty_url_has_no_domain() {
        assert_eq!(display_domain("   "), None);
    }

    #[tokio::test]
    async fn new_session_starts_untouched() {
        let session = Session::new(SessionId::from("scan-1"), "example.se");
        let snap = session.snapshot();
        assert_eq!(snap.contact_stage, ContactStage::NotStarted);
        assert!(!snap.cta_shown);
        assert_eq!(snap.classification, None);
        assert_eq!(snap.pending_timers, 0);
        assert!(!snap.timers_cancelled);
        assert!(!session.is_terminal());
    }
}
