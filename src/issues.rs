//! immutable scan findings, their supporting evidence, and the sinks they're
//! delivered to
use std::fmt::{self, Display, Formatter};
use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use url::Url;

use crate::requests::{BaselinePair, HttpService};
use crate::responses::AttackResult;
use crate::std_ext::Named;

/// how bad a confirmed finding is
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// worth knowing, not a risk by itself
    Information,

    /// low risk
    Low,

    /// medium risk
    Medium,

    /// high risk
    High,
}

/// how sure the strategy that emitted a finding is
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Confidence {
    /// a plausible signal that warrants manual review
    Tentative,

    /// confirmed behavior with a small chance of coincidence
    Firm,

    /// reproduced behavior with no plausible benign explanation
    Certain,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Information => write!(f, "Information"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

impl Display for Confidence {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tentative => write!(f, "Tentative"),
            Self::Firm => write!(f, "Firm"),
            Self::Certain => write!(f, "Certain"),
        }
    }
}

/// one request/response exchange attached to a finding as evidence
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanMessage {
    request: Vec<u8>,
    response: Option<Vec<u8>>,
    request_highlights: Vec<Range<usize>>,
    response_highlights: Vec<Range<usize>>,
}

impl ScanMessage {
    /// the exchange's request bytes
    #[must_use]
    pub fn request(&self) -> &[u8] {
        &self.request
    }

    /// the exchange's response bytes, when a response arrived
    #[must_use]
    pub fn response(&self) -> Option<&[u8]> {
        self.response.as_deref()
    }

    /// byte ranges of interest within the request
    #[must_use]
    pub fn request_highlights(&self) -> &[Range<usize>] {
        &self.request_highlights
    }

    /// byte ranges of interest within the response
    #[must_use]
    pub fn response_highlights(&self) -> &[Range<usize>] {
        &self.response_highlights
    }
}

impl From<&BaselinePair> for ScanMessage {
    fn from(baseline: &BaselinePair) -> Self {
        Self {
            request: baseline.request().to_vec(),
            response: Some(baseline.response().to_vec()),
            request_highlights: Vec::new(),
            response_highlights: Vec::new(),
        }
    }
}

impl From<&AttackResult> for ScanMessage {
    fn from(attack: &AttackResult) -> Self {
        Self {
            request: attack.request().to_vec(),
            response: attack.response().body().map(<[u8]>::to_vec),
            request_highlights: attack.request_highlights().to_vec(),
            response_highlights: attack.response_highlights().to_vec(),
        }
    }
}

/// an immutable confirmed finding
///
/// The supporting-message list always contains the exchanges that directly
/// substantiate the claim — a finding without its evidence is a bug in the
/// strategy that built it. Ownership passes to the reporting sink on emission.
#[derive(Clone, Debug)]
pub struct Issue {
    service: HttpService,
    url: Url,
    messages: Vec<ScanMessage>,
    name: String,
    detail: String,
    confidence: Confidence,
    severity: Severity,
}

impl Issue {
    /// assemble a finding
    pub fn new(
        service: HttpService,
        url: Url,
        messages: Vec<ScanMessage>,
        name: impl Into<String>,
        detail: impl Into<String>,
        confidence: Confidence,
        severity: Severity,
    ) -> Self {
        debug_assert!(
            !messages.is_empty(),
            "findings must carry their supporting evidence"
        );

        Self {
            service,
            url,
            messages,
            name: name.into(),
            detail: detail.into(),
            confidence,
            severity,
        }
    }

    /// the service the finding was confirmed against
    #[must_use]
    pub const fn service(&self) -> &HttpService {
        &self.service
    }

    /// the target url the finding applies to
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// the exchanges demonstrating the finding, in the order they were sent
    #[must_use]
    pub fn messages(&self) -> &[ScanMessage] {
        &self.messages
    }

    /// human-readable html description of the finding
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// how sure the emitting strategy is
    #[must_use]
    pub const fn confidence(&self) -> Confidence {
        self.confidence
    }

    /// how bad the finding is
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }
}

impl Named for Issue {
    /// the finding's category name, e.g. `Code injection`
    fn name(&self) -> &str {
        &self.name
    }
}

/// whether two findings describe the same issue
///
/// Deliberately coarse: category name equality, nothing else. Repeated probing
/// of the same category collapses to one report regardless of which insertion
/// point (or url) triggered it.
#[must_use]
pub fn is_same_issue(existing: &Issue, new: &Issue) -> bool {
    existing.name() == new.name()
}

/// where confirmed findings go; owned by the host application
pub trait IssueSink: Send + Sync {
    /// take ownership of one confirmed finding
    fn report(&self, issue: Issue);

    /// previously reported findings whose category name matches `name`, oldest
    /// first; used both for duplicate suppression and to seed re-probe
    /// bookkeeping across scan sessions
    fn existing_issues(&self, name: &str) -> Vec<Issue>;
}

/// fire-and-forget handoff of interesting exchanges to out-of-band analysis
pub trait PassiveScanSink: Send + Sync {
    /// analyze one exchange; must not block the calling strategy
    fn analyze(&self, service: &HttpService, request: &[u8], response: &[u8]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::Scheme;

    fn issue(name: &str, url: &str) -> Issue {
        let service = HttpService::new("example.com", 80, Scheme::Http);
        let baseline = BaselinePair::new(
            b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n".to_vec(),
            b"<html></html>".to_vec(),
            service.clone(),
        );

        Issue::new(
            service,
            Url::parse(url).unwrap(),
            vec![ScanMessage::from(&baseline)],
            name,
            "detail",
            Confidence::Tentative,
            Severity::High,
        )
    }

    /// category name alone decides duplicate-ness; url and evidence don't
    #[test]
    fn dedup_is_name_only() {
        let first = issue("Code injection", "http://example.com/a");
        let second = issue("Code injection", "http://example.com/b");
        let other = issue("Host header poisoning", "http://example.com/a");

        assert!(is_same_issue(&first, &second));
        assert!(!is_same_issue(&first, &other));
    }

    /// severities and confidences order from least to most serious
    #[test]
    fn ratings_are_ordered() {
        assert!(Severity::Information < Severity::Low);
        assert!(Severity::Medium < Severity::High);
        assert!(Confidence::Tentative < Confidence::Firm);
        assert!(Confidence::Firm < Confidence::Certain);
    }

    /// evidence from an attack keeps its highlight ranges
    #[test]
    fn attack_evidence_keeps_highlights() {
        use crate::responses::{AttackResponse, AttackResult};
        use std::time::Duration;

        let mut attack = AttackResult::new(
            b"GET /?q=tnt99 HTTP/1.1\r\n\r\n".to_vec(),
            AttackResponse::new(Some(b"tnt99".to_vec()), Duration::from_millis(3)),
        );
        attack.highlight_request_value("tnt99");
        attack.highlight_taint("tnt99");

        let message = ScanMessage::from(&attack);

        assert_eq!(message.request_highlights().len(), 1);
        assert_eq!(message.response_highlights().len(), 1);
    }
}
