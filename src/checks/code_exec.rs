//! timing-based blind code-execution detection
//!
//! Injects time-delay payloads and infers evaluation from the response-time
//! side channel. Signals are only believed after a confirmation round that
//! re-measures both the fast and the slow case, and endpoints are reported at
//! most once per scan session regardless of how many insertion points they
//! expose.
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use super::{ActiveCheck, ScanContext};
use crate::issues::{Confidence, Issue, IssueSink, ScanMessage, Severity};
use crate::payloads::{candidate_payloads, Template, TIME_SLOT};
use crate::requests::InsertionPoint;
use crate::responses::AttackResult;
use crate::state::ReportedTargets;
use crate::std_ext::Named;

const CODE_EXEC_CHECK_NAME: &str = "CodeExecCheck";

/// category name under which blind code execution is reported
pub const CODE_INJECTION: &str = "Code injection";

/// tunable timing thresholds for the delay oracle
///
/// The defaults assume network/application jitter stays below
/// [`jitter_secs`](Self::jitter_secs); environments with noisier paths should
/// widen the margins rather than live with false positives.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CodeExecConfig {
    /// how long injected payloads ask the target to sleep, in seconds
    pub sleep_secs: u64,

    /// how much ambient slowdown is tolerated before a confirmation round is
    /// considered contaminated, in seconds
    pub jitter_secs: f64,

    /// how far above the reference measurement a delayed response must land,
    /// in seconds
    pub margin_secs: f64,

    /// absolute minimum a delayed response must exceed regardless of the
    /// reference measurement, in seconds
    pub floor_secs: f64,
}

impl Default for CodeExecConfig {
    fn default() -> Self {
        Self {
            sleep_secs: 11,
            jitter_secs: 4.0,
            margin_secs: 6.0,
            floor_secs: 10.0,
        }
    }
}

/// detects blind code execution via the response-time side channel
#[derive(Clone, Debug)]
pub struct CodeExecCheck {
    config: CodeExecConfig,
    reported: Arc<ReportedTargets>,
}

impl CodeExecCheck {
    /// create the check, seeding the reported-target registry from the sink's
    /// previously emitted findings so endpoints aren't re-reported across scan
    /// sessions
    pub fn new(sink: &dyn IssueSink, reported: Arc<ReportedTargets>) -> Self {
        reported.seed_from_sink(sink, CODE_INJECTION);

        Self {
            config: CodeExecConfig::default(),
            reported,
        }
    }

    /// override the timing thresholds
    #[must_use]
    pub fn with_config(mut self, config: CodeExecConfig) -> Self {
        self.config = config;

        self
    }

    /// render the payload template with the given sleep duration and send it
    fn timed_attack(
        &self,
        ctx: &ScanContext<'_>,
        insertion_point: &dyn InsertionPoint,
        payload_template: &str,
        sleep_secs: u64,
    ) -> Option<(f64, AttackResult)> {
        let mut values = HashMap::new();
        values.insert(TIME_SLOT, sleep_secs.to_string());

        let payload = match Template::new(payload_template).substitute(&values) {
            Ok(payload) => payload,
            Err(error) => {
                debug!(%error, payload_template, "payload failed substitution; skipping");

                return None;
            }
        };

        let attack = ctx.attack(insertion_point, &payload);

        debug!(
            elapsed = attack.elapsed_secs(),
            %payload,
            "timed attack round trip"
        );

        Some((attack.elapsed_secs(), attack))
    }

    /// a delayed response is a signal only beyond this bound: the reference
    /// time plus the margin, but never below the absolute floor
    fn threshold(&self, reference_secs: f64) -> f64 {
        (reference_secs + self.config.margin_secs).max(self.config.floor_secs)
    }
}

impl Named for CodeExecCheck {
    fn name(&self) -> &str {
        CODE_EXEC_CHECK_NAME
    }
}

impl ActiveCheck for CodeExecCheck {
    #[instrument(skip_all, level = "trace")]
    fn active_scan(
        &self,
        ctx: &ScanContext<'_>,
        insertion_point: &dyn InsertionPoint,
    ) -> Vec<Issue> {
        let baseline = ctx.baseline();

        let Ok(url) = baseline.url() else {
            return Vec::new();
        };

        let candidates = candidate_payloads(&url);

        // one reference sample per scan invocation, taken with the first
        // usable payload at sleep=0
        let mut base_time: Option<f64> = None;

        for payload in candidates {
            let base = match base_time {
                Some(seconds) => seconds,
                None => {
                    let Some((seconds, _)) = self.timed_attack(ctx, insertion_point, payload, 0)
                    else {
                        continue;
                    };

                    base_time = Some(seconds);

                    seconds
                }
            };

            let Some((delayed, _)) =
                self.timed_attack(ctx, insertion_point, payload, self.config.sleep_secs)
            else {
                continue;
            };

            if delayed <= self.threshold(base) {
                continue;
            }

            debug!("suspicious delay detected; confirming it's consistent");

            let Some((dummy_time, dummy_attack)) =
                self.timed_attack(ctx, insertion_point, payload, 0)
            else {
                continue;
            };

            if !dummy_attack.has_response() {
                debug!("received empty response to baseline request; abandoning attack");

                break;
            }

            // an inflated fast measurement means everything slowed down, which
            // would make the re-measurement below meaningless
            if dummy_time >= base + self.config.jitter_secs {
                continue;
            }

            let Some((timer, attack)) =
                self.timed_attack(ctx, insertion_point, payload, self.config.sleep_secs)
            else {
                continue;
            };

            if timer > self.threshold(dummy_time) {
                debug!("code execution confirmed");

                if !self.reported.insert(CODE_INJECTION, &url) {
                    debug!(%url, "skipping report; endpoint already reported");

                    break;
                }

                let detail = format!(
                    "The application appears to evaluate user input as code.<p> It was \
                     instructed to sleep for 0 seconds, and a response time of \
                     <b>{dummy_time:.2}</b> seconds was observed. <br/>It was then instructed \
                     to sleep for {} seconds, which resulted in a response time of \
                     <b>{timer:.2}</b> seconds",
                    self.config.sleep_secs
                );

                return vec![Issue::new(
                    baseline.service().clone(),
                    url,
                    vec![ScanMessage::from(&dummy_attack), ScanMessage::from(&attack)],
                    CODE_INJECTION,
                    detail,
                    Confidence::Firm,
                    Severity::High,
                )];
            }
        }

        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{baseline, FnTransport, RecordingSink, SpliceInsertionPoint};
    use super::*;
    use crate::requests::HttpService;
    use crate::responses::AttackResponse;
    use std::time::Duration;

    const BASE_REQUEST: &str = "GET /app.php?a=x&b=y HTTP/1.1\r\nHost: example.com\r\n\r\n";

    fn insertion_point(name: &str) -> SpliceInsertionPoint {
        match name {
            "a" => SpliceInsertionPoint::new(
                "a",
                "x",
                "GET /app.php?a=",
                "&b=y HTTP/1.1\r\nHost: example.com\r\n\r\n",
            ),
            _ => SpliceInsertionPoint::new(
                "b",
                "y",
                "GET /app.php?a=x&b=",
                " HTTP/1.1\r\nHost: example.com\r\n\r\n",
            ),
        }
    }

    /// sleeps for 11 "seconds" whenever the injected payload asks for an
    /// 11-second delay, and answers quickly otherwise
    fn sleepy_transport() -> FnTransport {
        FnTransport::new(|_service: &HttpService, request: &[u8]| {
            let text = String::from_utf8_lossy(request);

            let elapsed = if text.contains("11") {
                Duration::from_secs(11)
            } else {
                Duration::from_millis(100)
            };

            AttackResponse::new(Some(b"<html>done</html>".to_vec()), elapsed)
        })
    }

    fn fast_transport() -> FnTransport {
        FnTransport::new(|_service: &HttpService, _request: &[u8]| {
            AttackResponse::new(Some(b"<html>done</html>".to_vec()), Duration::from_millis(100))
        })
    }

    /// a consistently delayed endpoint is confirmed and reported exactly once
    /// across insertion points targeting the same url
    #[test]
    fn confirmed_delay_reports_once_per_url() {
        let transport = sleepy_transport();
        let sink = RecordingSink::default();
        let reported = Arc::new(ReportedTargets::new());
        let check = CodeExecCheck::new(&sink, Arc::clone(&reported));

        let pair = baseline(BASE_REQUEST, "<html>done</html>");
        let ctx = ScanContext::new(&pair, &transport);

        let issues = check.active_scan(&ctx, &insertion_point("a"));

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].name(), CODE_INJECTION);
        assert_eq!(issues[0].severity(), Severity::High);
        assert_eq!(issues[0].confidence(), Confidence::Firm);
        // dummy exchange + confirming exchange
        assert_eq!(issues[0].messages().len(), 2);
        assert!(issues[0].detail().contains("11"));

        // second insertion point on the same endpoint: suppressed by the registry
        let issues = check.active_scan(&ctx, &insertion_point("b"));

        assert!(issues.is_empty());
    }

    /// sub-threshold response times never produce a finding, no matter how
    /// many payloads are tried
    #[test]
    fn fast_responses_are_never_findings() {
        let transport = fast_transport();
        let sink = RecordingSink::default();
        let check = CodeExecCheck::new(&sink, Arc::new(ReportedTargets::new()));

        let pair = baseline(BASE_REQUEST, "<html>done</html>");
        let ctx = ScanContext::new(&pair, &transport);

        assert!(check.active_scan(&ctx, &insertion_point("a")).is_empty());
        assert!(transport.requests_sent() > 0);
    }

    /// findings already present in the sink suppress re-probing of the endpoint
    #[test]
    fn registry_is_seeded_from_sink() {
        use crate::issues::ScanMessage;

        let transport = sleepy_transport();
        let pair = baseline(BASE_REQUEST, "<html>done</html>");

        let sink = RecordingSink::default();
        sink.report(Issue::new(
            pair.service().clone(),
            pair.url().unwrap(),
            vec![ScanMessage::from(&pair)],
            CODE_INJECTION,
            "previously reported",
            Confidence::Firm,
            Severity::High,
        ));

        let check = CodeExecCheck::new(&sink, Arc::new(ReportedTargets::new()));
        let ctx = ScanContext::new(&pair, &transport);

        assert!(check.active_scan(&ctx, &insertion_point("a")).is_empty());
    }

    /// a transport that goes quiet mid-confirmation aborts the scan instead of
    /// reporting on garbage
    #[test]
    fn absent_confirmation_response_abandons() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_closure = Arc::clone(&calls);

        // trigger fires (call 2 is slow), then the dummy confirmation (call 3)
        // comes back empty
        let transport = FnTransport::new(move |_service: &HttpService, request: &[u8]| {
            let call = calls_in_closure.fetch_add(1, Ordering::SeqCst);
            let text = String::from_utf8_lossy(request);

            if call == 2 {
                return AttackResponse::absent(Duration::from_millis(100));
            }

            let elapsed = if text.contains("11") {
                Duration::from_secs(11)
            } else {
                Duration::from_millis(100)
            };

            AttackResponse::new(Some(b"<html>done</html>".to_vec()), elapsed)
        });

        let sink = RecordingSink::default();
        let check = CodeExecCheck::new(&sink, Arc::new(ReportedTargets::new()));

        let pair = baseline(BASE_REQUEST, "<html>done</html>");
        let ctx = ScanContext::new(&pair, &transport);

        assert!(check.active_scan(&ctx, &insertion_point("a")).is_empty());
        // base, trigger, dummy — and nothing after the abandon
        assert_eq!(transport.requests_sent(), 3);
    }
}
