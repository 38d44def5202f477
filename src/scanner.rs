//! drives a set of checks against one (baseline, insertion point) pairing
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::checks::{
    ActiveCheck, CodeExecCheck, CodePathCheck, HostHeaderCheck, JetLeakCheck, ScanContext,
    SimpleFuzzCheck, TransformCheck,
};
use crate::client::Transport;
use crate::issues::{is_same_issue, Issue, IssueSink, PassiveScanSink};
use crate::requests::{BaselinePair, InsertionPoint};
use crate::state::ReportedTargets;
use crate::std_ext::Named;

/// runs registered checks in sequence and delivers their confirmed findings to
/// the issue sink, suppressing category-level duplicates
///
/// One `scan` call is one active-scan invocation: the host decides which
/// baseline and insertion point to pass and when. Within an invocation every
/// attack request is serialized; separate invocations may run concurrently
/// from host threads, sharing only the reported-target registry.
///
/// # Examples
///
/// ```no_run
/// # use std::sync::Arc;
/// # use feroxscan::client::BlockingClient;
/// # use feroxscan::issues::{Issue, IssueSink};
/// # use feroxscan::requests::{BaselinePair, HttpService, Scheme};
/// # use feroxscan::scanner::ActiveScanner;
/// # #[derive(Default)]
/// # struct MemorySink;
/// # impl IssueSink for MemorySink {
/// #     fn report(&self, _issue: Issue) {}
/// #     fn existing_issues(&self, _name: &str) -> Vec<Issue> { Vec::new() }
/// # }
/// # struct Param;
/// # impl feroxscan::requests::InsertionPoint for Param {
/// #     fn name(&self) -> &str { "q" }
/// #     fn base_value(&self) -> &str { "1" }
/// #     fn build_request(&self, payload: &str) -> Vec<u8> {
/// #         format!("GET /?q={payload} HTTP/1.1\r\nHost: example.com\r\n\r\n").into_bytes()
/// #     }
/// # }
/// let sink: Arc<dyn IssueSink> = Arc::new(MemorySink::default());
/// let scanner =
///     ActiveScanner::with_default_checks(Box::new(BlockingClient::default()), sink);
///
/// let baseline = BaselinePair::new(
///     b"GET /?q=1 HTTP/1.1\r\nHost: example.com\r\n\r\n".to_vec(),
///     b"<html>example.com</html>".to_vec(),
///     HttpService::new("example.com", 80, Scheme::Http),
/// );
///
/// let delivered = scanner.scan(&baseline, &Param);
/// # let _ = delivered;
/// ```
#[derive(Clone)]
pub struct ActiveScanner {
    checks: Vec<Box<dyn ActiveCheck>>,
    transport: Box<dyn Transport>,
    issues: Arc<dyn IssueSink>,
    passive: Option<Arc<dyn PassiveScanSink>>,
}

impl ActiveScanner {
    /// a scanner with no checks registered yet
    #[must_use]
    pub fn new(transport: Box<dyn Transport>, issues: Arc<dyn IssueSink>) -> Self {
        Self {
            checks: Vec::new(),
            transport,
            issues,
            passive: None,
        }
    }

    /// a scanner carrying the full built-in check catalog
    #[must_use]
    pub fn with_default_checks(transport: Box<dyn Transport>, issues: Arc<dyn IssueSink>) -> Self {
        let mut scanner = Self::new(transport, issues);

        let reported = Arc::new(ReportedTargets::new());
        let code_exec = CodeExecCheck::new(scanner.issues.as_ref(), reported);

        scanner.register(Box::new(HostHeaderCheck::new()));
        scanner.register(Box::new(CodePathCheck::new()));
        scanner.register(Box::new(code_exec));
        scanner.register(Box::new(TransformCheck::new()));
        scanner.register(Box::new(SimpleFuzzCheck::new()));
        scanner.register(Box::new(JetLeakCheck::new()));

        scanner
    }

    /// attach a passive-analysis sink
    #[must_use]
    pub fn passive_sink(mut self, sink: Arc<dyn PassiveScanSink>) -> Self {
        self.passive = Some(sink);

        self
    }

    /// add a check to the end of the run order
    pub fn register(&mut self, check: Box<dyn ActiveCheck>) {
        self.checks.push(check);
    }

    /// run every check against the pairing, reporting what survives duplicate
    /// suppression; returns how many findings were delivered to the sink
    #[instrument(skip_all, level = "trace")]
    pub fn scan(&self, baseline: &BaselinePair, insertion_point: &dyn InsertionPoint) -> usize {
        let mut context = ScanContext::new(baseline, self.transport.as_ref());

        if let Some(passive) = &self.passive {
            context = context.with_passive_sink(passive.as_ref());
        }

        let mut delivered = 0;

        for check in &self.checks {
            debug!(check = check.name(), "running check");

            for issue in check.active_scan(&context, insertion_point) {
                if self.is_duplicate(&issue) {
                    debug!(name = issue.name(), "suppressing duplicate finding");

                    continue;
                }

                info!(name = issue.name(), url = %issue.url(), "reporting finding");

                self.issues.report(issue);
                delivered += 1;
            }
        }

        delivered
    }

    fn is_duplicate(&self, issue: &Issue) -> bool {
        self.issues
            .existing_issues(issue.name())
            .iter()
            .any(|existing| is_same_issue(existing, issue))
    }
}
