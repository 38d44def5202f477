//! active-scan checks: one self-contained decision strategy each
//!
//! A check receives a [`ScanContext`] (the baseline exchange plus the wire) and
//! an [`InsertionPoint`], sends zero or more serialized attack requests, and
//! returns zero or more confirmed [`Issue`]s. Checks are isolated from each
//! other: a check that finds nothing — because a precondition failed, the
//! transport went quiet, or a confirmation round didn't reproduce — simply
//! returns an empty list.
mod code_exec;
mod code_path;
mod fuzz;
mod host_header;
mod jetleak;
mod transform;

pub use self::code_exec::{CodeExecCheck, CodeExecConfig, CODE_INJECTION};
pub use self::code_path::CodePathCheck;
pub use self::fuzz::SimpleFuzzCheck;
pub use self::host_header::HostHeaderCheck;
pub use self::jetleak::JetLeakCheck;
pub use self::transform::TransformCheck;

// re-exported trait, to be available as a `checks` module import for users;
// most hosts implementing their own check will want it alongside ActiveCheck
pub use crate::std_ext::Named;

use std::time::Instant;

use dyn_clone::DynClone;
use tracing::{instrument, warn};

use crate::client::Transport;
use crate::issues::{Issue, PassiveScanSink};
use crate::requests::{BaselinePair, InsertionPoint};
use crate::responses::{AttackResponse, AttackResult};

/// a detection strategy that can be run against one (baseline, insertion point)
/// pairing
pub trait ActiveCheck: DynClone + Named + Send + Sync {
    /// run the strategy; returns every finding it confirmed, which is usually
    /// none and never speculative
    fn active_scan(
        &self,
        ctx: &ScanContext<'_>,
        insertion_point: &dyn InsertionPoint,
    ) -> Vec<Issue>;
}

impl Clone for Box<dyn ActiveCheck> {
    fn clone(&self) -> Self {
        dyn_clone::clone_box(&**self)
    }
}

/// everything a check needs for one scan invocation: the baseline snapshot,
/// the transport to attack over, and the optional passive-analysis sink
///
/// Also the attack executor: [`attack`](Self::attack) and
/// [`send_raw`](Self::send_raw) dispatch one mutated request each, time the
/// exchange, and absorb transport failures into inconclusive (absent)
/// responses so strategies never see an error channel.
pub struct ScanContext<'a> {
    baseline: &'a BaselinePair,
    transport: &'a dyn Transport,
    passive: Option<&'a dyn PassiveScanSink>,
}

impl<'a> ScanContext<'a> {
    /// pair a baseline snapshot with the transport to attack over
    #[must_use]
    pub const fn new(baseline: &'a BaselinePair, transport: &'a dyn Transport) -> Self {
        Self {
            baseline,
            transport,
            passive: None,
        }
    }

    /// attach a passive-analysis sink
    #[must_use]
    pub const fn with_passive_sink(mut self, sink: &'a dyn PassiveScanSink) -> Self {
        self.passive = Some(sink);

        self
    }

    /// the invocation's baseline snapshot
    #[must_use]
    pub const fn baseline(&self) -> &'a BaselinePair {
        self.baseline
    }

    /// substitute `payload` at the insertion point and send the result
    ///
    /// the payload's location in the built request is marked for evidence,
    /// preferring the host's own offsets when it can provide them
    #[instrument(skip_all, level = "trace")]
    pub fn attack(&self, insertion_point: &dyn InsertionPoint, payload: &str) -> AttackResult {
        let request = insertion_point.build_request(payload);
        let response = self.dispatch(&request);

        let mut result = AttackResult::new(request, response);

        match insertion_point.payload_offsets(payload) {
            Some(range) => result.highlight_request_range(range),
            None => result.highlight_request_value(payload),
        }

        result
    }

    /// send pre-built request bytes
    ///
    /// every `highlight` value's occurrences in the request are marked, as are
    /// `taint`'s occurrences in whatever response comes back
    #[instrument(skip_all, level = "trace")]
    pub fn send_raw(
        &self,
        request: Vec<u8>,
        highlights: &[String],
        taint: Option<&str>,
    ) -> AttackResult {
        let response = self.dispatch(&request);

        let mut result = AttackResult::new(request, response);

        for value in highlights {
            if !value.is_empty() {
                result.highlight_request_value(value);
            }
        }

        if let Some(taint) = taint {
            result.highlight_taint(taint);
        }

        result
    }

    fn dispatch(&self, request: &[u8]) -> AttackResponse {
        let started = Instant::now();

        match self.transport.send(self.baseline.service(), request) {
            Ok(response) => response,
            Err(error) => {
                // absence of a response is inconclusive, never a signal
                warn!(%error, "transport failure treated as inconclusive");

                AttackResponse::absent(started.elapsed())
            }
        }
    }

    /// hand an exchange to the passive-analysis sink, when one is attached and
    /// the exchange actually produced a response
    pub fn launch_passive_scan(&self, attack: &AttackResult) {
        let Some(sink) = self.passive else {
            return;
        };

        let Some(body) = attack.response().body() else {
            return;
        };

        sink.analyze(self.baseline.service(), attack.request(), body);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! scripted collaborators shared by the check tests
    use std::ops::Range;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::client::Transport;
    use crate::error::FeroxScanError;
    use crate::issues::{Issue, IssueSink, PassiveScanSink};
    use crate::requests::{BaselinePair, HttpService, InsertionPoint, Scheme};
    use crate::responses::AttackResponse;
    use crate::std_ext::Named;

    /// transport whose behavior is a function of the raw request bytes
    #[derive(Clone)]
    pub(crate) struct FnTransport {
        respond: Arc<dyn Fn(&HttpService, &[u8]) -> AttackResponse + Send + Sync>,
        sent: Arc<AtomicUsize>,
    }

    impl FnTransport {
        pub(crate) fn new<F>(respond: F) -> Self
        where
            F: Fn(&HttpService, &[u8]) -> AttackResponse + Send + Sync + 'static,
        {
            Self {
                respond: Arc::new(respond),
                sent: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// transport that answers every request with the same body, quickly
        pub(crate) fn constant(body: &str) -> Self {
            let body = body.to_string();

            Self::new(move |_, _| {
                AttackResponse::new(Some(body.clone().into_bytes()), Duration::from_millis(50))
            })
        }

        pub(crate) fn requests_sent(&self) -> usize {
            self.sent.load(Ordering::SeqCst)
        }
    }

    impl Transport for FnTransport {
        fn send(
            &self,
            service: &HttpService,
            request: &[u8],
        ) -> Result<AttackResponse, FeroxScanError> {
            self.sent.fetch_add(1, Ordering::SeqCst);

            Ok((self.respond)(service, request))
        }
    }

    /// insertion point that splices the payload between fixed request halves
    #[derive(Clone, Debug)]
    pub(crate) struct SpliceInsertionPoint {
        name: String,
        base_value: String,
        prefix: String,
        suffix: String,
    }

    impl SpliceInsertionPoint {
        pub(crate) fn new(name: &str, base_value: &str, prefix: &str, suffix: &str) -> Self {
            Self {
                name: name.to_string(),
                base_value: base_value.to_string(),
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
            }
        }
    }

    impl InsertionPoint for SpliceInsertionPoint {
        fn name(&self) -> &str {
            &self.name
        }

        fn base_value(&self) -> &str {
            &self.base_value
        }

        fn build_request(&self, payload: &str) -> Vec<u8> {
            format!("{}{}{}", self.prefix, payload, self.suffix).into_bytes()
        }

        fn payload_offsets(&self, payload: &str) -> Option<Range<usize>> {
            Some(self.prefix.len()..self.prefix.len() + payload.len())
        }
    }

    /// issue sink that remembers everything it was handed
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        issues: Mutex<Vec<Issue>>,
    }

    impl RecordingSink {
        pub(crate) fn reported(&self) -> Vec<Issue> {
            self.issues.lock().unwrap().clone()
        }

        pub(crate) fn names(&self) -> Vec<String> {
            self.reported()
                .iter()
                .map(|issue| issue.name().to_string())
                .collect()
        }
    }

    impl IssueSink for RecordingSink {
        fn report(&self, issue: Issue) {
            self.issues.lock().unwrap().push(issue);
        }

        fn existing_issues(&self, name: &str) -> Vec<Issue> {
            self.reported()
                .into_iter()
                .filter(|issue| issue.name() == name)
                .collect()
        }
    }

    /// passive sink that counts hand-offs
    #[derive(Default)]
    pub(crate) struct RecordingPassiveSink {
        exchanges: Mutex<Vec<(Vec<u8>, Vec<u8>)>>,
    }

    impl RecordingPassiveSink {
        pub(crate) fn exchanges(&self) -> usize {
            self.exchanges.lock().unwrap().len()
        }
    }

    impl PassiveScanSink for RecordingPassiveSink {
        fn analyze(&self, _service: &HttpService, request: &[u8], response: &[u8]) {
            self.exchanges
                .lock()
                .unwrap()
                .push((request.to_vec(), response.to_vec()));
        }
    }

    pub(crate) fn service() -> HttpService {
        HttpService::new("example.com", 80, Scheme::Http)
    }

    pub(crate) fn baseline(request: &str, response: &str) -> BaselinePair {
        BaselinePair::new(
            request.as_bytes().to_vec(),
            response.as_bytes().to_vec(),
            service(),
        )
    }
}
