//! generic fuzz trigger
//!
//! One fixed metacharacter soup; if it bends the page's structure, the exchange
//! is handed to passive analysis so error-message checks get a look at it. No
//! finding is ever emitted directly. Stacks nicely with error-message analyzers
//! living behind the passive sink.
use tracing::{debug, instrument};

use super::{ActiveCheck, ScanContext};
use crate::fingerprint::Fingerprint;
use crate::issues::Issue;
use crate::requests::InsertionPoint;
use crate::std_ext::Named;

const SIMPLE_FUZZ_CHECK_NAME: &str = "SimpleFuzzCheck";

// quotes, escapes, tag/bracket openers, and template-expression fragments for
// several engines, all in one payload
const FUZZ_PAYLOAD: &str = "a'a\\'b\"c>?>%}}%%>c<[[?${{%}}cake\\";

/// surfaces latent error conditions to out-of-band analysis
#[derive(Clone, Copy, Debug, Default)]
pub struct SimpleFuzzCheck;

impl SimpleFuzzCheck {
    /// create the check
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Named for SimpleFuzzCheck {
    fn name(&self) -> &str {
        SIMPLE_FUZZ_CHECK_NAME
    }
}

impl ActiveCheck for SimpleFuzzCheck {
    #[instrument(skip_all, level = "trace")]
    fn active_scan(
        &self,
        ctx: &ScanContext<'_>,
        insertion_point: &dyn InsertionPoint,
    ) -> Vec<Issue> {
        let attack = ctx.attack(insertion_point, FUZZ_PAYLOAD);

        let base_print = Fingerprint::from_body(&ctx.baseline().response_text());
        let attack_print = Fingerprint::from_body(&attack.response_text());

        if attack_print != base_print {
            debug!("page structure changed under fuzz; handing exchange to passive analysis");

            ctx.launch_passive_scan(&attack);
        }

        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{baseline, FnTransport, RecordingPassiveSink, SpliceInsertionPoint};
    use super::*;
    use crate::requests::HttpService;
    use crate::responses::AttackResponse;
    use std::time::Duration;

    const BASE_REQUEST: &str = "GET /page?q=hello HTTP/1.1\r\nHost: example.com\r\n\r\n";
    const BASE_RESPONSE: &str = "<html><p>hello</p></html>";

    fn insertion_point() -> SpliceInsertionPoint {
        SpliceInsertionPoint::new(
            "q",
            "hello",
            "GET /page?q=",
            " HTTP/1.1\r\nHost: example.com\r\n\r\n",
        )
    }

    /// a structural change forwards the exchange, and nothing is reported
    #[test]
    fn structural_change_feeds_passive_analysis() {
        let transport = FnTransport::new(|_service: &HttpService, request: &[u8]| {
            let text = String::from_utf8_lossy(request);

            let body = if text.contains("cake") {
                "<html><div><pre>syntax error near 'a</pre></div></html>"
            } else {
                BASE_RESPONSE
            };

            AttackResponse::new(Some(body.as_bytes().to_vec()), Duration::from_millis(20))
        });

        let passive = RecordingPassiveSink::default();
        let pair = baseline(BASE_REQUEST, BASE_RESPONSE);
        let ctx = ScanContext::new(&pair, &transport).with_passive_sink(&passive);

        let issues = SimpleFuzzCheck::new().active_scan(&ctx, &insertion_point());

        assert!(issues.is_empty());
        assert_eq!(passive.exchanges(), 1);
    }

    /// a structurally identical page is left alone
    #[test]
    fn stable_page_is_ignored() {
        let transport = FnTransport::constant(BASE_RESPONSE);
        let passive = RecordingPassiveSink::default();
        let pair = baseline(BASE_REQUEST, BASE_RESPONSE);
        let ctx = ScanContext::new(&pair, &transport).with_passive_sink(&passive);

        let issues = SimpleFuzzCheck::new().active_scan(&ctx, &insertion_point());

        assert!(issues.is_empty());
        assert_eq!(passive.exchanges(), 0);
        assert_eq!(transport.requests_sent(), 1);
    }

    /// an absent response differs structurally but can't be forwarded
    #[test]
    fn absent_response_is_not_forwarded() {
        let transport = FnTransport::new(|_service: &HttpService, _request: &[u8]| {
            AttackResponse::absent(Duration::from_millis(20))
        });

        let passive = RecordingPassiveSink::default();
        let pair = baseline(BASE_REQUEST, BASE_RESPONSE);
        let ctx = ScanContext::new(&pair, &transport).with_passive_sink(&passive);

        let issues = SimpleFuzzCheck::new().active_scan(&ctx, &insertion_point());

        assert!(issues.is_empty());
        assert_eq!(passive.exchanges(), 0);
    }
}
