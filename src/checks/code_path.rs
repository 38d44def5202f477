//! content-type code-path probing
//!
//! Swaps the request's `Content-Type` to `application/xml` and watches whether
//! the page's structure changes. A bogus `application/zml` control swap
//! separates "the server parses xml" from "the server reacts to any
//! content-type it doesn't expect".
use tracing::{debug, instrument};

use super::{ActiveCheck, ScanContext};
use crate::fingerprint::Fingerprint;
use crate::issues::{Confidence, Issue, ScanMessage, Severity};
use crate::requests::{raw, InsertionPoint};
use crate::responses::AttackResult;
use crate::std_ext::Named;

const CODE_PATH_CHECK_NAME: &str = "CodePathCheck";

const XML_CONTENT_TYPE: &str = "application/xml";
const CONTROL_CONTENT_TYPE: &str = "application/zml";

const XML_SUPPORTED_ISSUE: &str = "XML input supported";

const XML_SUPPORTED_DETAIL: &str = "The application appears to handle application/xml input. \
    Consider investigating whether it's vulnerable to typical XML parsing attacks such as XXE.";

/// probes whether the application routes `application/xml` bodies down a
/// distinct code path
///
/// A positive result also hands the xml-variant exchange to the passive-scan
/// sink for independent analysis. As a whole-request attack, it runs only when
/// invoked for the request's first insertion point.
#[derive(Clone, Copy, Debug, Default)]
pub struct CodePathCheck;

impl CodePathCheck {
    /// create the check
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// swap the content type and observe the resulting page structure
    ///
    /// `None` when the baseline has no `Content-Type` header to swap, or when
    /// the swap would be a no-op (nothing to observe either way)
    fn swap(&self, ctx: &ScanContext<'_>, content_type: &str) -> Option<(Fingerprint, AttackResult)> {
        let request =
            raw::set_header(ctx.baseline().request(), "Content-Type", content_type).ok()?;

        if request == ctx.baseline().request() {
            return None;
        }

        let attack = ctx.send_raw(request, &[content_type.to_string()], None);
        let print = Fingerprint::from_body(&attack.response_text());

        Some((print, attack))
    }
}

impl Named for CodePathCheck {
    fn name(&self) -> &str {
        CODE_PATH_CHECK_NAME
    }
}

impl ActiveCheck for CodePathCheck {
    #[instrument(skip_all, level = "trace")]
    fn active_scan(
        &self,
        ctx: &ScanContext<'_>,
        insertion_point: &dyn InsertionPoint,
    ) -> Vec<Issue> {
        let baseline = ctx.baseline();

        // whole-request attack; run it once per baseline
        if raw::first_insertion_point_name(baseline.request()).as_deref()
            != Some(insertion_point.name())
        {
            return Vec::new();
        }

        let Ok(url) = baseline.url() else {
            return Vec::new();
        };

        let base_print = Fingerprint::from_body(&baseline.response_text());

        let Some((xml_print, xml_attack)) = self.swap(ctx, XML_CONTENT_TYPE) else {
            return Vec::new();
        };

        if xml_print == base_print {
            return Vec::new();
        }

        debug!("xml content type changed the page; sending the control swap");

        let Some((control_print, control_attack)) = self.swap(ctx, CONTROL_CONTENT_TYPE) else {
            return Vec::new();
        };

        if control_print == xml_print {
            // the server reacts to any swapped content type; not an xml code path
            return Vec::new();
        }

        ctx.launch_passive_scan(&xml_attack);

        vec![Issue::new(
            baseline.service().clone(),
            url,
            vec![
                ScanMessage::from(baseline),
                ScanMessage::from(&xml_attack),
                ScanMessage::from(&control_attack),
            ],
            XML_SUPPORTED_ISSUE,
            XML_SUPPORTED_DETAIL,
            Confidence::Tentative,
            Severity::Information,
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{baseline, FnTransport, RecordingPassiveSink, SpliceInsertionPoint};
    use super::*;
    use crate::requests::HttpService;
    use crate::responses::AttackResponse;
    use std::time::Duration;

    const BASE_REQUEST: &str = "POST /submit HTTP/1.1\r\nHost: example.com\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\nq=hello";
    const BASE_RESPONSE: &str = "<html><p>thanks</p></html>";
    const XML_ERROR_RESPONSE: &str = "<html><div><pre>unexpected element</pre></div></html>";

    fn insertion_point() -> SpliceInsertionPoint {
        SpliceInsertionPoint::new(
            "q",
            "hello",
            "POST /submit HTTP/1.1\r\nHost: example.com\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\nq=",
            "",
        )
    }

    fn page(body: &str) -> AttackResponse {
        AttackResponse::new(Some(body.as_bytes().to_vec()), Duration::from_millis(25))
    }

    /// reacts to application/xml specifically
    fn xml_aware_transport() -> FnTransport {
        FnTransport::new(|_service: &HttpService, request: &[u8]| {
            let text = String::from_utf8_lossy(request);

            match raw::header_value(&text, "Content-Type") {
                Some("application/xml") => page(XML_ERROR_RESPONSE),
                _ => page(BASE_RESPONSE),
            }
        })
    }

    /// reacts identically to anything that isn't the expected content type
    fn picky_transport() -> FnTransport {
        FnTransport::new(|_service: &HttpService, request: &[u8]| {
            let text = String::from_utf8_lossy(request);

            match raw::header_value(&text, "Content-Type") {
                Some("application/x-www-form-urlencoded") => page(BASE_RESPONSE),
                _ => page(XML_ERROR_RESPONSE),
            }
        })
    }

    /// an xml-specific code path yields the informational finding and a
    /// passive-scan hand-off of the xml exchange
    #[test]
    fn xml_code_path_is_reported() {
        let transport = xml_aware_transport();
        let passive = RecordingPassiveSink::default();
        let pair = baseline(BASE_REQUEST, BASE_RESPONSE);
        let ctx = ScanContext::new(&pair, &transport).with_passive_sink(&passive);

        let issues = CodePathCheck::new().active_scan(&ctx, &insertion_point());

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].name(), XML_SUPPORTED_ISSUE);
        assert_eq!(issues[0].severity(), Severity::Information);
        assert_eq!(issues[0].confidence(), Confidence::Tentative);
        // baseline + xml variant + control variant
        assert_eq!(issues[0].messages().len(), 3);
        assert_eq!(passive.exchanges(), 1);
    }

    /// a server that reacts to any unexpected content type fails the control
    #[test]
    fn any_content_type_reaction_is_not_reported() {
        let transport = picky_transport();
        let passive = RecordingPassiveSink::default();
        let pair = baseline(BASE_REQUEST, BASE_RESPONSE);
        let ctx = ScanContext::new(&pair, &transport).with_passive_sink(&passive);

        let issues = CodePathCheck::new().active_scan(&ctx, &insertion_point());

        assert!(issues.is_empty());
        assert_eq!(passive.exchanges(), 0);
        assert_eq!(transport.requests_sent(), 2);
    }

    /// no content-type header means nothing can be swapped
    #[test]
    fn missing_content_type_aborts() {
        let transport = xml_aware_transport();
        let pair = baseline(
            "POST /submit HTTP/1.1\r\nHost: example.com\r\n\r\nq=hello",
            BASE_RESPONSE,
        );
        let ctx = ScanContext::new(&pair, &transport);

        let issues = CodePathCheck::new().active_scan(&ctx, &insertion_point());

        assert!(issues.is_empty());
        assert_eq!(transport.requests_sent(), 0);
    }

    /// an unchanged page structure under the xml swap ends the probe early
    #[test]
    fn indifferent_server_sends_no_control() {
        let transport = FnTransport::constant(BASE_RESPONSE);
        let pair = baseline(BASE_REQUEST, BASE_RESPONSE);
        let ctx = ScanContext::new(&pair, &transport);

        let issues = CodePathCheck::new().active_scan(&ctx, &insertion_point());

        assert!(issues.is_empty());
        assert_eq!(transport.requests_sent(), 1);
    }
}
