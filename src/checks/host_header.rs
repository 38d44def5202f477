//! host-header trust probing
//!
//! Sends a small family of whole-request variants with poisoned host values and
//! watches whether the application (a) still renders its normal page for them
//! and (b) writes the poisoned value into its output.
use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::{ActiveCheck, ScanContext};
use crate::fingerprint::Fingerprint;
use crate::issues::{Confidence, Issue, ScanMessage, Severity};
use crate::markers::alnum_marker;
use crate::requests::{
    raw, InsertionPoint, RequestTemplate, ABSHOST_SLOT, HOST_SLOT, REFERER_SLOT, XFH_SLOT,
};
use crate::responses::{AttackResponse, AttackResult};
use crate::std_ext::Named;
use url::Url;

const HOST_HEADER_CHECK_NAME: &str = "HostHeaderCheck";

const ARBITRARY_HOST_ISSUE: &str = "Arbitrary host header accepted";
const POISONING_ISSUE: &str = "Host header poisoning";

const ARBITRARY_HOST_DETAIL: &str = "The application responds with its normal content to requests \
    carrying an arbitrary HTTP Host header.<br/><br/>This is a serious issue if the application \
    is not externally accessible or relies on IP-based access restrictions: an attacker can use \
    DNS rebinding to reach it through a victim's browser, and browser DNS pinning does not \
    effectively prevent the attack. It may also be possible to bypass poorly implemented access \
    restrictions directly by sending a Host header of 'localhost'. The only reliable mitigation \
    is server-side validation of the Host header.";

const POISONING_DETAIL: &str = "The application appears to trust the user-supplied host value and \
    writes it into its output. By supplying a malicious host value with a password reset request, \
    it may be possible to generate a poisoned reset link; depending on intervening caching \
    devices, cache poisoning attacks may also be possible. Consider testing the host value for \
    classic server-side injection vulnerabilities as well.";

/// probes whether the application trusts attacker-controlled host values
///
/// Preconditions: the baseline request must carry a `Host` header and the
/// baseline response must reflect its value (otherwise there is no oracle to
/// observe success with). As a whole-request attack, it runs only when invoked
/// for the request's first insertion point, so one baseline is probed once
/// rather than once per parameter.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostHeaderCheck;

impl HostHeaderCheck {
    /// create the check
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// instantiate one attack variant and send it
    ///
    /// `slots` carries the bare values; the absolute-host prefix, the
    /// forwarded-host header line, and the marker-bearing referer are built
    /// here so variants stay one-line declarations at the call site
    fn attack(
        &self,
        ctx: &ScanContext<'_>,
        template: &RequestTemplate,
        slots: &[(&'static str, &str)],
        taint: &str,
        referer_marker: &str,
    ) -> AttackResult {
        let scheme_prefix = format!("{}://", ctx.baseline().service().scheme());

        let mut values: HashMap<&str, String> = slots
            .iter()
            .map(|(slot, value)| (*slot, (*value).to_string()))
            .collect();

        if let Some(abshost) = values.get_mut(ABSHOST_SLOT) {
            *abshost = format!("{scheme_prefix}{abshost}");
        }

        values.insert(
            REFERER_SLOT,
            format!("{scheme_prefix}{taint}/{referer_marker}"),
        );

        if let Some(xfh) = values.get_mut(XFH_SLOT) {
            *xfh = format!("\r\nX-Forwarded-Host: {xfh}");
        }

        match template.instantiate(&values) {
            Ok(request) => {
                let highlights: Vec<String> = values.values().cloned().collect();

                ctx.send_raw(request, &highlights, Some(taint))
            }
            Err(error) => {
                warn!(%error, "attack template failed to instantiate");

                AttackResult::new(Vec::new(), AttackResponse::absent(Duration::ZERO))
            }
        }
    }

    fn raise(&self, ctx: &ScanContext<'_>, url: &Url, attack: &AttackResult, name: &str) -> Issue {
        let (detail, severity, confidence) = if name == ARBITRARY_HOST_ISSUE {
            (ARBITRARY_HOST_DETAIL, Severity::Low, Confidence::Certain)
        } else {
            (POISONING_DETAIL, Severity::Medium, Confidence::Tentative)
        };

        Issue::new(
            ctx.baseline().service().clone(),
            url.clone(),
            vec![
                ScanMessage::from(ctx.baseline()),
                ScanMessage::from(attack),
            ],
            name,
            detail,
            confidence,
            severity,
        )
    }
}

/// the attack was routed and rendered like the baseline, rather than hitting
/// an error page that would make any reflection check meaningless
fn hit(attack: &AttackResult, base_print: &Fingerprint) -> bool {
    Fingerprint::from_body(&attack.response_text()) == *base_print
}

/// the injected value specifically flows into the output: the taint is present
/// while the unrelated referer marker is not (a page that echoes the whole
/// request would leak the marker too, falsifying the injection hypothesis)
fn taint_reflected(attack: &AttackResult, taint: &str, referer_marker: &str) -> bool {
    let response = attack.response_text();

    response.contains(taint) && !response.contains(referer_marker)
}

impl Named for HostHeaderCheck {
    fn name(&self) -> &str {
        HOST_HEADER_CHECK_NAME
    }
}

impl ActiveCheck for HostHeaderCheck {
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

        let request_text = baseline.request_text();

        let Some(legit) = raw::header_value(&request_text, "Host").map(str::to_owned) else {
            return Vec::new();
        };

        let base_text = baseline.response_text();

        if !base_text.contains(&legit) {
            debug!("host value isn't reflected in the baseline response; no oracle to observe");

            return Vec::new();
        }

        let base_print = Fingerprint::from_body(&base_text);

        let template = match RequestTemplate::prepare(baseline) {
            Ok(template) => template,
            Err(error) => {
                debug!(%error, "baseline request couldn't be templated");

                return Vec::new();
            }
        };

        let referer_marker = alnum_marker(6);
        let taint = format!("{}.{legit}", alnum_marker(6));

        let mut issues = Vec::new();

        // Host: <taint>.<legit>
        let attack = self.attack(
            ctx,
            &template,
            &[(HOST_SLOT, taint.as_str())],
            &taint,
            &referer_marker,
        );

        if hit(&attack, &base_print) {
            // the application rendered real content for an arbitrary host
            if !base_print.is_empty() {
                issues.push(self.raise(ctx, &url, &attack, ARBITRARY_HOST_ISSUE));
            }

            if taint_reflected(&attack, &taint, &referer_marker) {
                debug!(variant = "host", "poisoned host value flows into the response");
                issues.push(self.raise(ctx, &url, &attack, POISONING_ISSUE));

                // direct poisoning confirmed; remaining variants add nothing
                return issues;
            }
        } else {
            // the application may not be the default vhost; retry with an
            // absolute-url request line naming the legitimate host
            let attack = self.attack(
                ctx,
                &template,
                &[(ABSHOST_SLOT, legit.as_str()), (HOST_SLOT, taint.as_str())],
                &taint,
                &referer_marker,
            );

            if hit(&attack, &base_print) && taint_reflected(&attack, &taint, &referer_marker) {
                debug!(variant = "abs", "poisoned host value flows into the response");
                issues.push(self.raise(ctx, &url, &attack, POISONING_ISSUE));
            }
        }

        // Host: <legit> / X-Forwarded-Host: <taint>
        let attack = self.attack(
            ctx,
            &template,
            &[(HOST_SLOT, legit.as_str()), (XFH_SLOT, taint.as_str())],
            &taint,
            &referer_marker,
        );

        if hit(&attack, &base_print) && taint_reflected(&attack, &taint, &referer_marker) {
            debug!(variant = "xfh", "forwarded-host value flows into the response");
            issues.push(self.raise(ctx, &url, &attack, POISONING_ISSUE));
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{baseline, FnTransport, SpliceInsertionPoint};
    use super::*;
    use crate::requests::HttpService;
    use crate::responses::AttackResponse;
    use std::time::Duration;

    const BASE_REQUEST: &str = "GET /?q=1 HTTP/1.1\r\nHost: example.com\r\nReferer: http://example.com/prev\r\n\r\n";
    const BASE_RESPONSE: &str = "<html><p>example.com</p></html>";

    fn insertion_point() -> SpliceInsertionPoint {
        SpliceInsertionPoint::new(
            "q",
            "1",
            "GET /?q=",
            " HTTP/1.1\r\nHost: example.com\r\n\r\n",
        )
    }

    /// responds with the page template filled with the request's host value,
    /// ignoring the referer entirely
    fn host_echo_transport() -> FnTransport {
        FnTransport::new(|_service: &HttpService, request: &[u8]| {
            let text = String::from_utf8_lossy(request);
            let host = raw::header_value(&text, "Host").unwrap_or_default().to_string();

            AttackResponse::new(
                Some(format!("<html><p>{host}</p></html>").into_bytes()),
                Duration::from_millis(40),
            )
        })
    }

    /// responds with the page template filled with both the host and the
    /// referer, i.e. a page that reflects everything it is given
    fn everything_echo_transport() -> FnTransport {
        FnTransport::new(|_service: &HttpService, request: &[u8]| {
            let text = String::from_utf8_lossy(request);
            let host = raw::header_value(&text, "Host").unwrap_or_default().to_string();
            let referer = raw::header_value(&text, "Referer").unwrap_or_default().to_string();

            AttackResponse::new(
                Some(format!("<html><p>{host}</p><p>{referer}</p></html>").into_bytes()),
                Duration::from_millis(40),
            )
        })
    }

    /// a host-echoing application yields the rebinding finding and the
    /// poisoning finding, and the remaining variants are never attempted
    #[test]
    fn direct_poisoning_short_circuits() {
        let transport = host_echo_transport();
        let pair = baseline(BASE_REQUEST, BASE_RESPONSE);
        let ctx = ScanContext::new(&pair, &transport);

        let issues = HostHeaderCheck::new().active_scan(&ctx, &insertion_point());

        let names: Vec<&str> = issues.iter().map(Named::name).collect();
        assert_eq!(names, vec![ARBITRARY_HOST_ISSUE, POISONING_ISSUE]);

        // only the direct variant went out on the wire
        assert_eq!(transport.requests_sent(), 1);

        // both findings carry the baseline exchange plus the attack
        for issue in &issues {
            assert_eq!(issue.messages().len(), 2);
            assert_eq!(issue.severity(), if issue.name() == ARBITRARY_HOST_ISSUE {
                Severity::Low
            } else {
                Severity::Medium
            });
        }
    }

    /// a page that reflects everything fails the referer-marker control, so
    /// only the rebinding finding survives
    #[test]
    fn generic_reflection_is_not_poisoning() {
        let transport = everything_echo_transport();
        let pair = baseline(
            BASE_REQUEST,
            "<html><p>example.com</p><p>http://example.com/prev</p></html>",
        );
        let ctx = ScanContext::new(&pair, &transport);

        let issues = HostHeaderCheck::new().active_scan(&ctx, &insertion_point());

        let names: Vec<&str> = issues.iter().map(Named::name).collect();
        assert_eq!(names, vec![ARBITRARY_HOST_ISSUE]);

        // direct variant hit, so abs was skipped, but xfh always runs
        assert_eq!(transport.requests_sent(), 2);
    }

    /// without a host header there is nothing to probe
    #[test]
    fn missing_host_header_aborts() {
        let transport = host_echo_transport();
        let pair = baseline("GET /?q=1 HTTP/1.0\r\n\r\n", BASE_RESPONSE);
        let ctx = ScanContext::new(&pair, &transport);

        let issues = HostHeaderCheck::new().active_scan(&ctx, &insertion_point());

        assert!(issues.is_empty());
        assert_eq!(transport.requests_sent(), 0);
    }

    /// an unreflected host value leaves the oracle blind, so nothing is sent
    #[test]
    fn unreflected_host_aborts() {
        let transport = host_echo_transport();
        let pair = baseline(BASE_REQUEST, "<html><p>static content</p></html>");
        let ctx = ScanContext::new(&pair, &transport);

        let issues = HostHeaderCheck::new().active_scan(&ctx, &insertion_point());

        assert!(issues.is_empty());
        assert_eq!(transport.requests_sent(), 0);
    }

    /// the whole-request attack only runs from the baseline's first parameter
    #[test]
    fn runs_once_per_baseline() {
        let transport = host_echo_transport();
        let pair = baseline(BASE_REQUEST, BASE_RESPONSE);
        let ctx = ScanContext::new(&pair, &transport);

        let second_param = SpliceInsertionPoint::new(
            "page",
            "2",
            "GET /?q=1&page=",
            " HTTP/1.1\r\nHost: example.com\r\n\r\n",
        );

        let issues = HostHeaderCheck::new().active_scan(&ctx, &second_param);

        assert!(issues.is_empty());
        assert_eq!(transport.requests_sent(), 0);
    }
}
