//! CVE-2015-2080 (JetLeak) probing
//!
//! Vulnerable Jetty versions respond to an illegal `0x00` byte in a header
//! value with a 400 page that embeds a window into shared buffer memory.
//! Technique based on the GDS Jetleak testing script.
use tracing::instrument;

use super::{ActiveCheck, ScanContext};
use crate::issues::{Confidence, Issue, ScanMessage, Severity};
use crate::requests::InsertionPoint;
use crate::std_ext::Named;

const JETLEAK_CHECK_NAME: &str = "JetLeakCheck";

const JETLEAK_ISSUE: &str = "CVE-2015-2080 (JetLeak)";

const JETLEAK_DETAIL: &str = "The application appears to be running a version of Jetty \
    vulnerable to CVE-2015-2080, which allows attackers to read out private server memory via \
    malformed header bytes.";

// how far into the response the error banner must appear
const SIGNATURE_WINDOW: usize = 90;

const ILLEGAL_CHARACTER_BANNER: &str = "400 Illegal character 0x0 in state";
const BUFFER_MARKER: &str = "<<<";

/// probes the `Referer` header for the Jetty shared-buffer leak
#[derive(Clone, Copy, Debug, Default)]
pub struct JetLeakCheck;

impl JetLeakCheck {
    /// create the check
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Named for JetLeakCheck {
    fn name(&self) -> &str {
        JETLEAK_CHECK_NAME
    }
}

impl ActiveCheck for JetLeakCheck {
    #[instrument(skip_all, level = "trace")]
    fn active_scan(
        &self,
        ctx: &ScanContext<'_>,
        insertion_point: &dyn InsertionPoint,
    ) -> Vec<Issue> {
        if insertion_point.name() != "Referer" {
            return Vec::new();
        }

        let baseline = ctx.baseline();

        let Ok(url) = baseline.url() else {
            return Vec::new();
        };

        let attack = ctx.attack(insertion_point, "\x00");

        let response = attack.response_text();
        let window: String = response.chars().take(SIGNATURE_WINDOW).collect();

        if window.contains(ILLEGAL_CHARACTER_BANNER) && window.contains(BUFFER_MARKER) {
            return vec![Issue::new(
                baseline.service().clone(),
                url,
                vec![ScanMessage::from(&attack)],
                JETLEAK_ISSUE,
                JETLEAK_DETAIL,
                Confidence::Firm,
                Severity::High,
            )];
        }

        Vec::new()
    }
}
