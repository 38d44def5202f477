//! suspicious input-transformation probing
//!
//! Sends probes whose evaluated form is predictable (collapsed quotes, an
//! arithmetic product, a template-expression result) and looks for that form in
//! the response. Every signal must reproduce across consecutive rounds with
//! fresh randomness before anything is reported; a single miss abandons the
//! check with no partial credit.
use rand::Rng;
use tracing::{debug, instrument};

use super::{ActiveCheck, ScanContext};
use crate::issues::{Confidence, Issue, ScanMessage, Severity};
use crate::markers::{alnum_marker, alpha_marker};
use crate::requests::InsertionPoint;
use crate::std_ext::Named;

const TRANSFORM_CHECK_NAME: &str = "TransformCheck";

/// the closed catalog of transformation probes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TransformProbe {
    /// `''` collapsing to `'` between random anchors — an escaping layer is
    /// consuming quotes
    QuoteConsumption,

    /// `<x>*<y>` appearing as the literal product
    ArithmeticEvaluation,

    /// the arithmetic probe wrapped in `${...}` template-expression syntax
    ExpressionEvaluation,

    /// the arithmetic probe wrapped in `%{...}` expression-language syntax
    AltExpressionEvaluation,
}

impl TransformProbe {
    const ALL: [Self; 4] = [
        Self::QuoteConsumption,
        Self::ArithmeticEvaluation,
        Self::ExpressionEvaluation,
        Self::AltExpressionEvaluation,
    ];

    const fn label(self) -> &'static str {
        match self {
            Self::QuoteConsumption => "quote consumption",
            Self::ArithmeticEvaluation => "arithmetic evaluation",
            Self::ExpressionEvaluation => "expression evaluation",
            Self::AltExpressionEvaluation => "EL evaluation",
        }
    }

    /// produce a fresh `(probe, acceptable evaluated forms)` pairing
    fn generate(self) -> (String, Vec<String>) {
        match self {
            Self::QuoteConsumption => anchored("''", &["'"]),
            Self::ArithmeticEvaluation => arithmetic(),
            Self::ExpressionEvaluation => {
                let (probe, expected) = arithmetic();

                (format!("${{{probe}}}"), expected)
            }
            Self::AltExpressionEvaluation => {
                let (probe, expected) = arithmetic();

                (format!("%{{{probe}}}"), expected)
            }
        }
    }
}

/// random multiplication whose product won't appear by accident
fn arithmetic() -> (String, Vec<String>) {
    let mut rng = rand::thread_rng();

    let x: u64 = rng.gen_range(99..=9999);
    let y: u64 = rng.gen_range(99..=9999);

    (format!("{x}*{y}"), vec![(x * y).to_string()])
}

/// wrap a probe and its expected forms in random anchors so that neither can
/// collide with content already on the page
///
/// the right anchor is digit-free so an adjacent numeric expectation can't
/// bleed into it
fn anchored(probe: &str, expected: &[&str]) -> (String, Vec<String>) {
    let left = alnum_marker(4);
    let right = alpha_marker(4);

    let wrapped = format!("{left}{probe}{right}");
    let expected = expected
        .iter()
        .map(|inner| format!("{left}{inner}{right}"))
        .collect();

    (wrapped, expected)
}

/// detects server-side transformation of injected input
#[derive(Clone, Copy, Debug)]
pub struct TransformCheck {
    confirmations: usize,
}

impl TransformCheck {
    /// create the check with the default two-round confirmation requirement
    #[must_use]
    pub const fn new() -> Self {
        Self { confirmations: 2 }
    }

    /// require a different number of consecutive confirmations
    #[must_use]
    pub const fn with_confirmations(mut self, confirmations: usize) -> Self {
        self.confirmations = confirmations;

        self
    }
}

impl Default for TransformCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl Named for TransformCheck {
    fn name(&self) -> &str {
        TRANSFORM_CHECK_NAME
    }
}

impl ActiveCheck for TransformCheck {
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

        let baseline_response = baseline.response_text().into_owned();

        let mut issues = Vec::new();

        for probe in TransformProbe::ALL {
            'rounds: for round in 0..self.confirmations {
                let (probe_text, expected) = probe.generate();

                debug!(probe = %probe_text, round, "trying transformation probe");

                let attack = ctx.attack(insertion_point, &probe_text);
                let response = attack.response_text().into_owned();

                // a match counts only when the evaluated form is in the attack
                // response and was NOT already on the baseline page (an id that
                // happens to equal the product must not count)
                let Some(evaluated) = expected.iter().find(|evaluated| {
                    response.contains(evaluated.as_str())
                        && !baseline_response.contains(evaluated.as_str())
                }) else {
                    // no partial credit
                    break 'rounds;
                };

                if round == self.confirmations - 1 {
                    let detail = format!(
                        "The application transforms input in a way that suggests it might be \
                         vulnerable to some kind of server-side code injection:<br/><br/> The \
                         following probe was sent: <b>{probe_text}</b><br/>The server response \
                         contained the evaluated result: <b>{evaluated}</b><br/><br/>Manual \
                         investigation is advised."
                    );

                    issues.push(Issue::new(
                        baseline.service().clone(),
                        url.clone(),
                        vec![ScanMessage::from(&attack)],
                        format!("Suspicious input transformation: {}", probe.label()),
                        detail,
                        Confidence::Tentative,
                        Severity::High,
                    ));
                }
            }
        }

        issues
    }
}
