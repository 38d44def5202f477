use tracing::{error, instrument};

use crate::error::{FeroxScanError, RequestErrorKind};

/// internal helper to convert [`reqwest::Error`] to [`FeroxScanError`]
#[allow(clippy::needless_pass_by_value)]
#[instrument(skip_all, level = "trace")]
pub(super) fn reqwest_to_scan_error(source: reqwest::Error) -> FeroxScanError {
    let status = source.status().map(|status_code| status_code.as_u16());

    let kind = if source.is_body() {
        // Returns true if the error is related to the request or response body
        RequestErrorKind::Body(status)
    } else if source.is_connect() {
        // Returns true if the error is related to connect
        //
        // note: connect is a more specific error than a request error and both
        // can be true at the same time; don't change the order of the if statements
        // without thinking about the specificity of the error
        RequestErrorKind::Connect(status)
    } else if source.is_decode() {
        // Returns true if the error is related to decoding the response's body
        RequestErrorKind::Decode(status)
    } else if source.is_redirect() {
        // Returns true if the error is from a RedirectPolicy
        RequestErrorKind::Redirect(status)
    } else if source.is_timeout() {
        // Returns true if the error is related to a timeout
        //
        // note: timeout is a more specific error than a request error and both
        // can be true at the same time; don't change the order of the if statements
        // without thinking about the specificity of the error
        RequestErrorKind::Timeout(status)
    } else if source.is_request() {
        // Returns true if the error is related to the request
        RequestErrorKind::Request(status)
    } else {
        RequestErrorKind::Unknown
    };

    error!(?kind, "error occurred while sending request: {}", source);

    FeroxScanError::RequestError {
        kind,
        message: source.to_string(),
    }
}
