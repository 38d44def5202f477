//! timed attack exchanges
use std::borrow::Cow;
use std::ops::Range;
use std::time::Duration;

use crate::std_ext::convert::AsBytes;

/// exposes the wall-clock duration of the exchange that produced a response
pub trait Timed {
    /// elapsed wall-clock time
    fn elapsed(&self) -> &Duration;
}

/// what came back over the transport: response bytes (or nothing) plus how
/// long the exchange took
///
/// An absent body means the transport couldn't produce a response (connection
/// failure, timeout, empty reply). Strategies treat absence as inconclusive,
/// never as a signal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttackResponse {
    body: Option<Vec<u8>>,
    elapsed: Duration,
}

impl AttackResponse {
    /// pair response bytes with the time it took to receive them
    #[must_use]
    pub const fn new(body: Option<Vec<u8>>, elapsed: Duration) -> Self {
        Self { body, elapsed }
    }

    /// an exchange that produced no response
    #[must_use]
    pub const fn absent(elapsed: Duration) -> Self {
        Self {
            body: None,
            elapsed,
        }
    }

    /// the response bytes, when there are any
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// the response as text; an absent response reads as empty
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        match &self.body {
            Some(bytes) => String::from_utf8_lossy(bytes),
            None => Cow::Borrowed(""),
        }
    }

    /// true when the transport produced nothing
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        self.body.is_none()
    }
}

impl Timed for AttackResponse {
    fn elapsed(&self) -> &Duration {
        &self.elapsed
    }
}

/// one complete attack exchange: the mutated request that was sent, whatever
/// came back, and the byte ranges worth pointing a human at
///
/// Created once per transport call and never mutated afterwards. The highlight
/// ranges are cosmetic evidence annotations (payload locations in the request,
/// taint reflections in the response); detection decisions never depend on them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttackResult {
    request: Vec<u8>,
    response: AttackResponse,
    request_highlights: Vec<Range<usize>>,
    response_highlights: Vec<Range<usize>>,
}

impl AttackResult {
    pub(crate) const fn new(request: Vec<u8>, response: AttackResponse) -> Self {
        Self {
            request,
            response,
            request_highlights: Vec::new(),
            response_highlights: Vec::new(),
        }
    }

    /// the mutated request bytes that were sent
    #[must_use]
    pub fn request(&self) -> &[u8] {
        &self.request
    }

    /// the request as text
    #[must_use]
    pub fn request_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.request)
    }

    /// the transport's answer
    #[must_use]
    pub const fn response(&self) -> &AttackResponse {
        &self.response
    }

    /// the response as text; an absent response reads as empty
    #[must_use]
    pub fn response_text(&self) -> Cow<'_, str> {
        self.response.text()
    }

    /// true when the transport produced a response at all
    #[must_use]
    pub const fn has_response(&self) -> bool {
        !self.response.is_absent()
    }

    /// elapsed wall-clock time, in seconds
    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        self.response.elapsed().as_secs_f64()
    }

    /// payload locations within the request bytes
    #[must_use]
    pub fn request_highlights(&self) -> &[Range<usize>] {
        &self.request_highlights
    }

    /// taint reflections within the response bytes
    #[must_use]
    pub fn response_highlights(&self) -> &[Range<usize>] {
        &self.response_highlights
    }

    /// mark a known payload location in the request
    pub(crate) fn highlight_request_range(&mut self, range: Range<usize>) {
        self.request_highlights.push(range);
    }

    /// mark every occurrence of `value` in the request
    pub(crate) fn highlight_request_value<T: AsBytes>(&mut self, value: T) {
        self.request_highlights
            .extend(find_all(&self.request, value.as_bytes()));
    }

    /// mark every occurrence of `taint` in the response
    pub(crate) fn highlight_taint<T: AsBytes>(&mut self, taint: T) {
        if let Some(body) = self.response.body() {
            let ranges = find_all(body, taint.as_bytes());

            self.response_highlights.extend(ranges);
        }
    }
}

impl Timed for AttackResult {
    fn elapsed(&self) -> &Duration {
        self.response.elapsed()
    }
}

/// every non-overlapping occurrence of `needle` in `haystack`
pub(crate) fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<Range<usize>> {
    let mut found = Vec::new();

    if needle.is_empty() {
        return found;
    }

    let mut start = 0;

    while start + needle.len() <= haystack.len() {
        if &haystack[start..start + needle.len()] == needle {
            found.push(start..start + needle.len());
            start += needle.len();
        } else {
            start += 1;
        }
    }

    found
}
