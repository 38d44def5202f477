//! templated whole-request rewriting
//!
//! One baseline request is rewritten once into a reusable template with named
//! slots for the host-trust attack family; each attack variant then instantiates
//! the same template with different slot values.
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use lazy_static::lazy_static;
use regex::Regex;

use super::raw;
use super::BaselinePair;
use crate::error::FeroxScanError;
use crate::payloads::Template;

lazy_static! {
    static ref REQUEST_LINE: Regex = Regex::new(r"(?i)^([a-z]+ [^ ]+)").unwrap();
    static ref HOST_LINE: Regex = Regex::new(r"(?im)^Host: [a-zA-Z0-9_.:-]*").unwrap();
    static ref REFERER_LINE: Regex =
        Regex::new(r"(?im)^Referer: https?://[a-zA-Z0-9_.:-]*").unwrap();
    static ref CACHE_CONTROL_LINE: Regex = Regex::new(r"(?im)^Cache-Control: [^\r\n]+").unwrap();
}

/// slot carrying the `Host` header value
pub const HOST_SLOT: &str = "host";

/// slot carrying an absolute-url host prefix for the request line, or nothing
pub const ABSHOST_SLOT: &str = "abshost";

/// slot carrying a complete extra `X-Forwarded-Host` header line, or nothing
pub const XFH_SLOT: &str = "xfh";

/// slot carrying the `Referer` header value
pub const REFERER_SLOT: &str = "referer";

// filled automatically at instantiation time
const CACHEBUST_SLOT: &str = "cachebust";

/// a baseline request rewritten into an immutable, reusable attack template
///
/// Preparation performs, in order: escaping of any template delimiter already
/// present in the raw request, an `${abshost}` slot ahead of an origin-form
/// path, a wall-clock cache-busting query parameter, a `Host: ${host}${xfh}`
/// slot, a `Referer: ${referer}` slot when the baseline carried a referer, and
/// a forced `Cache-Control: no-cache`.
///
/// # Examples
///
/// ```
/// # use std::collections::HashMap;
/// # use feroxscan::requests::{BaselinePair, HttpService, RequestTemplate, Scheme};
/// # fn main() -> Result<(), feroxscan::error::FeroxScanError> {
/// let baseline = BaselinePair::new(
///     b"GET /item?id=3 HTTP/1.1\r\nHost: shop.example\r\n\r\n".to_vec(),
///     b"<html></html>".to_vec(),
///     HttpService::new("shop.example", 80, Scheme::Http),
/// );
///
/// let template = RequestTemplate::prepare(&baseline)?;
///
/// let mut slots = HashMap::new();
/// slots.insert("host", String::from("evil.shop.example"));
///
/// let attack = template.instantiate(&slots)?;
/// let text = String::from_utf8_lossy(&attack);
///
/// assert!(text.contains("Host: evil.shop.example\r\n"));
/// assert!(text.contains("Cache-Control: no-cache"));
/// assert!(text.contains("id=3&cachebust="));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct RequestTemplate {
    template: Template,
}

impl RequestTemplate {
    /// rewrite a baseline request into the attack template
    ///
    /// # Errors
    ///
    /// fails with [`FeroxScanError::MissingHeader`] when the baseline request
    /// has no `Host` header; the host-trust attack family has no oracle
    /// without one
    pub fn prepare(baseline: &BaselinePair) -> Result<Self, FeroxScanError> {
        let text = baseline.request_text();

        if !raw::has_header(&text, "Host") {
            return Err(FeroxScanError::MissingHeader {
                header: String::from("Host"),
            });
        }

        // (1) neutralize delimiters already present so slot values can never
        //     collide with pre-existing request content
        let mut request = Template::escape(&text);

        // (2) leave room for an absolute-url host ahead of an origin-form path
        let origin_form = raw::first_line(&request)
            .split_whitespace()
            .nth(1)
            .is_some_and(|target| {
                !target.starts_with("http://") && !target.starts_with("https://")
            });

        if origin_form {
            if let Some(slash) = request.find('/') {
                request.insert_str(slash, "${abshost}");
            }
        }

        // (3) cache-busting query parameter on the request line
        let replacement = if raw::first_line(&request).contains('?') {
            "${1}&cachebust=$${cachebust}"
        } else {
            "${1}?cachebust=$${cachebust}"
        };
        let request = REQUEST_LINE.replace(&request, replacement).into_owned();

        // (4) host header becomes a slot that carries either a legitimate or an
        //     injected value, plus an optional forwarded-host suffix
        let request = HOST_LINE
            .replace(&request, "Host: $${host}$${xfh}")
            .into_owned();

        // (5) referer header becomes a slot when the baseline carried one
        let request = if raw::has_header(&text, "Referer") {
            REFERER_LINE
                .replace(&request, "Referer: $${referer}")
                .into_owned()
        } else {
            request
        };

        // (6) responses to these attacks must never come from (or land in) a cache
        let request = if raw::has_header(&text, "Cache-Control") {
            CACHE_CONTROL_LINE
                .replace(&request, "Cache-Control: no-cache")
                .into_owned()
        } else {
            request.replacen(
                "Host: ${host}${xfh}",
                "Host: ${host}${xfh}\r\nCache-Control: no-cache",
                1,
            )
        };

        Ok(Self {
            template: Template::new(request),
        })
    }

    /// the rewritten request text, slots included
    #[must_use]
    pub fn source(&self) -> &str {
        self.template.source()
    }

    /// produce one attack variant's request bytes
    ///
    /// unfilled slots default to the empty string; the cache-busting slot is
    /// filled from the wall clock
    ///
    /// # Errors
    ///
    /// fails only when the underlying substitution does, i.e. never for
    /// templates produced by [`prepare`](Self::prepare)
    pub fn instantiate(
        &self,
        values: &HashMap<&str, String>,
    ) -> Result<Vec<u8>, FeroxScanError> {
        let mut filled: HashMap<&str, String> = HashMap::new();

        for slot in [HOST_SLOT, ABSHOST_SLOT, XFH_SLOT, REFERER_SLOT] {
            filled.insert(slot, values.get(slot).cloned().unwrap_or_default());
        }

        filled.insert(CACHEBUST_SLOT, unix_timestamp());

        self.template.substitute(&filled).map(String::into_bytes)
    }
}

fn unix_timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or_else(|_| String::from("0"), |elapsed| elapsed.as_secs().to_string())
}
