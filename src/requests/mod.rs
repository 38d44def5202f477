//! raw request model: target descriptors, baseline snapshots, insertion points,
//! and the mutation primitives that rewrite raw requests
mod template;

pub mod raw;

pub use self::template::{
    RequestTemplate, ABSHOST_SLOT, HOST_SLOT, REFERER_SLOT, XFH_SLOT,
};

use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::FeroxScanError;

/// protocol over which a target service is reached
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scheme {
    /// cleartext http
    Http,

    /// http over tls
    Https,
}

impl Scheme {
    /// url scheme component
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl Display for Scheme {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// descriptor of the http service a baseline request was captured against
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HttpService {
    host: String,
    port: u16,
    scheme: Scheme,
}

impl HttpService {
    /// create a new service descriptor
    pub fn new(host: impl Into<String>, port: u16, scheme: Scheme) -> Self {
        Self {
            host: host.into(),
            port,
            scheme,
        }
    }

    /// hostname or ip the service listens on
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// tcp port the service listens on
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// protocol the service speaks
    #[must_use]
    pub const fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// true when the service is reached over tls
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.scheme == Scheme::Https
    }
}

impl Display for HttpService {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// immutable baseline request/response snapshot
///
/// every attack variant produced during one scan invocation is compared against
/// this pair; it is never modified once captured
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaselinePair {
    request: Vec<u8>,
    response: Vec<u8>,
    service: HttpService,
}

impl BaselinePair {
    /// snapshot a request/response exchange
    #[must_use]
    pub const fn new(request: Vec<u8>, response: Vec<u8>, service: HttpService) -> Self {
        Self {
            request,
            response,
            service,
        }
    }

    /// the unmutated request bytes
    #[must_use]
    pub fn request(&self) -> &[u8] {
        &self.request
    }

    /// the baseline response bytes
    #[must_use]
    pub fn response(&self) -> &[u8] {
        &self.response
    }

    /// the service the pair was captured against
    #[must_use]
    pub const fn service(&self) -> &HttpService {
        &self.service
    }

    /// the request as text
    #[must_use]
    pub fn request_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.request)
    }

    /// the response as text
    #[must_use]
    pub fn response_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.response)
    }

    /// the target url, derived from the request line and the service descriptor
    ///
    /// # Errors
    ///
    /// fails when the request line carries no target, or the derived url text
    /// can't be parsed
    pub fn url(&self) -> Result<Url, FeroxScanError> {
        let text = self.request_text();

        let target = raw::first_line(&text)
            .split_whitespace()
            .nth(1)
            .ok_or(FeroxScanError::MalformedRequest {
                reason: "request line has no target",
            })?;

        let absolute = if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else {
            format!(
                "{}://{}:{}{}",
                self.service.scheme(),
                self.service.host(),
                self.service.port(),
                target
            )
        };

        Url::parse(&absolute).map_err(|source| FeroxScanError::InvalidUrl {
            source,
            url: absolute,
        })
    }
}

/// a designated location in a request where payloads can be substituted
///
/// Owned by the host application; the scanning core never mutates one, it only
/// asks it to build payload-bearing request variants.
pub trait InsertionPoint {
    /// the insertion point's name, e.g. the parameter name it mutates
    fn name(&self) -> &str;

    /// the unmutated value at this location in the baseline request
    fn base_value(&self) -> &str;

    /// produce request bytes with `payload` substituted at this location
    fn build_request(&self, payload: &str) -> Vec<u8>;

    /// where `payload` would land in a built request, when the host can tell
    ///
    /// purely cosmetic: used to mark evidence for human review, never for
    /// detection decisions
    fn payload_offsets(&self, payload: &str) -> Option<Range<usize>> {
        let _ = payload;

        None
    }
}
