//! Custom error-type definitions
#[cfg(feature = "blocking")]
use reqwest;
use thiserror::Error;
use url::ParseError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// primary error-type for the feroxscan library
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FeroxScanError {
    /// Represents a failure to parse the given string into a [`url::Url`](https://docs.rs/url/latest/url/struct.Url.html).
    #[error("The url `{url}` is invalid and couldn't be parsed.")]
    InvalidUrl {
        /// underlying source error-type
        source: ParseError,

        /// the url that couldn't be parsed
        url: String,
    },

    /// Represents a raw request whose required header was absent
    ///
    /// raised by mutation primitives that rewrite an existing header in place
    #[error("The request has no `{header}` header")]
    MissingHeader {
        /// name of the header that couldn't be found
        header: String,
    },

    /// Represents a raw request that couldn't be interpreted as an http message
    #[error("Malformed raw request: {reason}")]
    MalformedRequest {
        /// what part of the message failed interpretation
        reason: &'static str,
    },

    /// Represents a template slot for which no substitution value was supplied
    #[error("No value supplied for template slot `{name}`")]
    UndefinedTemplateSlot {
        /// name of the unfilled slot
        name: String,
    },

    /// Represents a failure to generate an http method from a set of bytes
    #[cfg(feature = "blocking")]
    #[cfg_attr(docsrs, doc(cfg(feature = "blocking")))]
    #[error("Could not parse the given http method `{method}`")]
    MethodParseError {
        /// the method that couldn't be parsed
        method: String,
    },

    /// Represents a failure to read the body of a `reqwest::Response` object
    #[cfg(feature = "blocking")]
    #[cfg_attr(docsrs, doc(cfg(feature = "blocking")))]
    #[error("Could not read the response body")]
    ResponseReadError {
        /// underlying source error-type
        source: reqwest::Error,
    },

    /// Represents a failure encountered during sending a request / receiving a response
    #[error("An error occurred while sending the request: {kind:?} {message}")]
    RequestError {
        /// what category of error occurred
        kind: RequestErrorKind,

        /// the underlying error message
        message: String,
    },
}

/// Used to differentiate between different types of errors that occur when making requests.
///
/// Detection strategies never branch on the particular kind; it exists so transport
/// implementors can surface what went wrong to the log stream before the failure is
/// degraded to an inconclusive (absent) response.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[non_exhaustive]
pub enum RequestErrorKind {
    /// Represents a failure to read a response body
    Body(Option<u16>),

    /// Represents a failure during client connection to target
    Connect(Option<u16>),

    /// Represents a failure to decode a response body
    Decode(Option<u16>),

    /// Represents a failure related to redirection, i.e. too many redirects
    Redirect(Option<u16>),

    /// Represents a failure related to the request
    Request(Option<u16>),

    /// Represents a timeout during the request
    Timeout(Option<u16>),

    /// Represents an unexpected error
    #[default]
    Unknown,
}
