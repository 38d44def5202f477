//! low-cardinality structural signatures of http response bodies
use std::fmt::{self, Display, Formatter};

use lazy_static::lazy_static;
use regex::Regex;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::std_ext::convert::IntoInner;

lazy_static! {
    // `<` followed by one or more ascii letters; attributes and closing tags
    // are intentionally invisible to the signature
    static ref OPENING_TAG: Regex = Regex::new("(?i)<[a-z]+").unwrap();
}

/// ordered concatenation of every html opening-tag name found in a response body
///
/// Two responses with equal fingerprints are treated as structurally equivalent
/// pages, even when their text content differs. This absorbs benign per-request
/// variance (nonces, timestamps, counters) while still catching structural
/// changes such as a new error block or a different template being rendered.
///
/// # Examples
///
/// ```
/// # use feroxscan::fingerprint::Fingerprint;
/// let first = Fingerprint::from_body("<html><p>copies sold: 1312</p></html>");
/// let second = Fingerprint::from_body("<html><p>copies sold: 1313</p></html>");
///
/// // text churn inside a tag is invisible
/// assert_eq!(first, second);
///
/// // a structural change is not
/// let error_page = Fingerprint::from_body("<html><div><p>whoops</p></div></html>");
/// assert_ne!(first, error_page);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Fingerprint(String);

impl Fingerprint {
    /// extract the signature from a response body
    ///
    /// tag names are matched case-insensitively and stored lowercased, so two
    /// renderings that differ only in tag case compare equal
    #[must_use]
    pub fn from_body(body: &str) -> Self {
        let mut tags = String::new();

        for tag in OPENING_TAG.find_iter(body) {
            tags.push_str(&tag.as_str().to_ascii_lowercase());
        }

        Self(tags)
    }

    /// true when the body the signature was taken from contained no markup at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// the raw signature text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl IntoInner for Fingerprint {
    type Type = String;

    fn into_inner(self) -> Self::Type {
        self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
