//! line-level operations over raw request bytes
//!
//! These helpers deliberately stay dumb: the scanning core replays whatever the
//! host captured, so mutations must not normalize, reorder, or re-terminate
//! anything they don't explicitly target.
use crate::error::FeroxScanError;

/// the request line, without its terminator
#[must_use]
pub fn first_line(request: &str) -> &str {
    request
        .split(|terminator| terminator == '\r' || terminator == '\n')
        .next()
        .unwrap_or(request)
}

/// case-insensitive lookup of a header's value
///
/// returns the trimmed value of the first matching header line in the head of
/// the message
#[must_use]
pub fn header_value<'a>(request: &'a str, name: &str) -> Option<&'a str> {
    for line in request.lines().skip(1) {
        if line.is_empty() || line == "\r" {
            // end of head
            break;
        }

        if let Some((line_name, value)) = line.split_once(':') {
            if line_name.trim().eq_ignore_ascii_case(name) {
                return Some(value.trim());
            }
        }
    }

    None
}

/// true when the head of the message carries the named header
#[must_use]
pub fn has_header(request: &str, name: &str) -> bool {
    header_value(request, name).is_some()
}

/// byte offset of the message body (i.e. one past the blank line), or the
/// message length when there is no blank line
#[must_use]
pub(crate) fn head_end(request: &[u8]) -> usize {
    if let Some(index) = find(request, b"\r\n\r\n") {
        return index + 4;
    }

    if let Some(index) = find(request, b"\n\n") {
        return index + 2;
    }

    request.len()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// rewrite an existing header's value, leaving every other byte untouched
///
/// This is the in-place header-swap primitive: it only ever modifies a header
/// that is already present. Line terminators are preserved as captured.
///
/// # Errors
///
/// fails with [`FeroxScanError::MissingHeader`] when the named header isn't in
/// the message head
pub fn set_header(request: &[u8], name: &str, value: &str) -> Result<Vec<u8>, FeroxScanError> {
    let body_start = head_end(request);
    let head = &request[..body_start];

    let mut rebuilt = Vec::with_capacity(request.len() + value.len());
    let mut modified = false;

    for line in split_keeping_terminators(head) {
        if !modified {
            if let Some(colon) = line.iter().position(|&byte| byte == b':') {
                let line_name = &line[..colon];

                if line_name.eq_ignore_ascii_case(name.as_bytes()) {
                    rebuilt.extend_from_slice(line_name);
                    rebuilt.extend_from_slice(b": ");
                    rebuilt.extend_from_slice(value.as_bytes());
                    rebuilt.extend_from_slice(terminator_of(line));
                    modified = true;

                    continue;
                }
            }
        }

        rebuilt.extend_from_slice(line);
    }

    if !modified {
        return Err(FeroxScanError::MissingHeader {
            header: name.to_string(),
        });
    }

    rebuilt.extend_from_slice(&request[body_start..]);

    Ok(rebuilt)
}

/// split `head` on newlines, keeping each line's terminator attached
fn split_keeping_terminators(head: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;

    for (index, &byte) in head.iter().enumerate() {
        if byte == b'\n' {
            lines.push(&head[start..=index]);
            start = index + 1;
        }
    }

    if start < head.len() {
        lines.push(&head[start..]);
    }

    lines
}

const fn terminator_of(line: &[u8]) -> &'static [u8] {
    match line.last() {
        Some(&b'\n') => {
            if line.len() >= 2 && line[line.len() - 2] == b'\r' {
                b"\r\n"
            } else {
                b"\n"
            }
        }
        _ => b"",
    }
}

/// name of the parameter that appears earliest in the request
///
/// Whole-request attacks must run exactly once per baseline even though the
/// host invokes the scan once per insertion point; gating on "is the current
/// insertion point the request's first parameter" achieves that. Body
/// parameters win over query parameters, which win over cookies.
#[must_use]
pub fn first_insertion_point_name(request: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(request);
    let body = String::from_utf8_lossy(&request[head_end(request)..]);

    if let Some(name) = first_form_param(body.trim()) {
        return Some(name);
    }

    if let Some((_, query)) = first_line(&text)
        .split_whitespace()
        .nth(1)
        .and_then(|target| target.split_once('?'))
    {
        if let Some(name) = first_form_param(query) {
            return Some(name);
        }
    }

    if let Some(cookies) = header_value(&text, "Cookie") {
        if let Some(name) = first_form_param(cookies.split(';').next().unwrap_or("")) {
            return Some(name);
        }
    }

    None
}

fn first_form_param(data: &str) -> Option<String> {
    let chunk = data.split('&').next()?;
    let (name, _) = chunk.split_once('=')?;
    let name = name.trim();

    // reject things that merely contain '=' but aren't k=v data (json, xml)
    if name.is_empty()
        || !name
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || b"_-.[]%".contains(&byte))
    {
        return None;
    }

    Some(name.to_string())
}
