//! randomized marker strings used as taints and anchor padding
use rand::Rng;

const LOWERCASE_ALNUM: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const LOWERCASE_ALPHA: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// random lowercase alphanumeric string of the given length
///
/// used as a unique, non-guessable value that can be traced from a mutated
/// request into a response
#[must_use]
pub fn alnum_marker(length: usize) -> String {
    from_charset(LOWERCASE_ALNUM, length)
}

/// random lowercase alphabetic string of the given length
///
/// digit-free variant for anchors that must not collide with numeric output
#[must_use]
pub fn alpha_marker(length: usize) -> String {
    from_charset(LOWERCASE_ALPHA, length)
}

fn from_charset(charset: &[u8], length: usize) -> String {
    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| char::from(charset[rng.gen_range(0..charset.len())]))
        .collect()
}
