//! Boundary detection for hybrid atoms.
//!
//! A hybrid body is `[own data][child atoms]` with nothing marking where one
//! ends and the other begins. The split is guessed by looking for the earliest
//! known atom name; the preamble of the first child then starts four bytes
//! before it. Opaque data that happens to contain a known name will be split
//! too early. When nothing is found the atom is left undissected.

use crate::header::PREAMBLE_SIZE;
use crate::kind::is_known;

const NAME_OFFSET: usize = 4;

/// Returns the body offset at which child atoms start, if one can be found.
pub fn find_split(body: &[u8]) -> Option<usize> {
    if body.len() < PREAMBLE_SIZE {
        return None;
    }

    // A name at `i` needs a size field before it and must leave room for
    // a whole preamble.
    let last = body.len() - (PREAMBLE_SIZE - NAME_OFFSET);
    (NAME_OFFSET..=last)
        .find(|&i| is_known(&body[i..i + 4]))
        .map(|i| i - NAME_OFFSET)
}
