use crate::ByteRange;

/// Outcome of interpreting a `Range` header against a file of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeResult {
    /// No `Range` header, serve the whole file with 200.
    NoRange,
    /// A single valid range, serve it with 206.
    Satisfiable(ByteRange),
    /// Well formed but outside the file, answer 416.
    Unsatisfiable,
    /// Not a single `bytes` range we understand, answer 400.
    Malformed,
}

/// Parse a raw `Range` header value against `file_size`.
///
/// Only the single-range form of the `bytes` unit is supported:
///
/// ```text
/// bytes=500-999    (first-last, last clamped to the file)
/// bytes=500-       (from 500 to the end)
/// bytes=-500       (the final 500 bytes)
/// ```
///
/// A header listing several ranges (`bytes=0-1,5-6`) is `Malformed`. The
/// function performs no I/O and maps every input to exactly one outcome.
pub fn parse_range(header: Option<&str>, file_size: u64) -> RangeResult {
    let Some(header) = header else {
        return RangeResult::NoRange;
    };

    let Some((unit, range_set)) = header.trim().split_once('=') else {
        return RangeResult::Malformed;
    };
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return RangeResult::Malformed;
    }
    if range_set.contains(',') {
        return RangeResult::Malformed;
    }

    let Some((first, last)) = range_set.trim().split_once('-') else {
        return RangeResult::Malformed;
    };

    let first = match position(first) {
        Ok(first) => first,
        Err(()) => return RangeResult::Malformed,
    };
    let last = match position(last) {
        Ok(last) => last,
        Err(()) => return RangeResult::Malformed,
    };

    let (start, end) = match (first, last) {
        (None, None) => return RangeResult::Malformed,
        // suffix-byte-range-spec: the final `n` bytes
        (None, Some(n)) => {
            if n == 0 || file_size == 0 {
                return RangeResult::Unsatisfiable;
            }
            (file_size.saturating_sub(n), file_size - 1)
        }
        (Some(start), None) => (start, file_size.saturating_sub(1)),
        (Some(start), Some(end)) => {
            if end < start {
                return RangeResult::Unsatisfiable;
            }
            (start, end)
        }
    };

    if start >= file_size {
        return RangeResult::Unsatisfiable;
    }

    RangeResult::Satisfiable(ByteRange::new(start, end.min(file_size - 1)))
}

/// An empty token is an omitted position. Anything else must be plain ASCII
/// digits; positions past `u64::MAX` saturate.
fn position(token: &str) -> Result<Option<u64>, ()> {
    let token = token.trim();
    if token.is_empty() {
        return Ok(None);
    }
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(());
    }
    Ok(Some(token.parse::<u64>().unwrap_or(u64::MAX)))
}
