//! Line framing over a growing read buffer.
//!
//! Lines end with `\n`, optionally preceded by `\r`; both are stripped.
//! The caller owns the buffer and calls [`advance`] after every read,
//! dropping `consumed` bytes from the front on success.

/// Outcome of one framing step.
#[derive(Debug, PartialEq, Eq)]
pub enum ScanResult<'a> {
    /// A terminated line and the bytes consumed, terminator included.
    Ready(&'a [u8], usize),
    /// No terminator yet; read more and retry with the grown buffer.
    NeedMoreData,
    /// Unterminated bytes left when the source hit end-of-data.
    FinalLine(&'a [u8], usize),
    /// End-of-data with nothing pending.
    StreamClosed,
}

/// Extract the next line from `buffer`.
pub fn advance(buffer: &[u8], at_stream_end: bool) -> ScanResult<'_> {
    if let Some(pos) = find_lf(buffer) {
        return ScanResult::Ready(trim_cr(&buffer[..pos]), pos + 1);
    }

    match (at_stream_end, buffer.is_empty()) {
        (false, _) => ScanResult::NeedMoreData,
        (true, true) => ScanResult::StreamClosed,
        (true, false) => ScanResult::FinalLine(trim_cr(buffer), buffer.len()),
    }
}

fn find_lf(buffer: &[u8]) -> Option<usize> {
    buffer.iter().position(|&b| b == b'\n')
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}
