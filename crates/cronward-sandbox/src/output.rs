//! Turning a plugin's raw stderr into something fit for an error message.
//!
//! Failure messages travel back to the control client as one string, so the
//! captured output is stripped of terminal escapes and shortened with
//! middle-omission: the head shows what the plugin was doing, the tail shows
//! how it died.

use tokio::io::{AsyncRead, AsyncReadExt};

/// Maximum characters of plugin output carried in an error message.
pub const DEFAULT_MAX_CHARS: usize = 2_000;

/// Bytes of stderr held in memory while a plugin runs.
pub const STDERR_TAIL_BYTES: usize = 64 * 1024;

/// Drain `reader` to EOF, keeping only its last `max_bytes` bytes.
pub async fn read_tail<R: AsyncRead + Unpin>(mut reader: R, max_bytes: usize) -> std::io::Result<Vec<u8>> {
    let mut tail = Vec::new();
    let mut chunk = [0u8; 8 * 1024];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(tail);
        }
        tail.extend_from_slice(&chunk[..n]);
        if tail.len() > max_bytes {
            let excess = tail.len() - max_bytes;
            tail.drain(..excess);
        }
    }
}

/// Strip ANSI escape codes, decode lossily, and trim surrounding whitespace.
pub fn clean(raw: &[u8]) -> String {
    let stripped = strip_ansi_escapes::strip(raw);
    String::from_utf8_lossy(&stripped).trim().to_string()
}

/// Shorten `text` to at most `max_chars` characters (plus the marker line),
/// keeping equal halves from the start and the end.
///
/// Splits on character boundaries, never inside a multi-byte sequence.
pub fn truncate_middle(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_owned();
    }

    let half = max_chars / 2;
    let head: String = text.chars().take(half).collect();
    let tail: String = text.chars().skip(total - half).collect();
    let omitted = total - 2 * half;

    format!("{head}\n... [{omitted} chars omitted] ...\n{tail}")
}

/// `clean` followed by `truncate_middle` at the default width.
pub fn summarize(raw: &[u8]) -> String {
    truncate_middle(&clean(raw), DEFAULT_MAX_CHARS)
}
