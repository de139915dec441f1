//! Incremental parsing of rclone's stderr into progress updates.
//!
//! With `-v`, rclone reports progress on stderr as lines like:
//!
//! ```text
//! Transferred:   512.0 MiB / 1.0 GiB, 50%, 10.0 MiB/s, ETA 30s
//! ```
//!
//! The catch is the delimiter: rclone rewrites the live progress line in
//! place with a bare carriage return instead of appending a newline, so a
//! newline-only reader would never see a single progress update. The
//! decoder here treats `\r`, `\n`, or the `\r\n` pair as one terminator.

use crate::transfer::TransferStore;
use bytes::{BufMut, BytesMut};
use regex::Regex;
use std::collections::VecDeque;

/// Non-progress stderr lines kept for failure diagnostics.
const DIAG_TAIL_LINES: usize = 8;

/// Splits a byte stream into lines terminated by `\r`, `\n`, or `\r\n`.
///
/// A `\r\n` pair yields exactly one token, even when the pair is split
/// across two chunks; the decoder carries that single boundary decision
/// between `feed` calls. Genuine blank lines yield empty tokens.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: BytesMut,
    // Last byte seen was '\r'; swallow an immediately following '\n'.
    pending_cr: bool,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk, returning every line completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\r' => {
                    lines.push(self.take_line());
                    self.pending_cr = true;
                }
                b'\n' => lines.push(self.take_line()),
                _ => self.buf.put_u8(byte),
            }
        }
        lines
    }

    /// Flush the trailing unterminated fragment, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.take_line())
        }
    }

    fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        line
    }
}

/// Convert a numeric string and unit token to a byte count.
///
/// Units use binary multiples: `K`/`KB`/`KiB` are all 1024, `M` is 1024²,
/// and so on through `P`, case-insensitively. Bare values and plain `B`
/// are bytes. Malformed numbers yield 0 rather than an error.
pub fn parse_size(value: &str, unit: &str) -> u64 {
    let Ok(val) = value.trim().parse::<f64>() else {
        return 0;
    };

    let upper = unit.trim().to_ascii_uppercase();
    let stripped = upper.strip_suffix('B').unwrap_or(&upper);
    let stripped = stripped.strip_suffix('I').unwrap_or(stripped);

    let multiplier: u64 = match stripped {
        "K" => 1 << 10,
        "M" => 1 << 20,
        "G" => 1 << 30,
        "T" => 1 << 40,
        "P" => 1 << 50,
        _ => 1,
    };

    (val * multiplier as f64) as u64
}

/// Recognizes `Transferred:` progress lines. Trailing speed/ETA fields are
/// present in rclone's output but not consumed.
#[derive(Debug)]
pub struct StatsMatcher {
    re: Regex,
}

impl StatsMatcher {
    pub fn new() -> Self {
        // The unit token is mandatory: rclone's file-count lines
        // ("Transferred:  1 / 1, 100%") carry no unit and must not be
        // mistaken for byte progress.
        let re = Regex::new(
            r"Transferred:\s+([0-9.]+)\s*([KkMmGgTtPp]i?[Bb]?|[Bb])\s*/\s*([0-9.]+)\s*([KkMmGgTtPp]i?[Bb]?|[Bb]),\s*([0-9]+)%",
        )
        .expect("stats pattern is valid");
        StatsMatcher { re }
    }

    /// Extract `(percentage, bytes_copied, bytes_total)` from a line, or
    /// `None` for anything that is not a progress line.
    pub fn parse(&self, line: &str) -> Option<(f64, u64, u64)> {
        let caps = self.re.captures(line)?;
        let percentage = caps[5].parse::<f64>().ok()?;
        let copied = parse_size(&caps[1], &caps[2]);
        let total = parse_size(&caps[3], &caps[4]);
        Some((percentage, copied, total))
    }
}

impl Default for StatsMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Feeds one subprocess's stderr into the store for one transfer id.
///
/// Every matched line is applied immediately; there is no buffering or
/// smoothing, so the last parsed line wins. Non-progress lines are kept in
/// a bounded tail so the executor can attach rclone's own diagnostics to a
/// failure.
#[derive(Debug)]
pub struct ProgressParser {
    id: String,
    store: TransferStore,
    decoder: LineDecoder,
    matcher: StatsMatcher,
    tail: VecDeque<String>,
}

impl ProgressParser {
    pub fn new(id: impl Into<String>, store: TransferStore) -> Self {
        ProgressParser {
            id: id.into(),
            store,
            decoder: LineDecoder::new(),
            matcher: StatsMatcher::new(),
            tail: VecDeque::new(),
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        for line in self.decoder.feed(chunk) {
            self.apply(&line);
        }
    }

    /// Flush any trailing fragment and return the diagnostic tail.
    pub fn finish(mut self) -> Vec<String> {
        if let Some(line) = self.decoder.finish() {
            self.apply(&line);
        }
        self.tail.into()
    }

    fn apply(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        match self.matcher.parse(line) {
            Some((percentage, copied, total)) => {
                self.store
                    .update_progress(&self.id, percentage, copied, total);
            }
            None => {
                if self.tail.len() == DIAG_TAIL_LINES {
                    self.tail.pop_front();
                }
                self.tail.push_back(line.to_string());
            }
        }
    }
}
