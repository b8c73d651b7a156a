//! Minimal SRT reader used to sanity-check files written by the OCR library.

use anyhow::{anyhow, Context, Result};
use std::fmt;

/// One subtitle cue: time range and text lines.
/// The sequence number is validated while parsing but not kept.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub start_ms: u64,
    pub end_ms: u64,
    pub lines: Vec<String>,
}

/// What a produced subtitle file contains, for the status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub cues: usize,
    /// Cues whose text is blank, usually OCR noise.
    pub empty_cues: usize,
    pub first_start_ms: u64,
    pub last_end_ms: u64,
}

impl Stats {
    pub fn of(cues: &[Cue]) -> Self {
        Self {
            cues: cues.len(),
            empty_cues: cues
                .iter()
                .filter(|c| c.lines.iter().all(|l| l.trim().is_empty()))
                .count(),
            first_start_ms: cues.iter().map(|c| c.start_ms).min().unwrap_or(0),
            last_end_ms: cues.iter().map(|c| c.end_ms).max().unwrap_or(0),
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cues == 0 {
            return write!(f, "no subtitle cues found");
        }
        write!(
            f,
            "{} cue{} from {} to {}",
            self.cues,
            if self.cues == 1 { "" } else { "s" },
            format_time(self.first_start_ms),
            format_time(self.last_end_ms)
        )?;
        if self.empty_cues > 0 {
            write!(f, " ({} without text)", self.empty_cues)?;
        }
        Ok(())
    }
}

/// Parse SRT text into cues, in file order.
/// Runs of blank lines between cues and a leading BOM are accepted.
pub fn parse(input: &str) -> Result<Vec<Cue>> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut cues = Vec::new();
    let mut lines = input.lines();
    while let Some(line) = lines.next() {
        let header = line.trim();
        if header.is_empty() {
            continue;
        }
        let index: u32 = header
            .parse()
            .with_context(|| format!("bad cue index {header:?}"))?;
        let timing = lines
            .next()
            .ok_or_else(|| anyhow!("cue {index} has no timing line"))?;
        let (start_ms, end_ms) = parse_timing(timing).with_context(|| format!("cue {index}"))?;
        let text = lines
            .by_ref()
            .take_while(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect();
        cues.push(Cue {
            start_ms,
            end_ms,
            lines: text,
        });
    }
    Ok(cues)
}

/// Parse `00:00:01,000 --> 00:00:02,000` into milliseconds.
fn parse_timing(line: &str) -> Result<(u64, u64)> {
    let (start, end) = line
        .split_once("-->")
        .ok_or_else(|| anyhow!("missing arrow in {line:?}"))?;
    Ok((parse_timestamp(start.trim())?, parse_timestamp(end.trim())?))
}

/// Parse `HH:MM:SS,mmm` (a `.` separator is tolerated) into milliseconds.
fn parse_timestamp(t: &str) -> Result<u64> {
    let parts: Vec<&str> = t.split([':', ',', '.']).collect();
    let [h, m, s, ms] = parts.as_slice() else {
        return Err(anyhow!("bad timestamp {t:?}"));
    };
    let h: u64 = h.parse()?;
    let m: u64 = m.parse()?;
    let s: u64 = s.parse()?;
    let ms: u64 = ms.parse()?;
    h.checked_mul(60)
        .and_then(|v| v.checked_add(m))
        .and_then(|v| v.checked_mul(60))
        .and_then(|v| v.checked_add(s))
        .and_then(|v| v.checked_mul(1000))
        .and_then(|v| v.checked_add(ms))
        .ok_or_else(|| anyhow!("timestamp {t:?} out of range"))
}

/// Format milliseconds as `HH:MM:SS,mmm`.
fn format_time(ms: u64) -> String {
    let h = ms / 3_600_000;
    let m = (ms % 3_600_000) / 60_000;
    let s = (ms % 60_000) / 1000;
    let ms = ms % 1000;
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}
