//! Format detection: score every registered parser over a sample of lines
//! and pick the best.

use crate::formats::{HttpParser, JsonParser, LineParser, LogfmtParser, SyslogParser};

/// Number of leading lines sampled by default.
pub const DEFAULT_SAMPLE_SIZE: usize = 10;

/// Parser registry with confidence-based selection.
///
/// Registration order doubles as the tie-break: when two parsers score the
/// same, the earlier registration wins. The default order is http, then
/// json, then syslog, then logfmt; user-regex parsers are appended by
/// callers. The detector holds no per-call state and is safe to share
/// across threads.
pub struct Detector {
    parsers: Vec<Box<dyn LineParser>>,
    sample_size: usize,
}

impl Detector {
    /// A detector with the built-in parsers in their priority order.
    pub fn new() -> Detector {
        Detector {
            parsers: vec![
                Box::new(HttpParser),
                Box::new(JsonParser),
                Box::new(SyslogParser),
                Box::new(LogfmtParser),
            ],
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }

    pub fn with_sample_size(mut self, n: usize) -> Detector {
        self.sample_size = n.max(1);
        self
    }

    /// Append a parser at the lowest priority.
    pub fn register(&mut self, parser: Box<dyn LineParser>) {
        self.parsers.push(parser);
    }

    /// Names of all registered parsers, in priority order.
    pub fn format_names(&self) -> Vec<&str> {
        self.parsers.iter().map(|p| p.format_name()).collect()
    }

    /// Look a parser up by its registry name.
    pub fn by_name(&self, name: &str) -> Option<&dyn LineParser> {
        self.parsers
            .iter()
            .find(|p| p.format_name() == name)
            .map(|p| p.as_ref())
    }

    /// Select the highest-confidence parser for the sample, or `None` when
    /// every parser scores zero (or the input is empty). Only the first
    /// `sample_size` lines are inspected; the sample is not retained.
    pub fn detect(&self, lines: &[String]) -> Option<&dyn LineParser> {
        let sample = &lines[..lines.len().min(self.sample_size)];
        if sample.is_empty() {
            return None;
        }

        let mut best: Option<(&dyn LineParser, f64)> = None;
        for parser in &self.parsers {
            let score = parser.confidence(sample);
            // Strictly-greater keeps the earliest registration on ties.
            if score > 0.0 && best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((parser.as_ref(), score));
            }
        }
        best.map(|(p, _)| p)
    }
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}
