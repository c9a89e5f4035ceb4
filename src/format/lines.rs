//! Line-oriented formatters

use super::InsightFormatter;

/// Prefix used for analytics syntheses when none is configured
pub const DEFAULT_PREFIX: &str = "[Current Ronin Network State]";

/// Markers that flag a line as scaffolding rather than an insight
const NOISE_MARKERS: [&str; 6] = ["```", "[", "]", "example:", "note:", "analysis:"];

/// One insight per non-empty line
///
/// Suits producers that already emit `[Category] text` lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormatter;

impl InsightFormatter for LineFormatter {
    fn format(&self, raw: &str) -> Vec<String> {
        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Keeps prose lines, drops scaffolding, and prepends a fixed prefix
#[derive(Debug, Clone)]
pub struct PrefixedLineFormatter {
    prefix: String,
}

impl PrefixedLineFormatter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn is_noise(line: &str) -> bool {
        let lower = line.to_lowercase();
        NOISE_MARKERS.iter().any(|marker| lower.contains(marker))
    }
}

impl Default for PrefixedLineFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl InsightFormatter for PrefixedLineFormatter {
    fn format(&self, raw: &str) -> Vec<String> {
        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !Self::is_noise(line))
            .map(|line| line.trim_matches(|c| c == '"' || c == '\'').trim())
            .filter(|line| !line.is_empty())
            .map(|line| format!("{} {}", self.prefix, line))
            .collect()
    }
}
