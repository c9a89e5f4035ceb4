//! Insight formatting strategies
//!
//! Producers hand back raw text in one of a few shapes: one insight per line,
//! markdown with bold `[Category]` headers and bullets, or free prose lines that
//! need filtering. Each shape has its own `InsightFormatter`, and none of them
//! know about caching.

mod category;
mod lines;

pub use category::CategoryBulletFormatter;
pub use lines::{LineFormatter, PrefixedLineFormatter, DEFAULT_PREFIX};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use thiserror::Error;

/// Turns raw upstream text into ordered insight strings
pub trait InsightFormatter: Send + Sync {
    fn format(&self, raw: &str) -> Vec<String>;
}

/// Error types for selecting a formatter by name
#[derive(Debug, Error)]
pub enum FormatError {
    /// The name does not match any formatter
    #[error("Unknown format: '{0}'. Valid formats: lines, category, prefixed")]
    UnknownFormat(String),
}

/// Formatter selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatKind {
    /// One insight per non-empty line
    #[default]
    Lines,
    /// `**[Category]**` headers followed by `*` bullets
    Category,
    /// Filtered prose lines with a fixed prefix
    Prefixed,
}

impl FormatKind {
    /// Builds the formatter for this kind
    ///
    /// `prefix` is only used by `Prefixed`; `now` stamps `Category` insights.
    pub fn build(self, prefix: Option<&str>, now: DateTime<Local>) -> Box<dyn InsightFormatter> {
        match self {
            FormatKind::Lines => Box::new(LineFormatter),
            FormatKind::Category => Box::new(CategoryBulletFormatter::new().with_timestamp(now)),
            FormatKind::Prefixed => Box::new(PrefixedLineFormatter::new(
                prefix.unwrap_or(DEFAULT_PREFIX),
            )),
        }
    }
}

impl FromStr for FormatKind {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lines" | "line" => Ok(FormatKind::Lines),
            "category" | "categories" | "bullets" => Ok(FormatKind::Category),
            "prefixed" | "prefix" => Ok(FormatKind::Prefixed),
            _ => Err(FormatError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatKind::Lines => "lines",
            FormatKind::Category => "category",
            FormatKind::Prefixed => "prefixed",
        };
        f.write_str(name)
    }
}
