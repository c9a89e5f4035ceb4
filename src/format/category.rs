//! Markdown category/bullet formatter
//!
//! Handles responses shaped like:
//!
//! ```text
//! **[Crypto Gaming]**
//! * Game X passed 1M daily users
//! * **Token Y** rallied 12%
//!
//! **[Web3 Gaming]**
//! * ...
//! ```

use chrono::{DateTime, Local};

use super::InsightFormatter;

/// Timestamp layout used in front of each insight
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Emits `[timestamp] [Category] text` for every bullet under a bold header
///
/// Bullets that appear before any header are dropped. A header stays in effect
/// until the next header, across blank lines.
#[derive(Debug, Clone, Default)]
pub struct CategoryBulletFormatter {
    timestamp: Option<String>,
}

impl CategoryBulletFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefixes every insight with `[YYYY-MM-DD HH:MM]`
    pub fn with_timestamp(mut self, now: DateTime<Local>) -> Self {
        self.timestamp = Some(now.format(TIMESTAMP_FORMAT).to_string());
        self
    }
}

/// Returns the category name for a `**[Name]**` header line
fn parse_header(line: &str) -> Option<&str> {
    line.strip_prefix("**[")
        .and_then(|rest| rest.strip_suffix("]**"))
        .map(str::trim)
}

impl InsightFormatter for CategoryBulletFormatter {
    fn format(&self, raw: &str) -> Vec<String> {
        let mut insights = Vec::new();
        let mut category: Option<&str> = None;

        for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(header) = parse_header(line) {
                category = Some(header);
                continue;
            }

            if !line.starts_with('*') {
                continue;
            }

            // Drops the bullet marker along with any bold markup.
            let content = line.replace('*', "");
            let content = content.trim();
            if content.is_empty() {
                continue;
            }

            if let Some(category) = category {
                let insight = match &self.timestamp {
                    Some(stamp) => format!("[{}] [{}] {}", stamp, category, content),
                    None => format!("[{}] {}", category, content),
                };
                insights.push(insight);
            }
        }

        insights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = "Here is the latest:\n\n\
        **[Crypto Gaming]**\n\
        * **Axie Infinity** launched a new season with 20% more players.\n\
        * Pixels crossed 1M DAU.\n\n\
        **[General Crypto Market Updates]**\n\
        * BTC held above $95k.\n";

    #[test]
    fn test_bullets_are_tagged_with_their_category() {
        let insights = CategoryBulletFormatter::new().format(SAMPLE);

        assert_eq!(
            insights,
            vec![
                "[Crypto Gaming] Axie Infinity launched a new season with 20% more players.",
                "[Crypto Gaming] Pixels crossed 1M DAU.",
                "[General Crypto Market Updates] BTC held above $95k.",
            ]
        );
    }

    #[test]
    fn test_timestamp_prefix() {
        let now = Local.with_ymd_and_hms(2025, 1, 3, 9, 5, 0).unwrap();
        let insights = CategoryBulletFormatter::new()
            .with_timestamp(now)
            .format("**[Web3 Gaming]**\n* Ronin hit a record");

        assert_eq!(insights, vec!["[2025-01-03 09:05] [Web3 Gaming] Ronin hit a record"]);
    }

    #[test]
    fn test_bullets_before_any_header_are_dropped() {
        let insights = CategoryBulletFormatter::new().format("* orphan\n**[A]**\n* kept");
        assert_eq!(insights, vec!["[A] kept"]);
    }

    #[test]
    fn test_header_survives_blank_lines() {
        let insights = CategoryBulletFormatter::new().format("**[A]**\n\n* one\n\n* two");
        assert_eq!(insights, vec!["[A] one", "[A] two"]);
    }

    #[test]
    fn test_prose_and_empty_bullets_are_ignored() {
        let insights = CategoryBulletFormatter::new().format("**[A]**\nsome prose\n*\n* **\n* real");
        assert_eq!(insights, vec!["[A] real"]);
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(parse_header("**[Crypto Gaming]**"), Some("Crypto Gaming"));
        assert_eq!(parse_header("**Crypto Gaming**"), None);
        assert_eq!(parse_header("[Crypto Gaming]"), None);
    }
}
