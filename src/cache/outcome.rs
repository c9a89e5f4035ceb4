//! How a rate-limited fetch produced its data

use std::fmt;

/// Result of a rate-limited fetch, tagged with where the data came from
///
/// Every variant carries data, so callers that only want insights can call
/// [`FetchOutcome::into_data`]. Callers that care about degradation can match
/// on the variant or use [`FetchOutcome::is_degraded`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The fetch ran and returned fresh data
    Fetched {
        data: Vec<String>,
        /// False when the fresh data could not be written to the lockfile
        persisted: bool,
    },
    /// The key was not due; data comes straight from the lockfile
    Cached(Vec<String>),
    /// The fetch failed; data is the last cached payload, possibly empty
    Fallback { data: Vec<String>, error: String },
}

impl FetchOutcome {
    /// Borrows the insights regardless of origin
    pub fn data(&self) -> &[String] {
        match self {
            FetchOutcome::Fetched { data, .. }
            | FetchOutcome::Cached(data)
            | FetchOutcome::Fallback { data, .. } => data,
        }
    }

    /// Consumes the outcome, keeping only the insights
    pub fn into_data(self) -> Vec<String> {
        match self {
            FetchOutcome::Fetched { data, .. }
            | FetchOutcome::Cached(data)
            | FetchOutcome::Fallback { data, .. } => data,
        }
    }

    /// True when the fetch failed or its result could not be cached
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            FetchOutcome::Fallback { .. } | FetchOutcome::Fetched { persisted: false, .. }
        )
    }

    /// The fetch error, if the data is a fallback
    pub fn error(&self) -> Option<&str> {
        match self {
            FetchOutcome::Fallback { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Short label used in log lines
    pub fn source(&self) -> &'static str {
        match self {
            FetchOutcome::Fetched { persisted: true, .. } => "fetched",
            FetchOutcome::Fetched { persisted: false, .. } => "fetched-unpersisted",
            FetchOutcome::Cached(_) => "cached",
            FetchOutcome::Fallback { .. } => "fallback",
        }
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Fallback { data, error } => write!(
                f,
                "fallback ({} cached items) after fetch error: {}",
                data.len(),
                error
            ),
            other => write!(f, "{} ({} items)", other.source(), other.data().len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_degraded_only_for_fallback_and_unpersisted() {
        let fetched = FetchOutcome::Fetched {
            data: items(&["a"]),
            persisted: true,
        };
        let unpersisted = FetchOutcome::Fetched {
            data: items(&["a"]),
            persisted: false,
        };
        let cached = FetchOutcome::Cached(items(&["a"]));
        let fallback = FetchOutcome::Fallback {
            data: Vec::new(),
            error: "timeout".to_string(),
        };

        assert!(!fetched.is_degraded());
        assert!(unpersisted.is_degraded());
        assert!(!cached.is_degraded());
        assert!(fallback.is_degraded());
    }

    #[test]
    fn test_empty_fallback_is_distinguishable_from_empty_fetch() {
        let fetched = FetchOutcome::Fetched {
            data: Vec::new(),
            persisted: true,
        };
        let fallback = FetchOutcome::Fallback {
            data: Vec::new(),
            error: "no network".to_string(),
        };

        assert_eq!(fetched.data(), fallback.data());
        assert_eq!(fetched.error(), None);
        assert_eq!(fallback.error(), Some("no network"));
    }

    #[test]
    fn test_display_mentions_source_and_error() {
        let fallback = FetchOutcome::Fallback {
            data: items(&["old"]),
            error: "exit status 1".to_string(),
        };
        let text = fallback.to_string();
        assert!(text.contains("fallback"));
        assert!(text.contains("1 cached items"));
        assert!(text.contains("exit status 1"));

        assert_eq!(FetchOutcome::Cached(items(&["a", "b"])).to_string(), "cached (2 items)");
    }

    #[test]
    fn test_into_data_keeps_order() {
        let outcome = FetchOutcome::Cached(items(&["first", "second", "third"]));
        assert_eq!(outcome.into_data(), items(&["first", "second", "third"]));
    }
}
