use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Review comment severity. Declaration order gives `Ord`, lowest first,
/// so `max()` picks the most important finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Praise,
    Suggestion,
    Warning,
    Critical,
}

/// Review comment category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Bug,
    Security,
    Performance,
    Style,
    Architecture,
    Testing,
    Documentation,
}

/// How much stored context a review run loads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDepth {
    /// No memory at all.
    Quick,
    /// Outline only.
    #[default]
    Standard,
    /// Outline plus learned patterns.
    Deep,
}

impl FromStr for ReviewDepth {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "quick" => Ok(ReviewDepth::Quick),
            "standard" => Ok(ReviewDepth::Standard),
            "deep" => Ok(ReviewDepth::Deep),
            other => Err(CoreError::UnknownMode(other.to_string())),
        }
    }
}

/// Operating mode, read from the environment at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Full build + analysis + push.
    Bootstrap,
    /// Incremental build + optional analysis + push.
    Index,
    /// Selective pull + retrieve + generate + publish.
    Review,
}

impl FromStr for Mode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bootstrap" => Ok(Mode::Bootstrap),
            "index" => Ok(Mode::Index),
            "review" => Ok(Mode::Review),
            other => Err(CoreError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Bootstrap => "bootstrap",
            Mode::Index => "index",
            Mode::Review => "review",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_by_importance() {
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Suggestion);
        assert!(Severity::Suggestion > Severity::Praise);
    }

    #[test]
    fn mode_parses_the_three_selectors() {
        assert_eq!("bootstrap".parse::<Mode>().unwrap(), Mode::Bootstrap);
        assert_eq!("index".parse::<Mode>().unwrap(), Mode::Index);
        assert_eq!("review".parse::<Mode>().unwrap(), Mode::Review);
        assert!("serve".parse::<Mode>().is_err());
    }

    #[test]
    fn depth_parses() {
        assert_eq!("deep".parse::<ReviewDepth>().unwrap(), ReviewDepth::Deep);
        assert!("shallow".parse::<ReviewDepth>().is_err());
    }
}
