use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Region (aquifer system / basin) filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Region {
    /// No filter.
    #[default]
    All,
    Named(String),
}

impl Region {
    pub fn named(label: impl Into<String>) -> Self {
        Region::Named(label.into())
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Region::All => None,
            Region::Named(label) => Some(label),
        }
    }

    /// Cache key component. `*` never collides with a named region because
    /// named regions are always prefixed with `=`.
    pub fn token(&self) -> String {
        match self {
            Region::All => "*".to_string(),
            Region::Named(label) => format!("={}", label),
        }
    }
}

impl FromStr for Region {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            Ok(Region::All)
        } else {
            Ok(Region::Named(trimmed.to_string()))
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::All => f.write_str("all"),
            Region::Named(label) => f.write_str(label),
        }
    }
}
