//! Human-facing order codes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::OrderError;

/// Unique, human-readable order reference such as `ORD-20250301-00001234`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderCode(String);

impl OrderCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Renders a code from a monotonic sequence value.
    ///
    /// The date only aids humans; uniqueness comes from the sequence.
    pub fn from_sequence(prefix: &str, date: NaiveDate, sequence: u64) -> Self {
        Self(format!("{prefix}-{}-{sequence:08}", date.format("%Y%m%d")))
    }

    /// Renders a code from a fresh v4 UUID (122 random bits).
    pub fn random(prefix: &str) -> Self {
        let token = Uuid::new_v4().simple().to_string().to_uppercase();
        Self(format!("{prefix}-{token}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// How order codes are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderCodeStrategy {
    /// Store-owned monotonic counter; short and readable.
    #[default]
    Sequence,
    /// Random 128-bit identifier; needs no coordination.
    Random,
}

impl std::str::FromStr for OrderCodeStrategy {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequence" => Ok(OrderCodeStrategy::Sequence),
            "random" => Ok(OrderCodeStrategy::Random),
            _ => Err(OrderError::Unrecognized {
                kind: "order code strategy",
                value: s.to_string(),
            }),
        }
    }
}
