//! Log confidentiality levels.
//!
//! Secret-bearing values (client tokens, passwords, lease ids) are rendered in
//! diagnostics according to the configured level. Each value carries a
//! tolerance: it is shown only when the configured level does not exceed it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::VaultError;

/// Placeholder rendered in place of a masked value.
pub const MASK: &str = "***";

/// How much of a secret value may appear in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogConfidentialityLevel {
    /// Everything is shown
    Low,
    /// Lease ids are shown, tokens and passwords are masked
    #[default]
    Medium,
    /// Nothing secret is shown
    High,
}

impl LogConfidentialityLevel {
    /// Render `value` if this level tolerates it, `***` otherwise.
    #[must_use]
    pub fn mask_with_tolerance(self, value: &str, tolerance: Self) -> String {
        if self <= tolerance {
            value.to_string()
        } else {
            MASK.to_string()
        }
    }

    /// Tokens and passwords: visible only at `Low`.
    #[must_use]
    pub fn mask_secret(self, value: &str) -> String {
        self.mask_with_tolerance(value, Self::Low)
    }

    /// Lease ids: visible at `Low` and `Medium`.
    #[must_use]
    pub fn mask_lease_id(self, value: &str) -> String {
        self.mask_with_tolerance(value, Self::Medium)
    }
}

impl fmt::Display for LogConfidentialityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(s)
    }
}

impl FromStr for LogConfidentialityLevel {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(VaultError::invalid_config(format!(
                "unknown log confidentiality level: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_shows_everything() {
        let level = LogConfidentialityLevel::Low;
        assert_eq!(level.mask_secret("s.token"), "s.token");
        assert_eq!(level.mask_lease_id("database/creds/x/1"), "database/creds/x/1");
    }

    #[test]
    fn test_medium_shows_lease_ids_only() {
        let level = LogConfidentialityLevel::Medium;
        assert_eq!(level.mask_secret("s.token"), MASK);
        assert_eq!(level.mask_lease_id("database/creds/x/1"), "database/creds/x/1");
    }

    #[test]
    fn test_high_masks_everything() {
        let level = LogConfidentialityLevel::High;
        assert_eq!(level.mask_secret("s.token"), MASK);
        assert_eq!(level.mask_lease_id("database/creds/x/1"), MASK);
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "HIGH".parse::<LogConfidentialityLevel>().ok(),
            Some(LogConfidentialityLevel::High)
        );
        assert!("secret".parse::<LogConfidentialityLevel>().is_err());
    }
}
